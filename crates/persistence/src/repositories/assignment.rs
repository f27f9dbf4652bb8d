//! Ledger repository: invitations, gift card assignments and reversal.

use chrono::Utc;
use domain::models::assignment::{AssignmentStatus, GiftCardAssignment, ListAssignmentsQuery};
use domain::models::distribution_log::{DistributionAction, DistributionLogEntry};
use domain::models::invitation::Invitation;
use domain::models::participant::Participant;
use domain::models::pool::PoolItemStatus;
use domain::models::reversal::ReversalOutcome;
use domain::models::unsent_audit::{ReversalTrigger, UnsentAuditRecord};
use domain::{EngineError, EngineResult};
use sqlx::PgPool;
use uuid::Uuid;

use super::{distribution_log, search_pattern};
use crate::entities::{
    AssignmentStatusDb, GiftCardAssignmentEntity, GiftCardEntity, GiftCardTypeDb,
    InvitationEntity, ParticipantEntity, PoolItemStatusDb, ReversalTriggerDb, UnsentAuditEntity,
};
use crate::error::DbResultExt;
use crate::metrics::QueryTimer;

fn invitation_not_found() -> EngineError {
    EngineError::NotFound("Invitation not found".into())
}

fn assignment_not_found() -> EngineError {
    EngineError::NotFound("Gift card assignment not found".into())
}

#[derive(Clone)]
pub struct AssignmentRepository {
    pool: PgPool,
}

impl AssignmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_invitation(&self, id: Uuid) -> EngineResult<Option<Invitation>> {
        let entity = sqlx::query_as::<_, InvitationEntity>(
            r#"
            SELECT id, participant_id, link_item_id, message_status, queued_at, sent_at, completed_at, created_at
            FROM invitations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_db()?;

        Ok(entity.map(Into::into))
    }

    pub async fn find_invitation_for_participant(
        &self,
        participant_id: Uuid,
    ) -> EngineResult<Option<Invitation>> {
        let entity = sqlx::query_as::<_, InvitationEntity>(
            r#"
            SELECT id, participant_id, link_item_id, message_status, queued_at, sent_at, completed_at, created_at
            FROM invitations
            WHERE participant_id = $1
            "#,
        )
        .bind(participant_id)
        .fetch_optional(&self.pool)
        .await
        .map_db()?;

        Ok(entity.map(Into::into))
    }

    /// Stores the dispatcher status and stamps `queued_at`/`sent_at` once.
    pub async fn record_invitation_status(&self, id: Uuid, status: &str) -> EngineResult<Invitation> {
        let mut tx = self.pool.begin().await.map_db()?;

        let mut invitation: Invitation = sqlx::query_as::<_, InvitationEntity>(
            r#"
            SELECT id, participant_id, link_item_id, message_status, queued_at, sent_at, completed_at, created_at
            FROM invitations
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_db()?
        .ok_or_else(invitation_not_found)?
        .into();

        invitation.apply_message_status(status, Utc::now());

        sqlx::query(
            r#"
            UPDATE invitations
            SET message_status = $2, queued_at = $3, sent_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&invitation.message_status)
        .bind(invitation.queued_at)
        .bind(invitation.sent_at)
        .execute(&mut *tx)
        .await
        .map_db()?;

        tx.commit().await.map_db()?;
        Ok(invitation)
    }

    pub async fn complete_invitation(&self, id: Uuid) -> EngineResult<(Invitation, bool)> {
        let updated = sqlx::query_as::<_, InvitationEntity>(
            r#"
            UPDATE invitations
            SET completed_at = NOW()
            WHERE id = $1 AND completed_at IS NULL
            RETURNING id, participant_id, link_item_id, message_status, queued_at, sent_at, completed_at, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_db()?;

        if let Some(entity) = updated {
            return Ok((entity.into(), true));
        }
        let existing = self.find_invitation(id).await?.ok_or_else(invitation_not_found)?;
        Ok((existing, false))
    }

    pub async fn uncomplete_invitation(&self, id: Uuid) -> EngineResult<Invitation> {
        let entity = sqlx::query_as::<_, InvitationEntity>(
            r#"
            UPDATE invitations
            SET completed_at = NULL
            WHERE id = $1
            RETURNING id, participant_id, link_item_id, message_status, queued_at, sent_at, completed_at, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_db()?
        .ok_or_else(invitation_not_found)?;

        Ok(entity.into())
    }

    pub async fn find_assignment(&self, id: Uuid) -> EngineResult<Option<GiftCardAssignment>> {
        let entity = sqlx::query_as::<_, GiftCardAssignmentEntity>(
            r#"
            SELECT id, participant_id, invitation_id, pool_item_id, card_code, card_type, card_value_cents, status, delivery_method, delivery_status, sent_by, sent_at, delivered_at, redeemed_at, unsent_at, notes, source
            FROM gift_card_assignments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_db()?;

        Ok(entity.map(Into::into))
    }

    pub async fn list_for_participant(
        &self,
        participant_id: Uuid,
    ) -> EngineResult<Vec<GiftCardAssignment>> {
        let entities = sqlx::query_as::<_, GiftCardAssignmentEntity>(
            r#"
            SELECT id, participant_id, invitation_id, pool_item_id, card_code, card_type, card_value_cents, status, delivery_method, delivery_status, sent_by, sent_at, delivered_at, redeemed_at, unsent_at, notes, source
            FROM gift_card_assignments
            WHERE participant_id = $1
            ORDER BY sent_at DESC
            "#,
        )
        .bind(participant_id)
        .fetch_all(&self.pool)
        .await
        .map_db()?;

        Ok(entities.into_iter().map(Into::into).collect())
    }

    /// Every assignment, newest first. The phone search joins the owner, so
    /// orphaned assignments only match on card code.
    pub async fn list(
        &self,
        query: &ListAssignmentsQuery,
    ) -> EngineResult<(Vec<GiftCardAssignment>, i64)> {
        let timer = QueryTimer::new("list_assignments");
        let params = query.page_params();
        let status = query.status.map(AssignmentStatusDb::from);
        let pattern = search_pattern(query.search_term());

        let entities = sqlx::query_as::<_, GiftCardAssignmentEntity>(
            r#"
            SELECT a.id, a.participant_id, a.invitation_id, a.pool_item_id, a.card_code, a.card_type, a.card_value_cents, a.status, a.delivery_method, a.delivery_status, a.sent_by, a.sent_at, a.delivered_at, a.redeemed_at, a.unsent_at, a.notes, a.source
            FROM gift_card_assignments a
            LEFT JOIN participants p ON p.id = a.participant_id
            WHERE ($1::assignment_status IS NULL OR a.status = $1)
              AND ($2::boolean IS NULL OR (a.participant_id IS NULL) = $2)
              AND ($3::text IS NULL OR a.card_code ILIKE $3 OR p.phone ILIKE $3)
            ORDER BY a.sent_at DESC, a.id
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(status)
        .bind(query.orphaned)
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .map_db()?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM gift_card_assignments a
            LEFT JOIN participants p ON p.id = a.participant_id
            WHERE ($1::assignment_status IS NULL OR a.status = $1)
              AND ($2::boolean IS NULL OR (a.participant_id IS NULL) = $2)
              AND ($3::text IS NULL OR a.card_code ILIKE $3 OR p.phone ILIKE $3)
            "#,
        )
        .bind(status)
        .bind(query.orphaned)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_db()?;
        timer.record();

        Ok((entities.into_iter().map(Into::into).collect(), total))
    }

    /// Forward-only transition, checked against the locked current status.
    pub async fn advance(
        &self,
        id: Uuid,
        status: AssignmentStatus,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment> {
        let timer = QueryTimer::new("advance_assignment");
        let mut tx = self.pool.begin().await.map_db()?;

        let mut assignment: GiftCardAssignment = sqlx::query_as::<_, GiftCardAssignmentEntity>(
            r#"
            SELECT id, participant_id, invitation_id, pool_item_id, card_code, card_type, card_value_cents, status, delivery_method, delivery_status, sent_by, sent_at, delivered_at, redeemed_at, unsent_at, notes, source
            FROM gift_card_assignments
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_db()?
        .ok_or_else(assignment_not_found)?
        .into();

        if assignment.status == status {
            return Ok(assignment);
        }
        let from = assignment.status;
        let now = Utc::now();
        if !assignment.advance(status, now) {
            return Err(EngineError::Conflict(format!(
                "Cannot change gift card status from {} to {}",
                from, status
            )));
        }

        sqlx::query(
            r#"
            UPDATE gift_card_assignments
            SET status = $2, delivered_at = $3, redeemed_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(AssignmentStatusDb::from(assignment.status))
        .bind(assignment.delivered_at)
        .bind(assignment.redeemed_at)
        .execute(&mut *tx)
        .await
        .map_db()?;

        let action = match status {
            AssignmentStatus::Redeemed => DistributionAction::MarkedRedeemed,
            _ => DistributionAction::MarkedDelivered,
        };
        let entry = DistributionLogEntry::new(id, action, Some(from.to_string()), acted_by, now);
        distribution_log::append(&mut *tx, &entry).await?;

        tx.commit().await.map_db()?;
        timer.record();
        Ok(assignment)
    }

    pub async fn record_delivery_status(
        &self,
        id: Uuid,
        status: &str,
        action: DistributionAction,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment> {
        let mut tx = self.pool.begin().await.map_db()?;
        let entity = sqlx::query_as::<_, GiftCardAssignmentEntity>(
            r#"
            UPDATE gift_card_assignments
            SET delivery_status = $2
            WHERE id = $1
            RETURNING id, participant_id, invitation_id, pool_item_id, card_code, card_type, card_value_cents, status, delivery_method, delivery_status, sent_by, sent_at, delivered_at, redeemed_at, unsent_at, notes, source
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&mut *tx)
        .await
        .map_db()?
        .ok_or_else(assignment_not_found)?;

        let entry = DistributionLogEntry::new(id, action, Some(status.to_string()), acted_by, Utc::now());
        distribution_log::append(&mut *tx, &entry).await?;

        tx.commit().await.map_db()?;
        Ok(entity.into())
    }

    pub async fn update_notes(
        &self,
        id: Uuid,
        notes: Option<String>,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment> {
        let mut tx = self.pool.begin().await.map_db()?;
        let entity = sqlx::query_as::<_, GiftCardAssignmentEntity>(
            r#"
            UPDATE gift_card_assignments
            SET notes = $2
            WHERE id = $1
            RETURNING id, participant_id, invitation_id, pool_item_id, card_code, card_type, card_value_cents, status, delivery_method, delivery_status, sent_by, sent_at, delivered_at, redeemed_at, unsent_at, notes, source
            "#,
        )
        .bind(id)
        .bind(&notes)
        .fetch_optional(&mut *tx)
        .await
        .map_db()?
        .ok_or_else(assignment_not_found)?;

        let entry = DistributionLogEntry::new(id, DistributionAction::NotesUpdated, notes, acted_by, Utc::now());
        distribution_log::append(&mut *tx, &entry).await?;

        tx.commit().await.map_db()?;
        Ok(entity.into())
    }

    /// Unsends an assignment, releases its card and appends the audit record
    /// and log entry in one transaction. Assignment and card rows are both
    /// locked, so a concurrent claim can never see the card half-released.
    pub async fn reverse(
        &self,
        id: Uuid,
        unsent_by: &str,
        requested_by: &str,
        trigger: ReversalTrigger,
    ) -> EngineResult<ReversalOutcome> {
        let timer = QueryTimer::new("reverse_assignment");
        let mut tx = self.pool.begin().await.map_db()?;

        let assignment: GiftCardAssignment = sqlx::query_as::<_, GiftCardAssignmentEntity>(
            r#"
            SELECT id, participant_id, invitation_id, pool_item_id, card_code, card_type, card_value_cents, status, delivery_method, delivery_status, sent_by, sent_at, delivered_at, redeemed_at, unsent_at, notes, source
            FROM gift_card_assignments
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_db()?
        .ok_or_else(assignment_not_found)?
        .into();

        if !assignment.is_active() {
            return Ok(ReversalOutcome::AlreadyUnsent);
        }
        if trigger == ReversalTrigger::Admin && assignment.status == AssignmentStatus::Redeemed {
            return Err(EngineError::Conflict(
                "Redeemed gift cards cannot be unsent".into(),
            ));
        }

        let participant: Option<Participant> = match assignment.participant_id {
            Some(pid) => sqlx::query_as::<_, ParticipantEntity>(
                r#"
                SELECT id, phone, email, verified_at, consented_at, created_at
                FROM participants
                WHERE id = $1
                "#,
            )
            .bind(pid)
            .fetch_optional(&mut *tx)
            .await
            .map_db()?
            .map(Into::into),
            None => None,
        };

        let card = sqlx::query_as::<_, GiftCardEntity>(
            r#"
            SELECT id, card_code, card_type, card_value_cents, redemption_url, instructions, status, batch_label, uploaded_by, uploaded_at, expires_at, assigned_at, assigned_assignment_id
            FROM gift_cards
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(assignment.pool_item_id)
        .fetch_optional(&mut *tx)
        .await
        .map_db()?;

        let released_to = match card {
            Some(card)
                if card.status == PoolItemStatusDb::Assigned
                    && card.assigned_assignment_id == Some(id) =>
            {
                let target = if assignment.status == AssignmentStatus::Redeemed {
                    PoolItemStatus::Invalid
                } else {
                    PoolItemStatus::Available
                };
                sqlx::query(
                    r#"
                    UPDATE gift_cards
                    SET status = $2, assigned_at = NULL, assigned_assignment_id = NULL
                    WHERE id = $1 AND status = 'ASSIGNED'
                    "#,
                )
                .bind(card.id)
                .bind(PoolItemStatusDb::from(target))
                .execute(&mut *tx)
                .await
                .map_db()?;
                Some(target)
            }
            Some(_) if trigger == ReversalTrigger::Admin => {
                return Err(EngineError::Conflict(
                    "Pool item is no longer held by this assignment".into(),
                ))
            }
            None if trigger == ReversalTrigger::Admin => {
                return Err(EngineError::NotFound(
                    "Pool item for this assignment no longer exists".into(),
                ))
            }
            _ => None,
        };

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE gift_card_assignments
            SET status = 'UNSENT', unsent_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_db()?;

        let record = UnsentAuditRecord::capture(
            &assignment,
            participant.as_ref(),
            trigger,
            unsent_by,
            requested_by,
            now,
        );
        let audit: UnsentAuditRecord = sqlx::query_as::<_, UnsentAuditEntity>(
            r#"
            INSERT INTO unsent_audit (id, original_assignment_id, pool_item_id, card_code, card_type, card_value_cents, previous_status, participant_id, participant_phone, participant_email, sent_by, sent_at, source, trigger, unsent_by, requested_by, unsent_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING id, original_assignment_id, pool_item_id, card_code, card_type, card_value_cents, previous_status, participant_id, participant_phone, participant_email, sent_by, sent_at, source, trigger, unsent_by, requested_by, unsent_at
            "#,
        )
        .bind(record.id)
        .bind(record.original_assignment_id)
        .bind(record.pool_item_id)
        .bind(&record.card_code)
        .bind(GiftCardTypeDb::from(record.card_type))
        .bind(record.card_value_cents)
        .bind(AssignmentStatusDb::from(record.previous_status))
        .bind(record.participant_snapshot.participant_id)
        .bind(&record.participant_snapshot.phone)
        .bind(&record.participant_snapshot.email)
        .bind(&record.sent_by)
        .bind(record.sent_at)
        .bind(&record.source)
        .bind(ReversalTriggerDb::from(record.trigger))
        .bind(&record.unsent_by)
        .bind(&record.requested_by)
        .bind(record.unsent_at)
        .fetch_one(&mut *tx)
        .await
        .map_db()?
        .into();

        let entry = DistributionLogEntry::new(
            id,
            DistributionAction::Unsent,
            Some(trigger.to_string()),
            unsent_by,
            now,
        );
        distribution_log::append(&mut *tx, &entry).await?;

        tx.commit().await.map_db()?;
        timer.record();

        Ok(match released_to {
            Some(released_to) => ReversalOutcome::Reversed { audit, released_to },
            None => ReversalOutcome::Orphaned { audit },
        })
    }
}
