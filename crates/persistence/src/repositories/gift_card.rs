//! Gift card pool repository.

use chrono::Utc;
use domain::models::allocation::{ClaimOutcome, GiftCardClaim};
use domain::models::assignment::NewAssignment;
use domain::models::distribution_log::{DistributionAction, DistributionLogEntry};
use domain::models::gift_card::{GiftCard, NewGiftCard, DEFAULT_REDEMPTION_URL};
use domain::models::pool::{GiftCardPoolCounts, ListPoolQuery, PoolItemStatus};
use domain::{EngineError, EngineResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{distribution_log, search_pattern};
use crate::entities::{
    DeliveryMethodDb, GiftCardAssignmentEntity, GiftCardEntity, GiftCardTypeDb,
    InvitationEntity, PoolItemStatusDb,
};
use crate::error::DbResultExt;
use crate::metrics::QueryTimer;

#[derive(Debug, FromRow)]
struct GiftCardCountsRow {
    total_cards: i64,
    available_cards: i64,
    assigned_cards: i64,
    expired_cards: i64,
    invalid_cards: i64,
}

#[derive(Clone)]
pub struct GiftCardRepository {
    pool: PgPool,
}

impl GiftCardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, card: NewGiftCard, uploaded_by: &str) -> EngineResult<GiftCard> {
        let timer = QueryTimer::new("insert_gift_card");
        let result = sqlx::query_as::<_, GiftCardEntity>(
            r#"
            INSERT INTO gift_cards (card_code, card_type, card_value_cents, redemption_url, instructions, batch_label, uploaded_by, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, card_code, card_type, card_value_cents, redemption_url, instructions, status, batch_label, uploaded_by, uploaded_at, expires_at, assigned_at, assigned_assignment_id
            "#,
        )
        .bind(&card.card_code)
        .bind(GiftCardTypeDb::from(card.card_type))
        .bind(card.card_value_cents)
        .bind(card.redemption_url.as_deref().unwrap_or(DEFAULT_REDEMPTION_URL))
        .bind(&card.instructions)
        .bind(&card.batch_label)
        .bind(uploaded_by)
        .bind(card.expires_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();

        Ok(result.map_db()?.into())
    }

    pub async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<GiftCard>> {
        let entity = sqlx::query_as::<_, GiftCardEntity>(
            r#"
            SELECT id, card_code, card_type, card_value_cents, redemption_url, instructions, status, batch_label, uploaded_by, uploaded_at, expires_at, assigned_at, assigned_assignment_id
            FROM gift_cards
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_db()?;

        Ok(entity.map(Into::into))
    }

    pub async fn list(&self, query: &ListPoolQuery) -> EngineResult<(Vec<GiftCard>, i64)> {
        let timer = QueryTimer::new("list_gift_cards");
        let params = query.page_params();
        let status = query.status.map(PoolItemStatusDb::from);
        let pattern = search_pattern(query.search_term());

        let entities = sqlx::query_as::<_, GiftCardEntity>(
            r#"
            SELECT id, card_code, card_type, card_value_cents, redemption_url, instructions, status, batch_label, uploaded_by, uploaded_at, expires_at, assigned_at, assigned_assignment_id
            FROM gift_cards
            WHERE ($1::pool_item_status IS NULL OR status = $1)
              AND ($2::text IS NULL OR card_code ILIKE $2 OR batch_label ILIKE $2)
            ORDER BY uploaded_at, id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(status)
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .map_db()?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM gift_cards
            WHERE ($1::pool_item_status IS NULL OR status = $1)
              AND ($2::text IS NULL OR card_code ILIKE $2 OR batch_label ILIKE $2)
            "#,
        )
        .bind(status)
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_db()?;
        timer.record();

        Ok((entities.into_iter().map(Into::into).collect(), total))
    }

    pub async fn counts(&self) -> EngineResult<GiftCardPoolCounts> {
        let row = sqlx::query_as::<_, GiftCardCountsRow>(
            r#"
            SELECT
                COUNT(*) AS total_cards,
                COUNT(*) FILTER (WHERE status = 'AVAILABLE') AS available_cards,
                COUNT(*) FILTER (WHERE status = 'ASSIGNED') AS assigned_cards,
                COUNT(*) FILTER (WHERE status = 'EXPIRED') AS expired_cards,
                COUNT(*) FILTER (WHERE status = 'INVALID') AS invalid_cards
            FROM gift_cards
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_db()?;

        Ok(GiftCardPoolCounts {
            total_cards: row.total_cards,
            available_cards: row.available_cards,
            assigned_cards: row.assigned_cards,
            expired_cards: row.expired_cards,
            invalid_cards: row.invalid_cards,
        })
    }

    /// Explains why a conditional update on an AVAILABLE card matched nothing.
    async fn not_available(&self, id: Uuid, action: &str) -> EngineError {
        match self.find_by_id(id).await {
            Ok(Some(card)) => EngineError::Conflict(format!(
                "Gift card is {} and cannot be {}",
                card.status, action
            )),
            Ok(None) => EngineError::NotFound("Gift card not found".into()),
            Err(e) => e,
        }
    }

    pub async fn update_code(&self, id: Uuid, card_code: &str) -> EngineResult<GiftCard> {
        let entity = sqlx::query_as::<_, GiftCardEntity>(
            r#"
            UPDATE gift_cards
            SET card_code = $2
            WHERE id = $1 AND status = 'AVAILABLE'
            RETURNING id, card_code, card_type, card_value_cents, redemption_url, instructions, status, batch_label, uploaded_by, uploaded_at, expires_at, assigned_at, assigned_assignment_id
            "#,
        )
        .bind(id)
        .bind(card_code)
        .fetch_optional(&self.pool)
        .await
        .map_db()?;

        match entity {
            Some(entity) => Ok(entity.into()),
            None => Err(self.not_available(id, "edited").await),
        }
    }

    /// Moves an AVAILABLE card to EXPIRED or INVALID.
    pub async fn retire(&self, id: Uuid, status: PoolItemStatus) -> EngineResult<GiftCard> {
        if !matches!(status, PoolItemStatus::Expired | PoolItemStatus::Invalid) {
            return Err(EngineError::Validation(format!(
                "Gift cards can only be retired as EXPIRED or INVALID, not {}",
                status
            )));
        }

        let entity = sqlx::query_as::<_, GiftCardEntity>(
            r#"
            UPDATE gift_cards
            SET status = $2
            WHERE id = $1 AND status = 'AVAILABLE'
            RETURNING id, card_code, card_type, card_value_cents, redemption_url, instructions, status, batch_label, uploaded_by, uploaded_at, expires_at, assigned_at, assigned_assignment_id
            "#,
        )
        .bind(id)
        .bind(PoolItemStatusDb::from(status))
        .fetch_optional(&self.pool)
        .await
        .map_db()?;

        match entity {
            Some(entity) => Ok(entity.into()),
            None => Err(self.not_available(id, &format!("marked {}", status)).await),
        }
    }

    pub async fn delete(&self, id: Uuid) -> EngineResult<()> {
        let result = sqlx::query("DELETE FROM gift_cards WHERE id = $1 AND status <> 'ASSIGNED'")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_db()?;
        if result.rows_affected() > 0 {
            return Ok(());
        }

        match self.find_by_id(id).await? {
            None => Err(EngineError::NotFound("Gift card not found".into())),
            Some(_) => Err(EngineError::CascadeBlocked(
                "Cannot delete a gift card while it is assigned".into(),
            )),
        }
    }

    /// Checks eligibility, claims the oldest claimable card and records the
    /// SENT assignment with its CREATED log entry in one transaction.
    pub async fn claim(&self, request: NewAssignment) -> EngineResult<ClaimOutcome<GiftCardClaim>> {
        let timer = QueryTimer::new("claim_gift_card");
        let mut tx = self.pool.begin().await.map_db()?;
        let participant_id = request.participant_id;

        let participant: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM participants WHERE id = $1 FOR UPDATE")
                .bind(participant_id)
                .fetch_optional(&mut *tx)
                .await
                .map_db()?;
        if participant.is_none() {
            return Err(EngineError::NotFound("Participant not found".into()));
        }

        let invitation = sqlx::query_as::<_, InvitationEntity>(
            r#"
            SELECT id, participant_id, link_item_id, message_status, queued_at, sent_at, completed_at, created_at
            FROM invitations
            WHERE participant_id = $1
            "#,
        )
        .bind(participant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_db()?;

        let invitation_id = match invitation {
            None => {
                return Err(EngineError::NotEligible(
                    "Participant has no survey invitation".into(),
                ))
            }
            Some(invitation) if invitation.completed_at.is_none() => {
                return Err(EngineError::NotEligible(
                    "Participant has not completed the survey".into(),
                ))
            }
            Some(invitation) => invitation.id,
        };

        let has_active: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM gift_card_assignments
                WHERE participant_id = $1 AND status <> 'UNSENT'
            )
            "#,
        )
        .bind(participant_id)
        .fetch_one(&mut *tx)
        .await
        .map_db()?;
        if has_active {
            return Err(EngineError::NotEligible(
                "Participant already has an active gift card".into(),
            ));
        }

        let assignment_id = Uuid::new_v4();
        let card = sqlx::query_as::<_, GiftCardEntity>(
            r#"
            UPDATE gift_cards
            SET status = 'ASSIGNED', assigned_at = NOW(), assigned_assignment_id = $1
            WHERE id = (
                SELECT id FROM gift_cards
                WHERE status = 'AVAILABLE' AND (expires_at IS NULL OR expires_at > NOW())
                ORDER BY uploaded_at, id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, card_code, card_type, card_value_cents, redemption_url, instructions, status, batch_label, uploaded_by, uploaded_at, expires_at, assigned_at, assigned_assignment_id
            "#,
        )
        .bind(assignment_id)
        .fetch_optional(&mut *tx)
        .await
        .map_db()?;

        let Some(card) = card else {
            tx.rollback().await.map_db()?;
            timer.record();
            return Ok(ClaimOutcome::NoItemAvailable);
        };

        let assignment = sqlx::query_as::<_, GiftCardAssignmentEntity>(
            r#"
            INSERT INTO gift_card_assignments (id, participant_id, invitation_id, pool_item_id, card_code, card_type, card_value_cents, delivery_method, sent_by, notes, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, participant_id, invitation_id, pool_item_id, card_code, card_type, card_value_cents, status, delivery_method, delivery_status, sent_by, sent_at, delivered_at, redeemed_at, unsent_at, notes, source
            "#,
        )
        .bind(assignment_id)
        .bind(participant_id)
        .bind(invitation_id)
        .bind(card.id)
        .bind(&card.card_code)
        .bind(card.card_type)
        .bind(card.card_value_cents)
        .bind(DeliveryMethodDb::from(request.delivery_method))
        .bind(&request.sent_by)
        .bind(&request.notes)
        .bind(&request.source)
        .fetch_one(&mut *tx)
        .await
        .map_db()?;

        let entry = DistributionLogEntry::new(
            assignment.id,
            DistributionAction::Created,
            Some(card.card_code.clone()),
            &request.sent_by,
            Utc::now(),
        );
        distribution_log::append(&mut *tx, &entry).await?;

        tx.commit().await.map_db()?;
        timer.record();

        Ok(ClaimOutcome::Claimed(GiftCardClaim {
            assignment: assignment.into(),
            card: card.into(),
        }))
    }
}
