//! Participant repository: registration, lookup and removal.

use chrono::{DateTime, Utc};
use domain::models::enrollment::EnrollmentConfig;
use domain::models::participant::{
    EligibleParticipant, ListParticipantsQuery, NewParticipant, Participant,
};
use domain::{EngineError, EngineResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::search_pattern;
use crate::entities::{EnrollmentConfigEntity, InvitationEntity, ParticipantEntity};
use crate::error::DbResultExt;
use crate::metrics::QueryTimer;

#[derive(Debug, FromRow)]
struct EligibleRow {
    participant_id: Uuid,
    phone: String,
    email: Option<String>,
    invitation_id: Uuid,
    completed_at: DateTime<Utc>,
}

impl From<EligibleRow> for EligibleParticipant {
    fn from(row: EligibleRow) -> Self {
        EligibleParticipant {
            participant_id: row.participant_id,
            phone: row.phone,
            email: row.email,
            invitation_id: row.invitation_id,
            completed_at: row.completed_at,
        }
    }
}

#[derive(Clone)]
pub struct ParticipantRepository {
    pool: PgPool,
}

impl ParticipantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Consults the gate, inserts the participant and bumps the count in one
    /// transaction. The config row lock serializes concurrent registrations.
    pub async fn register(&self, participant: NewParticipant) -> EngineResult<Participant> {
        let timer = QueryTimer::new("register_participant");
        let mut tx = self.pool.begin().await.map_db()?;

        let config: EnrollmentConfig = sqlx::query_as::<_, EnrollmentConfigEntity>(
            r#"
            SELECT max_participants, is_enrollment_active, current_count, updated_by, updated_at
            FROM enrollment_config
            WHERE id = 1
            FOR UPDATE
            "#,
        )
        .fetch_one(&mut *tx)
        .await
        .map_db()?
        .into();

        let decision = config.decision();
        if !decision.is_allowed() {
            return Err(EngineError::Capacity(decision));
        }

        let created = sqlx::query_as::<_, ParticipantEntity>(
            r#"
            INSERT INTO participants (phone, email, verified_at, consented_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, phone, email, verified_at, consented_at, created_at
            "#,
        )
        .bind(&participant.phone)
        .bind(&participant.email)
        .bind(participant.verified_at)
        .bind(participant.consented_at)
        .fetch_one(&mut *tx)
        .await
        .map_db()?;

        sqlx::query("UPDATE enrollment_config SET current_count = current_count + 1 WHERE id = 1")
            .execute(&mut *tx)
            .await
            .map_db()?;

        tx.commit().await.map_db()?;
        timer.record();
        Ok(created.into())
    }

    pub async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Participant>> {
        let entity = sqlx::query_as::<_, ParticipantEntity>(
            r#"
            SELECT id, phone, email, verified_at, consented_at, created_at
            FROM participants
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_db()?;

        Ok(entity.map(Into::into))
    }

    /// Newest first, optionally filtered by phone or email.
    pub async fn list(&self, query: &ListParticipantsQuery) -> EngineResult<(Vec<Participant>, i64)> {
        let timer = QueryTimer::new("list_participants");
        let params = query.page_params();
        let pattern = search_pattern(query.search_term());

        let entities = sqlx::query_as::<_, ParticipantEntity>(
            r#"
            SELECT id, phone, email, verified_at, consented_at, created_at
            FROM participants
            WHERE ($1::text IS NULL OR phone ILIKE $1 OR email ILIKE $1)
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .map_db()?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM participants
            WHERE ($1::text IS NULL OR phone ILIKE $1 OR email ILIKE $1)
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_db()?;
        timer.record();

        Ok((entities.into_iter().map(Into::into).collect(), total))
    }

    /// Completed the survey and holds no active gift card; oldest completion
    /// first.
    pub async fn list_eligible(
        &self,
        query: &ListParticipantsQuery,
    ) -> EngineResult<(Vec<EligibleParticipant>, i64)> {
        let timer = QueryTimer::new("list_eligible_participants");
        let params = query.page_params();
        let pattern = search_pattern(query.search_term());

        let rows = sqlx::query_as::<_, EligibleRow>(
            r#"
            SELECT p.id AS participant_id, p.phone, p.email, i.id AS invitation_id, i.completed_at
            FROM participants p
            JOIN invitations i ON i.participant_id = p.id
            WHERE i.completed_at IS NOT NULL
              AND NOT EXISTS (
                SELECT 1 FROM gift_card_assignments a
                WHERE a.participant_id = p.id AND a.status <> 'UNSENT'
              )
              AND ($1::text IS NULL OR p.phone ILIKE $1 OR p.email ILIKE $1)
            ORDER BY i.completed_at, p.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .map_db()?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM participants p
            JOIN invitations i ON i.participant_id = p.id
            WHERE i.completed_at IS NOT NULL
              AND NOT EXISTS (
                SELECT 1 FROM gift_card_assignments a
                WHERE a.participant_id = p.id AND a.status <> 'UNSENT'
              )
              AND ($1::text IS NULL OR p.phone ILIKE $1 OR p.email ILIKE $1)
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await
        .map_db()?;
        timer.record();

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Returns an uncompleted invitation's link to the pool.
    pub async fn release_link(&self, participant_id: Uuid) -> EngineResult<Option<Uuid>> {
        let mut tx = self.pool.begin().await.map_db()?;

        let invitation = sqlx::query_as::<_, InvitationEntity>(
            r#"
            SELECT id, participant_id, link_item_id, message_status, queued_at, sent_at, completed_at, created_at
            FROM invitations
            WHERE participant_id = $1
            FOR UPDATE
            "#,
        )
        .bind(participant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_db()?;

        let Some(invitation) = invitation else {
            return Ok(None);
        };
        let (Some(link_id), None) = (invitation.link_item_id, invitation.completed_at) else {
            return Ok(None);
        };

        let released = sqlx::query(
            r#"
            UPDATE survey_links
            SET status = 'AVAILABLE', assigned_at = NULL
            WHERE id = $1 AND status = 'ASSIGNED'
            "#,
        )
        .bind(link_id)
        .execute(&mut *tx)
        .await
        .map_db()?;

        if released.rows_affected() == 0 {
            return Ok(None);
        }

        sqlx::query("UPDATE invitations SET link_item_id = NULL WHERE id = $1")
            .bind(invitation.id)
            .execute(&mut *tx)
            .await
            .map_db()?;

        tx.commit().await.map_db()?;
        Ok(Some(link_id))
    }

    /// Deletes the participant (invitations cascade, assignments keep a NULL
    /// owner) and decrements the enrollment count.
    pub async fn remove(&self, participant_id: Uuid) -> EngineResult<bool> {
        let timer = QueryTimer::new("remove_participant");
        let mut tx = self.pool.begin().await.map_db()?;

        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM participants WHERE id = $1 FOR UPDATE")
                .bind(participant_id)
                .fetch_optional(&mut *tx)
                .await
                .map_db()?;
        if exists.is_none() {
            return Ok(false);
        }

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
            return Err(EngineError::Conflict(
                "Participant still holds an active gift card".into(),
            ));
        }

        sqlx::query("DELETE FROM participants WHERE id = $1")
            .bind(participant_id)
            .execute(&mut *tx)
            .await
            .map_db()?;

        sqlx::query(
            "UPDATE enrollment_config SET current_count = GREATEST(current_count - 1, 0) WHERE id = 1",
        )
        .execute(&mut *tx)
        .await
        .map_db()?;

        tx.commit().await.map_db()?;
        timer.record();
        Ok(true)
    }
}
