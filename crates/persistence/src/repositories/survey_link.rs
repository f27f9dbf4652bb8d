//! Survey link pool repository.

use domain::models::allocation::{ClaimOutcome, LinkClaim};
use domain::models::pool::{LinkPoolCounts, ListPoolQuery};
use domain::models::survey_link::{NewSurveyLink, SurveyLink};
use domain::{EngineError, EngineResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::search_pattern;
use crate::entities::{InvitationEntity, PoolItemStatusDb, SurveyLinkEntity};
use crate::error::DbResultExt;
use crate::metrics::QueryTimer;

#[derive(Debug, FromRow)]
struct LinkCountsRow {
    total: i64,
    available: i64,
    assigned: i64,
}

#[derive(Clone)]
pub struct SurveyLinkRepository {
    pool: PgPool,
}

impl SurveyLinkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, link: NewSurveyLink, uploaded_by: &str) -> EngineResult<SurveyLink> {
        let timer = QueryTimer::new("insert_survey_link");
        let result = sqlx::query_as::<_, SurveyLinkEntity>(
            r#"
            INSERT INTO survey_links (long_url, short_url, batch_label, uploaded_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, long_url, short_url, status, batch_label, uploaded_by, uploaded_at, assigned_at
            "#,
        )
        .bind(&link.long_url)
        .bind(&link.short_url)
        .bind(&link.batch_label)
        .bind(uploaded_by)
        .fetch_one(&self.pool)
        .await;
        timer.record();

        Ok(result.map_db()?.into())
    }

    pub async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<SurveyLink>> {
        let entity = sqlx::query_as::<_, SurveyLinkEntity>(
            r#"
            SELECT id, long_url, short_url, status, batch_label, uploaded_by, uploaded_at, assigned_at
            FROM survey_links
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_db()?;

        Ok(entity.map(Into::into))
    }

    pub async fn list(&self, query: &ListPoolQuery) -> EngineResult<(Vec<SurveyLink>, i64)> {
        let timer = QueryTimer::new("list_survey_links");
        let params = query.page_params();
        let status = query.status.map(PoolItemStatusDb::from);
        let pattern = search_pattern(query.search_term());

        let entities = sqlx::query_as::<_, SurveyLinkEntity>(
            r#"
            SELECT id, long_url, short_url, status, batch_label, uploaded_by, uploaded_at, assigned_at
            FROM survey_links
            WHERE ($1::pool_item_status IS NULL OR status = $1)
              AND ($2::text IS NULL OR long_url ILIKE $2 OR short_url ILIKE $2 OR batch_label ILIKE $2)
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
            FROM survey_links
            WHERE ($1::pool_item_status IS NULL OR status = $1)
              AND ($2::text IS NULL OR long_url ILIKE $2 OR short_url ILIKE $2 OR batch_label ILIKE $2)
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

    pub async fn counts(&self) -> EngineResult<LinkPoolCounts> {
        let row = sqlx::query_as::<_, LinkCountsRow>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'AVAILABLE') AS available,
                COUNT(*) FILTER (WHERE status = 'ASSIGNED') AS assigned
            FROM survey_links
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_db()?;

        Ok(LinkPoolCounts {
            total: row.total,
            available: row.available,
            assigned: row.assigned,
        })
    }

    /// Claims the oldest AVAILABLE link for the participant's invitation.
    ///
    /// The participant row lock serializes claims for one participant; the
    /// `SKIP LOCKED` subselect lets concurrent claims for different
    /// participants take different links without waiting.
    pub async fn claim(&self, participant_id: Uuid) -> EngineResult<ClaimOutcome<LinkClaim>> {
        let timer = QueryTimer::new("claim_survey_link");
        let mut tx = self.pool.begin().await.map_db()?;

        let participant: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM participants WHERE id = $1 FOR UPDATE")
                .bind(participant_id)
                .fetch_optional(&mut *tx)
                .await
                .map_db()?;
        if participant.is_none() {
            return Err(EngineError::NotFound("Participant not found".into()));
        }

        let existing = sqlx::query_as::<_, InvitationEntity>(
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

        if let Some(invitation) = &existing {
            if let Some(link_id) = invitation.link_item_id {
                let link = sqlx::query_as::<_, SurveyLinkEntity>(
                    r#"
                    SELECT id, long_url, short_url, status, batch_label, uploaded_by, uploaded_at, assigned_at
                    FROM survey_links
                    WHERE id = $1
                    "#,
                )
                .bind(link_id)
                .fetch_one(&mut *tx)
                .await
                .map_db()?;
                tx.commit().await.map_db()?;
                timer.record();

                return Ok(ClaimOutcome::Claimed(LinkClaim {
                    invitation: invitation.clone().into(),
                    link: link.into(),
                    newly_claimed: false,
                }));
            }
        }

        let claimed = sqlx::query_as::<_, SurveyLinkEntity>(
            r#"
            UPDATE survey_links
            SET status = 'ASSIGNED', assigned_at = NOW()
            WHERE id = (
                SELECT id FROM survey_links
                WHERE status = 'AVAILABLE'
                ORDER BY uploaded_at, id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, long_url, short_url, status, batch_label, uploaded_by, uploaded_at, assigned_at
            "#,
        )
        .fetch_optional(&mut *tx)
        .await
        .map_db()?;

        let Some(link) = claimed else {
            tx.rollback().await.map_db()?;
            timer.record();
            return Ok(ClaimOutcome::NoItemAvailable);
        };

        let invitation = match existing {
            Some(invitation) => sqlx::query_as::<_, InvitationEntity>(
                r#"
                UPDATE invitations
                SET link_item_id = $2
                WHERE id = $1
                RETURNING id, participant_id, link_item_id, message_status, queued_at, sent_at, completed_at, created_at
                "#,
            )
            .bind(invitation.id)
            .bind(link.id)
            .fetch_one(&mut *tx)
            .await
            .map_db()?,
            None => sqlx::query_as::<_, InvitationEntity>(
                r#"
                INSERT INTO invitations (participant_id, link_item_id)
                VALUES ($1, $2)
                RETURNING id, participant_id, link_item_id, message_status, queued_at, sent_at, completed_at, created_at
                "#,
            )
            .bind(participant_id)
            .bind(link.id)
            .fetch_one(&mut *tx)
            .await
            .map_db()?,
        };

        tx.commit().await.map_db()?;
        timer.record();

        Ok(ClaimOutcome::Claimed(LinkClaim {
            invitation: invitation.into(),
            link: link.into(),
            newly_claimed: true,
        }))
    }

    /// Deletes a link that is not ASSIGNED. Invitations pointing at it lose
    /// their link through the foreign key.
    /// An ASSIGNED link left behind by a deleted participant is no longer
    /// referenced by any invitation and may be deleted.
    pub async fn delete(&self, id: Uuid) -> EngineResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM survey_links
            WHERE id = $1
              AND (
                status <> 'ASSIGNED'
                OR NOT EXISTS (SELECT 1 FROM invitations WHERE link_item_id = survey_links.id)
              )
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_db()?;
        if result.rows_affected() > 0 {
            return Ok(());
        }

        match self.find_by_id(id).await? {
            None => Err(EngineError::NotFound("Survey link not found".into())),
            Some(_) => Err(EngineError::CascadeBlocked(
                "Cannot delete a survey link while it is assigned".into(),
            )),
        }
    }
}
