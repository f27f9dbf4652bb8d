//! Unsent audit log queries. Records are written by the reversal transaction
//! in `AssignmentRepository::reverse` and never updated.

use domain::models::unsent_audit::{ListUnsentAuditQuery, UnsentAuditRecord};
use domain::EngineResult;
use sqlx::PgPool;

use crate::entities::UnsentAuditEntity;
use crate::error::DbResultExt;

#[derive(Clone)]
pub struct UnsentAuditRepository {
    pool: PgPool,
}

impl UnsentAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Newest first, optionally for one assignment.
    pub async fn list(&self, query: &ListUnsentAuditQuery) -> EngineResult<(Vec<UnsentAuditRecord>, i64)> {
        let params = query.page_params();

        let entities = sqlx::query_as::<_, UnsentAuditEntity>(
            r#"
            SELECT id, original_assignment_id, pool_item_id, card_code, card_type, card_value_cents, previous_status, participant_id, participant_phone, participant_email, sent_by, sent_at, source, trigger, unsent_by, requested_by, unsent_at
            FROM unsent_audit
            WHERE ($1::uuid IS NULL OR original_assignment_id = $1)
            ORDER BY unsent_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(query.assignment_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .map_db()?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM unsent_audit WHERE ($1::uuid IS NULL OR original_assignment_id = $1)",
        )
        .bind(query.assignment_id)
        .fetch_one(&self.pool)
        .await
        .map_db()?;

        Ok((entities.into_iter().map(Into::into).collect(), total))
    }
}
