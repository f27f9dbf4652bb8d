//! Assignment distribution log. Rows are appended inside the transaction
//! that changes the assignment and are never updated.

use domain::models::distribution_log::DistributionLogEntry;
use domain::EngineResult;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::entities::{DistributionActionDb, DistributionLogEntity};
use crate::error::DbResultExt;

/// Appends one entry on the caller's transaction.
pub(crate) async fn append(conn: &mut PgConnection, entry: &DistributionLogEntry) -> EngineResult<()> {
    sqlx::query(
        r#"
        INSERT INTO assignment_distribution_log (id, assignment_id, action, detail, acted_by, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(entry.id)
    .bind(entry.assignment_id)
    .bind(DistributionActionDb::from(entry.action))
    .bind(&entry.detail)
    .bind(&entry.acted_by)
    .bind(entry.created_at)
    .execute(conn)
    .await
    .map_db()?;
    Ok(())
}

#[derive(Clone)]
pub struct DistributionLogRepository {
    pool: PgPool,
}

impl DistributionLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Oldest first.
    pub async fn list(&self, assignment_id: Uuid) -> EngineResult<Vec<DistributionLogEntry>> {
        let entities = sqlx::query_as::<_, DistributionLogEntity>(
            r#"
            SELECT id, assignment_id, action, detail, acted_by, created_at
            FROM assignment_distribution_log
            WHERE assignment_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(assignment_id)
        .fetch_all(&self.pool)
        .await
        .map_db()?;

        Ok(entities.into_iter().map(Into::into).collect())
    }
}
