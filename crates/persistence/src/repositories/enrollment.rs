//! Enrollment configuration repository.

use domain::models::enrollment::EnrollmentConfig;
use domain::{EngineError, EngineResult};
use sqlx::PgPool;

use crate::entities::EnrollmentConfigEntity;
use crate::error::DbResultExt;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct EnrollmentRepository {
    pool: PgPool,
}

impl EnrollmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self) -> EngineResult<EnrollmentConfig> {
        let timer = QueryTimer::new("get_enrollment_config");
        let result = sqlx::query_as::<_, EnrollmentConfigEntity>(
            r#"
            SELECT max_participants, is_enrollment_active, current_count, updated_by, updated_at
            FROM enrollment_config
            WHERE id = 1
            "#,
        )
        .fetch_one(&self.pool)
        .await;
        timer.record();

        Ok(result.map_db()?.into())
    }

    /// Replaces the limit and switch unless the new limit is below the
    /// current count. The row lock keeps registrations out meanwhile.
    pub async fn update(
        &self,
        max_participants: Option<i32>,
        is_enrollment_active: bool,
        updated_by: &str,
    ) -> EngineResult<EnrollmentConfig> {
        let mut tx = self.pool.begin().await.map_db()?;

        let current: EnrollmentConfig = sqlx::query_as::<_, EnrollmentConfigEntity>(
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

        current
            .check_new_limit(max_participants)
            .map_err(EngineError::Config)?;

        let updated = sqlx::query_as::<_, EnrollmentConfigEntity>(
            r#"
            UPDATE enrollment_config
            SET max_participants = $1, is_enrollment_active = $2, updated_by = $3, updated_at = NOW()
            WHERE id = 1
            RETURNING max_participants, is_enrollment_active, current_count, updated_by, updated_at
            "#,
        )
        .bind(max_participants)
        .bind(is_enrollment_active)
        .bind(updated_by)
        .fetch_one(&mut *tx)
        .await
        .map_db()?;

        tx.commit().await.map_db()?;
        Ok(updated.into())
    }
}
