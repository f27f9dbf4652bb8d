//! Enrollment configuration entity.

use chrono::{DateTime, Utc};
use domain::models::enrollment::EnrollmentConfig;
use sqlx::FromRow;

/// Row of the singleton `enrollment_config` table.
#[derive(Debug, Clone, FromRow)]
pub struct EnrollmentConfigEntity {
    pub max_participants: Option<i32>,
    pub is_enrollment_active: bool,
    pub current_count: i32,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

impl From<EnrollmentConfigEntity> for EnrollmentConfig {
    fn from(entity: EnrollmentConfigEntity) -> Self {
        EnrollmentConfig {
            max_participants: entity.max_participants,
            is_enrollment_active: entity.is_enrollment_active,
            current_count: entity.current_count,
            updated_by: entity.updated_by,
            updated_at: entity.updated_at,
        }
    }
}
