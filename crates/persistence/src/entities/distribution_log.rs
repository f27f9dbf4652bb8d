//! Distribution log entity.

use chrono::{DateTime, Utc};
use domain::models::distribution_log::DistributionLogEntry;
use sqlx::FromRow;
use uuid::Uuid;

use super::enums::DistributionActionDb;

#[derive(Debug, Clone, FromRow)]
pub struct DistributionLogEntity {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub action: DistributionActionDb,
    pub detail: Option<String>,
    pub acted_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<DistributionLogEntity> for DistributionLogEntry {
    fn from(entity: DistributionLogEntity) -> Self {
        DistributionLogEntry {
            id: entity.id,
            assignment_id: entity.assignment_id,
            action: entity.action.into(),
            detail: entity.detail,
            acted_by: entity.acted_by,
            created_at: entity.created_at,
        }
    }
}
