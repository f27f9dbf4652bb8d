//! Participant entity.

use chrono::{DateTime, Utc};
use domain::models::participant::Participant;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct ParticipantEntity {
    pub id: Uuid,
    pub phone: String,
    pub email: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub consented_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ParticipantEntity> for Participant {
    fn from(entity: ParticipantEntity) -> Self {
        Participant {
            id: entity.id,
            phone: entity.phone,
            email: entity.email,
            verified_at: entity.verified_at,
            consented_at: entity.consented_at,
            created_at: entity.created_at,
        }
    }
}
