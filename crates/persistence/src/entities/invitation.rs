//! Invitation entity.

use chrono::{DateTime, Utc};
use domain::models::invitation::Invitation;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct InvitationEntity {
    pub id: Uuid,
    pub participant_id: Uuid,
    pub link_item_id: Option<Uuid>,
    pub message_status: Option<String>,
    pub queued_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<InvitationEntity> for Invitation {
    fn from(entity: InvitationEntity) -> Self {
        Invitation {
            id: entity.id,
            participant_id: entity.participant_id,
            link_item_id: entity.link_item_id,
            message_status: entity.message_status,
            queued_at: entity.queued_at,
            sent_at: entity.sent_at,
            completed_at: entity.completed_at,
            created_at: entity.created_at,
        }
    }
}
