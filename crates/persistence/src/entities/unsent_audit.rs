//! Unsent audit entity.

use chrono::{DateTime, Utc};
use domain::models::unsent_audit::{ParticipantSnapshot, UnsentAuditRecord};
use sqlx::FromRow;
use uuid::Uuid;

use super::enums::{AssignmentStatusDb, GiftCardTypeDb, ReversalTriggerDb};

/// Database row mapping for the unsent_audit table. The participant snapshot
/// is flattened into three columns.
#[derive(Debug, Clone, FromRow)]
pub struct UnsentAuditEntity {
    pub id: Uuid,
    pub original_assignment_id: Uuid,
    pub pool_item_id: Uuid,
    pub card_code: String,
    pub card_type: GiftCardTypeDb,
    pub card_value_cents: Option<i64>,
    pub previous_status: AssignmentStatusDb,
    pub participant_id: Option<Uuid>,
    pub participant_phone: Option<String>,
    pub participant_email: Option<String>,
    pub sent_by: String,
    pub sent_at: DateTime<Utc>,
    pub source: String,
    pub trigger: ReversalTriggerDb,
    pub unsent_by: String,
    pub requested_by: String,
    pub unsent_at: DateTime<Utc>,
}

impl From<UnsentAuditEntity> for UnsentAuditRecord {
    fn from(entity: UnsentAuditEntity) -> Self {
        UnsentAuditRecord {
            id: entity.id,
            original_assignment_id: entity.original_assignment_id,
            pool_item_id: entity.pool_item_id,
            card_code: entity.card_code,
            card_type: entity.card_type.into(),
            card_value_cents: entity.card_value_cents,
            previous_status: entity.previous_status.into(),
            participant_snapshot: ParticipantSnapshot {
                participant_id: entity.participant_id,
                phone: entity.participant_phone,
                email: entity.participant_email,
            },
            sent_by: entity.sent_by,
            sent_at: entity.sent_at,
            source: entity.source,
            trigger: entity.trigger.into(),
            unsent_by: entity.unsent_by,
            requested_by: entity.requested_by,
            unsent_at: entity.unsent_at,
        }
    }
}
