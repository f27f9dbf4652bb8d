//! Gift card assignment entity.

use chrono::{DateTime, Utc};
use domain::models::assignment::GiftCardAssignment;
use sqlx::FromRow;
use uuid::Uuid;

use super::enums::{AssignmentStatusDb, DeliveryMethodDb, GiftCardTypeDb};

/// Database row mapping for the gift_card_assignments table.
#[derive(Debug, Clone, FromRow)]
pub struct GiftCardAssignmentEntity {
    pub id: Uuid,
    pub participant_id: Option<Uuid>,
    pub invitation_id: Option<Uuid>,
    pub pool_item_id: Uuid,
    pub card_code: String,
    pub card_type: GiftCardTypeDb,
    pub card_value_cents: Option<i64>,
    pub status: AssignmentStatusDb,
    pub delivery_method: DeliveryMethodDb,
    pub delivery_status: Option<String>,
    pub sent_by: String,
    pub sent_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub unsent_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub source: String,
}

impl From<GiftCardAssignmentEntity> for GiftCardAssignment {
    fn from(entity: GiftCardAssignmentEntity) -> Self {
        GiftCardAssignment {
            id: entity.id,
            participant_id: entity.participant_id,
            invitation_id: entity.invitation_id,
            pool_item_id: entity.pool_item_id,
            card_code: entity.card_code,
            card_type: entity.card_type.into(),
            card_value_cents: entity.card_value_cents,
            status: entity.status.into(),
            delivery_method: entity.delivery_method.into(),
            delivery_status: entity.delivery_status,
            sent_by: entity.sent_by,
            sent_at: entity.sent_at,
            delivered_at: entity.delivered_at,
            redeemed_at: entity.redeemed_at,
            unsent_at: entity.unsent_at,
            notes: entity.notes,
            source: entity.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::assignment::{AssignmentStatus, DeliveryMethod};

    #[test]
    fn test_entity_to_domain() {
        let entity = GiftCardAssignmentEntity {
            id: Uuid::new_v4(),
            participant_id: None,
            invitation_id: None,
            pool_item_id: Uuid::new_v4(),
            card_code: "ABCD-123456-WXYZ".to_string(),
            card_type: GiftCardTypeDb::Visa,
            card_value_cents: Some(5000),
            status: AssignmentStatusDb::Unsent,
            delivery_method: DeliveryMethodDb::Both,
            delivery_status: Some("failed".to_string()),
            sent_by: "admin".to_string(),
            sent_at: Utc::now(),
            delivered_at: None,
            redeemed_at: None,
            unsent_at: Some(Utc::now()),
            notes: None,
            source: "POOL".to_string(),
        };

        let assignment: GiftCardAssignment = entity.into();
        assert_eq!(assignment.status, AssignmentStatus::Unsent);
        assert_eq!(assignment.delivery_method, DeliveryMethod::Both);
        assert!(!assignment.is_active());
    }
}
