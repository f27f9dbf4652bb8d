//! Gift card entity.

use chrono::{DateTime, Utc};
use domain::models::gift_card::GiftCard;
use sqlx::FromRow;
use uuid::Uuid;

use super::enums::{GiftCardTypeDb, PoolItemStatusDb};

/// Database row mapping for the gift_cards table.
#[derive(Debug, Clone, FromRow)]
pub struct GiftCardEntity {
    pub id: Uuid,
    pub card_code: String,
    pub card_type: GiftCardTypeDb,
    pub card_value_cents: Option<i64>,
    pub redemption_url: String,
    pub instructions: Option<String>,
    pub status: PoolItemStatusDb,
    pub batch_label: Option<String>,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub assigned_assignment_id: Option<Uuid>,
}

impl From<GiftCardEntity> for GiftCard {
    fn from(entity: GiftCardEntity) -> Self {
        GiftCard {
            id: entity.id,
            card_code: entity.card_code,
            card_type: entity.card_type.into(),
            card_value_cents: entity.card_value_cents,
            redemption_url: entity.redemption_url,
            instructions: entity.instructions,
            status: entity.status.into(),
            batch_label: entity.batch_label,
            uploaded_by: entity.uploaded_by,
            uploaded_at: entity.uploaded_at,
            expires_at: entity.expires_at,
            assigned_at: entity.assigned_at,
            assigned_assignment_id: entity.assigned_assignment_id,
        }
    }
}
