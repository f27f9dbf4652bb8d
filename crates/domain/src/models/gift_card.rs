//! Gift card pool items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::pool::PoolItemStatus;

/// Redemption page used when an upload does not name one.
pub const DEFAULT_REDEMPTION_URL: &str = "https://www.amazon.com/gc/redeem";

/// Gift card brand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GiftCardType {
    #[default]
    Amazon,
    Visa,
    Target,
    Other,
}

impl GiftCardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GiftCardType::Amazon => "AMAZON",
            GiftCardType::Visa => "VISA",
            GiftCardType::Target => "TARGET",
            GiftCardType::Other => "OTHER",
        }
    }
}

impl FromStr for GiftCardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "AMAZON" => Ok(GiftCardType::Amazon),
            "VISA" => Ok(GiftCardType::Visa),
            "TARGET" => Ok(GiftCardType::Target),
            "OTHER" => Ok(GiftCardType::Other),
            _ => Err(format!("Unknown gift card type: {}", s)),
        }
    }
}

impl std::fmt::Display for GiftCardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gift card in the gift card pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GiftCard {
    pub id: Uuid,
    pub card_code: String,
    pub card_type: GiftCardType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_value_cents: Option<i64>,
    pub redemption_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub status: PoolItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_label: Option<String>,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_assignment_id: Option<Uuid>,
}

impl GiftCard {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Whether the card may be handed out by a claim at `now`.
    pub fn is_claimable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == PoolItemStatus::Available && !self.is_expired_at(now)
    }
}

/// A validated gift card ready for insertion.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct NewGiftCard {
    #[validate(custom(function = "shared::validation::validate_gift_card_code"))]
    pub card_code: String,
    #[serde(default)]
    pub card_type: GiftCardType,
    #[validate(range(min = 1, message = "card_value_cents must be positive"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_value_cents: Option<i64>,
    #[validate(custom(function = "shared::validation::validate_http_url"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redemption_url: Option<String>,
    #[validate(length(max = 2000, message = "instructions cannot exceed 2000 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[validate(length(max = 100, message = "batch_label cannot exceed 100 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewGiftCard {
    /// Uppercases the code and fills in the default redemption URL.
    pub fn normalized(mut self, default_redemption_url: &str) -> Self {
        self.card_code = shared::validation::normalize_gift_card_code(&self.card_code);
        if self.redemption_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            self.redemption_url = Some(default_redemption_url.to_string());
        }
        self
    }
}

/// Request to edit the code of an available gift card.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdateGiftCardCodeRequest {
    #[validate(length(min = 1, message = "card_code is required"))]
    pub card_code: String,
}
