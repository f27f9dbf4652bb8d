//! Gift card assignments: the ledger row for a claimed gift card.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use super::gift_card::GiftCardType;

/// Source recorded on assignments drawn from the gift card pool.
pub const POOL_SOURCE: &str = "POOL";

/// Lifecycle of a gift card assignment.
///
/// `Sent -> Delivered -> Redeemed` moves forward only; `Unsent` is reached
/// only through reversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Sent,
    Delivered,
    Redeemed,
    Unsent,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Sent => "SENT",
            AssignmentStatus::Delivered => "DELIVERED",
            AssignmentStatus::Redeemed => "REDEEMED",
            AssignmentStatus::Unsent => "UNSENT",
        }
    }

    /// An assignment holds its pool item until it is unsent.
    pub fn is_active(&self) -> bool {
        !matches!(self, AssignmentStatus::Unsent)
    }

    /// Statuses from which a ledger transition to `self` is allowed.
    pub fn ledger_predecessors(&self) -> &'static [AssignmentStatus] {
        match self {
            AssignmentStatus::Delivered => &[AssignmentStatus::Sent],
            AssignmentStatus::Redeemed => &[AssignmentStatus::Sent, AssignmentStatus::Delivered],
            AssignmentStatus::Sent | AssignmentStatus::Unsent => &[],
        }
    }

    pub fn can_advance_to(&self, next: AssignmentStatus) -> bool {
        next.ledger_predecessors().contains(self)
    }
}

impl FromStr for AssignmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SENT" => Ok(AssignmentStatus::Sent),
            "DELIVERED" => Ok(AssignmentStatus::Delivered),
            "REDEEMED" => Ok(AssignmentStatus::Redeemed),
            "UNSENT" => Ok(AssignmentStatus::Unsent),
            _ => Err(format!("Unknown assignment status: {}", s)),
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel used to deliver a gift card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMethod {
    Email,
    #[default]
    Sms,
    Both,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Email => "EMAIL",
            DeliveryMethod::Sms => "SMS",
            DeliveryMethod::Both => "BOTH",
        }
    }

    pub fn requires_email(&self) -> bool {
        matches!(self, DeliveryMethod::Email | DeliveryMethod::Both)
    }
}

impl FromStr for DeliveryMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "EMAIL" => Ok(DeliveryMethod::Email),
            "SMS" => Ok(DeliveryMethod::Sms),
            "BOTH" => Ok(DeliveryMethod::Both),
            _ => Err(format!("Unknown delivery method: {}", s)),
        }
    }
}

impl std::fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gift card handed to a participant.
///
/// `card_code`, `card_type` and `card_value_cents` are snapshots taken at
/// claim time. `participant_id` and `invitation_id` are cleared when the
/// participant is deleted; the row itself is never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GiftCardAssignment {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation_id: Option<Uuid>,
    pub pool_item_id: Uuid,
    pub card_code: String,
    pub card_type: GiftCardType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_value_cents: Option<i64>,
    pub status: AssignmentStatus,
    pub delivery_method: DeliveryMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_status: Option<String>,
    pub sent_by: String,
    pub sent_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsent_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub source: String,
}

impl GiftCardAssignment {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Applies a forward ledger transition in place.
    pub fn advance(&mut self, next: AssignmentStatus, now: DateTime<Utc>) -> bool {
        if !self.status.can_advance_to(next) {
            return false;
        }
        match next {
            AssignmentStatus::Delivered => self.delivered_at = Some(now),
            AssignmentStatus::Redeemed => self.redeemed_at = Some(now),
            AssignmentStatus::Sent | AssignmentStatus::Unsent => {}
        }
        self.status = next;
        true
    }
}

/// Parameters for a gift card claim on behalf of one participant.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAssignment {
    pub participant_id: Uuid,
    pub delivery_method: DeliveryMethod,
    pub notes: Option<String>,
    pub sent_by: String,
    pub source: String,
}

/// Request body for sending a gift card to one participant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct SendGiftCardRequest {
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Request body for updating assignment notes.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdateNotesRequest {
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

/// Status reported by the notification dispatcher after the initial send.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct ReportStatusRequest {
    #[validate(custom(function = "crate::services::notification::validate_dispatch_status"))]
    pub status: String,
}

/// Query parameters for the assignment listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ListAssignmentsQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<AssignmentStatus>,
    /// Case-insensitive match on card code or the owner's phone.
    pub search: Option<String>,
    /// `true` lists only assignments whose participant was deleted.
    pub orphaned: Option<bool>,
}

impl ListAssignmentsQuery {
    pub fn page_params(&self) -> shared::pagination::PageParams {
        shared::pagination::PageParams {
            page: self.page,
            per_page: self.per_page,
        }
    }

    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}
