//! Per-assignment distribution history.
//!
//! One entry is appended, in the same store transaction, for every change to
//! a gift card assignment. Entries are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// What happened to an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributionAction {
    /// Card claimed from the pool.
    Created,
    /// First dispatch after the claim; `detail` holds the dispatcher status.
    Dispatched,
    /// Admin resend; `detail` holds the dispatcher status.
    Resent,
    /// Status reported later by the dispatcher.
    DeliveryReported,
    MarkedDelivered,
    MarkedRedeemed,
    NotesUpdated,
    Unsent,
}

impl DistributionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionAction::Created => "CREATED",
            DistributionAction::Dispatched => "DISPATCHED",
            DistributionAction::Resent => "RESENT",
            DistributionAction::DeliveryReported => "DELIVERY_REPORTED",
            DistributionAction::MarkedDelivered => "MARKED_DELIVERED",
            DistributionAction::MarkedRedeemed => "MARKED_REDEEMED",
            DistributionAction::NotesUpdated => "NOTES_UPDATED",
            DistributionAction::Unsent => "UNSENT",
        }
    }
}

impl FromStr for DistributionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CREATED" => Ok(DistributionAction::Created),
            "DISPATCHED" => Ok(DistributionAction::Dispatched),
            "RESENT" => Ok(DistributionAction::Resent),
            "DELIVERY_REPORTED" => Ok(DistributionAction::DeliveryReported),
            "MARKED_DELIVERED" => Ok(DistributionAction::MarkedDelivered),
            "MARKED_REDEEMED" => Ok(DistributionAction::MarkedRedeemed),
            "NOTES_UPDATED" => Ok(DistributionAction::NotesUpdated),
            "UNSENT" => Ok(DistributionAction::Unsent),
            _ => Err(format!("Unknown distribution action: {}", s)),
        }
    }
}

impl std::fmt::Display for DistributionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DistributionLogEntry {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub action: DistributionAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub acted_by: String,
    pub created_at: DateTime<Utc>,
}

impl DistributionLogEntry {
    pub fn new(
        assignment_id: Uuid,
        action: DistributionAction,
        detail: Option<String>,
        acted_by: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            assignment_id,
            action,
            detail,
            acted_by: acted_by.to_string(),
            created_at,
        }
    }
}
