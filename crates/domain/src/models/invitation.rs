//! Survey invitations: the ledger row for a claimed survey link.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dispatcher statuses that mean the message left the building.
const SENT_STATUSES: [&str; 2] = ["sent", "delivered"];

/// An invitation binding a participant to a survey link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Invitation {
    pub id: Uuid,
    pub participant_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_item_id: Option<Uuid>,
    /// Status string reported by the notification dispatcher, stored verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Applies a dispatcher status, stamping `queued_at`/`sent_at` the first time they apply.
    pub fn apply_message_status(&mut self, status: &str, now: DateTime<Utc>) {
        self.message_status = Some(status.to_string());
        if status.eq_ignore_ascii_case("queued") && self.queued_at.is_none() {
            self.queued_at = Some(now);
        }
        if is_sent_status(status) && self.sent_at.is_none() {
            self.sent_at = Some(now);
        }
    }
}

/// Whether a dispatcher status counts as sent.
pub fn is_sent_status(status: &str) -> bool {
    SENT_STATUSES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(status))
}
