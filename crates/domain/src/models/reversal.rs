//! Outcomes of reversal and cascade deletion.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pool::PoolItemStatus;
use super::unsent_audit::UnsentAuditRecord;

/// Result of reversing one assignment at the store level.
#[derive(Debug, Clone, PartialEq)]
pub enum ReversalOutcome {
    /// Assignment unsent and its pool item moved to `released_to`.
    Reversed {
        audit: UnsentAuditRecord,
        released_to: PoolItemStatus,
    },
    /// Assignment unsent but its pool item no longer exists.
    Orphaned { audit: UnsentAuditRecord },
    /// Assignment was already unsent; nothing changed.
    AlreadyUnsent,
}

impl ReversalOutcome {
    pub fn audit(&self) -> Option<&UnsentAuditRecord> {
        match self {
            ReversalOutcome::Reversed { audit, .. } | ReversalOutcome::Orphaned { audit } => {
                Some(audit)
            }
            ReversalOutcome::AlreadyUnsent => None,
        }
    }
}

/// Acknowledgement returned to an admin unsend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReversalAck {
    pub assignment_id: Uuid,
    pub already_unsent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_record: Option<UnsentAuditRecord>,
    pub message: String,
}

/// Request body for an admin unsend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UnsendRequest {
    #[serde(default)]
    pub confirmation_phrase: String,
}

/// Summary of a participant deletion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CascadeReport {
    pub participant_id: Uuid,
    /// Gift cards returned to the available pool.
    pub reclaimed_cards: usize,
    /// Redeemed cards reversed and marked invalid.
    pub invalidated_cards: usize,
    /// Assignments reversed whose pool item had disappeared.
    pub orphaned_assignments: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_link_id: Option<Uuid>,
    pub message: String,
}

impl CascadeReport {
    pub fn is_partial(&self) -> bool {
        !self.orphaned_assignments.is_empty()
    }

    /// Builds the human-readable summary from the counters.
    pub fn summarize(&mut self) {
        let mut message = format!(
            "Participant deleted. {} gift card(s) returned to the pool.",
            self.reclaimed_cards
        );
        if self.invalidated_cards > 0 {
            message.push_str(&format!(
                " {} redeemed card(s) reversed and marked invalid.",
                self.invalidated_cards
            ));
        }
        if self.released_link_id.is_some() {
            message.push_str(" Survey link released.");
        }
        if self.is_partial() {
            message.push_str(&format!(
                " Partial success: {} assignment(s) had no pool item and were recorded as orphaned.",
                self.orphaned_assignments.len()
            ));
        }
        self.message = message;
    }
}
