//! Append-only audit trail of reversed gift card assignments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::assignment::{AssignmentStatus, GiftCardAssignment};
use super::gift_card::GiftCardType;
use super::participant::Participant;

/// Actor recorded when a reversal is triggered by participant deletion.
pub const SYSTEM_DELETE_ACTOR: &str = "SYSTEM_DELETE";

/// What caused a reversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReversalTrigger {
    /// An admin unsend confirmed with the confirmation phrase.
    Admin,
    /// System reclaim while deleting the owning participant.
    ParticipantDeletion,
}

impl ReversalTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReversalTrigger::Admin => "admin",
            ReversalTrigger::ParticipantDeletion => "participant_deletion",
        }
    }
}

impl FromStr for ReversalTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(ReversalTrigger::Admin),
            "participant_deletion" => Ok(ReversalTrigger::ParticipantDeletion),
            _ => Err(format!("Unknown reversal trigger: {}", s)),
        }
    }
}

impl std::fmt::Display for ReversalTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Participant contact details as they were at reversal time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ParticipantSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl From<&Participant> for ParticipantSnapshot {
    fn from(p: &Participant) -> Self {
        Self {
            participant_id: Some(p.id),
            phone: Some(p.phone.clone()),
            email: p.email.clone(),
        }
    }
}

/// One reversed assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UnsentAuditRecord {
    pub id: Uuid,
    pub original_assignment_id: Uuid,
    pub pool_item_id: Uuid,
    pub card_code: String,
    pub card_type: GiftCardType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_value_cents: Option<i64>,
    pub previous_status: AssignmentStatus,
    pub participant_snapshot: ParticipantSnapshot,
    pub sent_by: String,
    pub sent_at: DateTime<Utc>,
    pub source: String,
    pub trigger: ReversalTrigger,
    /// Actor the reversal is attributed to.
    pub unsent_by: String,
    /// Admin whose request caused the reversal. Equals `unsent_by` for admin
    /// unsends; for cascades it is the admin who deleted the participant.
    pub requested_by: String,
    pub unsent_at: DateTime<Utc>,
}

impl UnsentAuditRecord {
    /// Captures the pre-reversal state of `assignment`.
    pub fn capture(
        assignment: &GiftCardAssignment,
        participant: Option<&Participant>,
        trigger: ReversalTrigger,
        unsent_by: &str,
        requested_by: &str,
        unsent_at: DateTime<Utc>,
    ) -> Self {
        let participant_snapshot = participant.map(ParticipantSnapshot::from).unwrap_or_else(|| {
            ParticipantSnapshot {
                participant_id: assignment.participant_id,
                ..Default::default()
            }
        });

        Self {
            id: Uuid::new_v4(),
            original_assignment_id: assignment.id,
            pool_item_id: assignment.pool_item_id,
            card_code: assignment.card_code.clone(),
            card_type: assignment.card_type,
            card_value_cents: assignment.card_value_cents,
            previous_status: assignment.status,
            participant_snapshot,
            sent_by: assignment.sent_by.clone(),
            sent_at: assignment.sent_at,
            source: assignment.source.clone(),
            trigger,
            unsent_by: unsent_by.to_string(),
            requested_by: requested_by.to_string(),
            unsent_at,
        }
    }
}

/// Query parameters for the unsent audit listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ListUnsentAuditQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub assignment_id: Option<Uuid>,
}

impl ListUnsentAuditQuery {
    pub fn page_params(&self) -> shared::pagination::PageParams {
        shared::pagination::PageParams {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::assignment::{DeliveryMethod, POOL_SOURCE};

    fn assignment() -> GiftCardAssignment {
        GiftCardAssignment {
            id: Uuid::new_v4(),
            participant_id: Some(Uuid::new_v4()),
            invitation_id: None,
            pool_item_id: Uuid::new_v4(),
            card_code: "ABCD-123456-WXYZ".into(),
            card_type: GiftCardType::Visa,
            card_value_cents: Some(500),
            status: AssignmentStatus::Delivered,
            delivery_method: DeliveryMethod::Sms,
            delivery_status: Some("delivered".into()),
            sent_by: "admin@example.org".into(),
            sent_at: Utc::now(),
            delivered_at: Some(Utc::now()),
            redeemed_at: None,
            unsent_at: None,
            notes: None,
            source: POOL_SOURCE.into(),
        }
    }

    #[test]
    fn test_capture_with_participant() {
        let a = assignment();
        let participant = Participant {
            id: a.participant_id.unwrap(),
            phone: "+15551234567".into(),
            email: Some("p@example.org".into()),
            verified_at: None,
            consented_at: None,
            created_at: Utc::now(),
        };

        let record = UnsentAuditRecord::capture(
            &a,
            Some(&participant),
            ReversalTrigger::Admin,
            "admin@example.org",
            "admin@example.org",
            Utc::now(),
        );

        assert_eq!(record.original_assignment_id, a.id);
        assert_eq!(record.previous_status, AssignmentStatus::Delivered);
        assert_eq!(record.participant_snapshot.phone.as_deref(), Some("+15551234567"));
        assert_eq!(record.card_code, a.card_code);
    }

    #[test]
    fn test_capture_without_participant_keeps_id() {
        let a = assignment();
        let record = UnsentAuditRecord::capture(
            &a,
            None,
            ReversalTrigger::ParticipantDeletion,
            SYSTEM_DELETE_ACTOR,
            "owner@example.org",
            Utc::now(),
        );
        assert_eq!(record.participant_snapshot.participant_id, a.participant_id);
        assert!(record.participant_snapshot.phone.is_none());
        assert_eq!(record.unsent_by, SYSTEM_DELETE_ACTOR);
        assert_eq!(record.requested_by, "owner@example.org");
    }
}
