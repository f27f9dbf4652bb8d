//! Claim outcomes and batch send results.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::assignment::{DeliveryMethod, GiftCardAssignment};
use super::gift_card::GiftCard;
use super::invitation::Invitation;
use super::survey_link::SurveyLink;

/// Result of an atomic claim. Exhaustion is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome<T> {
    Claimed(T),
    NoItemAvailable,
}

impl<T> ClaimOutcome<T> {
    pub fn is_claimed(&self) -> bool {
        matches!(self, ClaimOutcome::Claimed(_))
    }

    pub fn claimed(self) -> Option<T> {
        match self {
            ClaimOutcome::Claimed(value) => Some(value),
            ClaimOutcome::NoItemAvailable => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ClaimOutcome<U> {
        match self {
            ClaimOutcome::Claimed(value) => ClaimOutcome::Claimed(f(value)),
            ClaimOutcome::NoItemAvailable => ClaimOutcome::NoItemAvailable,
        }
    }
}

/// A survey link bound to a participant's invitation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LinkClaim {
    pub invitation: Invitation,
    pub link: SurveyLink,
    /// `false` when the participant already held this link.
    pub newly_claimed: bool,
}

/// A gift card bound to a new assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GiftCardClaim {
    pub assignment: GiftCardAssignment,
    pub card: GiftCard,
}

/// Request body for sending gift cards to several participants.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct BatchSendRequest {
    #[validate(length(min = 1, message = "At least one participant is required"))]
    pub participant_ids: Vec<Uuid>,
    #[serde(default)]
    pub delivery_method: DeliveryMethod,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// One successful claim in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchSendSuccess {
    pub participant_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation_id: Option<Uuid>,
    pub assignment_id: Uuid,
    pub pool_item_id: Uuid,
    pub card_code: String,
}

/// One failed request in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchSendFailure {
    pub participant_id: Uuid,
    pub reason: String,
}

/// Aggregated per-request results of a batch send.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchSendResult {
    pub total_requested: usize,
    pub successful: usize,
    pub failed: usize,
    pub successes: Vec<BatchSendSuccess>,
    pub failures: Vec<BatchSendFailure>,
}

impl BatchSendResult {
    pub fn push_success(&mut self, claim: &GiftCardClaim, participant_id: Uuid) {
        self.successful += 1;
        self.successes.push(BatchSendSuccess {
            participant_id,
            invitation_id: claim.assignment.invitation_id,
            assignment_id: claim.assignment.id,
            pool_item_id: claim.card.id,
            card_code: claim.assignment.card_code.clone(),
        });
    }

    pub fn push_failure(&mut self, participant_id: Uuid, reason: impl Into<String>) {
        self.failed += 1;
        self.failures.push(BatchSendFailure {
            participant_id,
            reason: reason.into(),
        });
    }
}
