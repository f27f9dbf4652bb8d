//! Allocation service: claims links and gift cards and dispatches them.
//!
//! Exhaustion comes back as `ClaimOutcome::NoItemAvailable` so callers can
//! queue the participant for manual follow-up instead of treating it as a
//! failure. Dispatch happens after the claim commits; a failed send leaves
//! the item ASSIGNED for a later resend.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::allocation::{BatchSendResult, ClaimOutcome, GiftCardClaim, LinkClaim};
use crate::models::assignment::{DeliveryMethod, GiftCardAssignment, NewAssignment, POOL_SOURCE};
use crate::models::distribution_log::DistributionAction;
use crate::models::participant::Participant;
use crate::models::pool::PoolKind;
use crate::services::notification::{
    DispatchContent, DispatchRequest, NotificationDispatcher, Recipient,
};
use crate::store::AllocationStore;

/// Default upper bound on participants per batch send.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Claims pool items on behalf of participants.
#[derive(Clone)]
pub struct AllocationService {
    store: Arc<dyn AllocationStore>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    max_batch_size: usize,
}

impl AllocationService {
    pub fn new(store: Arc<dyn AllocationStore>, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    async fn participant(&self, participant_id: Uuid) -> EngineResult<Participant> {
        self.store
            .find_participant(participant_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Participant not found".into()))
    }

    /// Binds a survey link to the participant's invitation and sends it.
    ///
    /// A participant who already holds a link gets the same link back and no
    /// second message is sent.
    pub async fn claim_link(&self, participant_id: Uuid) -> EngineResult<ClaimOutcome<LinkClaim>> {
        let participant = self.participant(participant_id).await?;

        let mut claim = match self.store.claim_link(participant_id).await? {
            ClaimOutcome::Claimed(claim) => claim,
            ClaimOutcome::NoItemAvailable => {
                warn!(participant_id = %participant_id, "Survey link pool exhausted");
                return Ok(ClaimOutcome::NoItemAvailable);
            }
        };
        if !claim.newly_claimed {
            return Ok(ClaimOutcome::Claimed(claim));
        }

        info!(
            participant_id = %participant_id,
            link_id = %claim.link.id,
            invitation_id = %claim.invitation.id,
            "Survey link claimed"
        );

        let request = DispatchRequest {
            recipient: recipient(&participant),
            delivery_method: DeliveryMethod::Sms,
            content: DispatchContent::SurveyLink {
                invitation_id: claim.invitation.id,
                url: claim.link.delivery_url().to_string(),
            },
        };
        let status = self.dispatcher.dispatch(&request).await;
        claim.invitation = self
            .store
            .record_invitation_status(claim.invitation.id, &status)
            .await?;

        Ok(ClaimOutcome::Claimed(claim))
    }

    /// Claims one gift card for an eligible participant and sends it.
    pub async fn claim_gift_card(
        &self,
        participant_id: Uuid,
        delivery_method: DeliveryMethod,
        notes: Option<String>,
        sent_by: &str,
    ) -> EngineResult<ClaimOutcome<GiftCardClaim>> {
        let participant = self.participant(participant_id).await?;
        if delivery_method.requires_email() && participant.email.is_none() {
            return Err(EngineError::Validation(format!(
                "Participant has no email address for {} delivery",
                delivery_method
            )));
        }

        let request = NewAssignment {
            participant_id,
            delivery_method,
            notes,
            sent_by: sent_by.to_string(),
            source: POOL_SOURCE.to_string(),
        };
        let mut claim = match self.store.claim_gift_card(request).await? {
            ClaimOutcome::Claimed(claim) => claim,
            ClaimOutcome::NoItemAvailable => {
                warn!(participant_id = %participant_id, "Gift card pool exhausted");
                return Ok(ClaimOutcome::NoItemAvailable);
            }
        };

        info!(
            participant_id = %participant_id,
            assignment_id = %claim.assignment.id,
            pool_item_id = %claim.card.id,
            sent_by = %sent_by,
            "Gift card claimed"
        );

        claim.assignment = self
            .dispatch_gift_card(&participant, &claim.assignment, DistributionAction::Dispatched, sent_by)
            .await?;
        Ok(ClaimOutcome::Claimed(claim))
    }

    /// Sends gift cards to several participants. Each participant is an
    /// independent claim; one failure never rolls back another's success.
    pub async fn claim_many(
        &self,
        participant_ids: &[Uuid],
        delivery_method: DeliveryMethod,
        notes: Option<String>,
        sent_by: &str,
    ) -> EngineResult<BatchSendResult> {
        if participant_ids.is_empty() {
            return Err(EngineError::Validation(
                "At least one participant is required".into(),
            ));
        }
        if participant_ids.len() > self.max_batch_size {
            return Err(EngineError::Validation(format!(
                "A batch can include at most {} participants",
                self.max_batch_size
            )));
        }

        let mut result = BatchSendResult {
            total_requested: participant_ids.len(),
            ..Default::default()
        };

        for &participant_id in participant_ids {
            let outcome = self
                .claim_gift_card(participant_id, delivery_method, notes.clone(), sent_by)
                .await;
            match outcome {
                Ok(ClaimOutcome::Claimed(claim)) => result.push_success(&claim, participant_id),
                Ok(ClaimOutcome::NoItemAvailable) => result.push_failure(
                    participant_id,
                    EngineError::NoItemAvailable(PoolKind::GiftCard).to_string(),
                ),
                Err(e) => result.push_failure(participant_id, e.to_string()),
            }
        }

        info!(
            total_requested = result.total_requested,
            successful = result.successful,
            failed = result.failed,
            sent_by = %sent_by,
            "Batch gift card send finished"
        );
        Ok(result)
    }

    /// Re-sends an active assignment's card. Never claims a new item.
    pub async fn resend_gift_card(
        &self,
        assignment_id: Uuid,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment> {
        let assignment = self
            .store
            .find_assignment(assignment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Gift card assignment not found".into()))?;
        if !assignment.is_active() {
            return Err(EngineError::Conflict(
                "Unsent gift cards cannot be resent".into(),
            ));
        }
        let participant_id = assignment.participant_id.ok_or_else(|| {
            EngineError::Conflict("Assignment no longer belongs to a participant".into())
        })?;
        let participant = self.participant(participant_id).await?;

        info!(assignment_id = %assignment_id, acted_by = %acted_by, "Resending gift card");
        self.dispatch_gift_card(&participant, &assignment, DistributionAction::Resent, acted_by)
            .await
    }

    async fn dispatch_gift_card(
        &self,
        participant: &Participant,
        assignment: &GiftCardAssignment,
        action: DistributionAction,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment> {
        let card = self.store.find_gift_card(assignment.pool_item_id).await?;
        let request = DispatchRequest {
            recipient: recipient(participant),
            delivery_method: assignment.delivery_method,
            content: DispatchContent::GiftCard {
                assignment_id: assignment.id,
                card_code: assignment.card_code.clone(),
                redemption_url: card
                    .as_ref()
                    .map(|c| c.redemption_url.clone())
                    .unwrap_or_default(),
                instructions: card.as_ref().and_then(|c| c.instructions.clone()),
                card_value_cents: assignment.card_value_cents,
            },
        };

        let status = self.dispatcher.dispatch(&request).await;
        self.store
            .record_delivery_status(assignment.id, &status, action, acted_by)
            .await
    }
}

fn recipient(participant: &Participant) -> Recipient {
    Recipient {
        participant_id: participant.id,
        phone: participant.phone.clone(),
        email: participant.email.clone(),
    }
}
