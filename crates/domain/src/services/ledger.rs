//! Assignment ledger: lifecycle of invitations and gift card assignments.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::assignment::{AssignmentStatus, GiftCardAssignment, ListAssignmentsQuery};
use crate::models::distribution_log::{DistributionAction, DistributionLogEntry};
use crate::models::invitation::Invitation;
use crate::services::notification::validate_dispatch_status;
use crate::store::AllocationStore;

/// Actor recorded for status reports that arrive from the dispatcher.
pub const DISPATCHER_ACTOR: &str = "DISPATCHER";

fn check_dispatch_status(status: &str) -> EngineResult<()> {
    validate_dispatch_status(status).map_err(|e| {
        EngineError::Validation(
            e.message
                .map(|m| m.to_string())
                .unwrap_or_else(|| "Invalid dispatch status".to_string()),
        )
    })
}

/// Result of clearing a survey completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UncompleteOutcome {
    pub invitation: Invitation,
    /// Present when the participant still holds an active gift card. The card
    /// is never revoked automatically.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Clone)]
pub struct AssignmentLedger {
    store: Arc<dyn AllocationStore>,
}

impl AssignmentLedger {
    pub fn new(store: Arc<dyn AllocationStore>) -> Self {
        Self { store }
    }

    pub async fn mark_delivered(
        &self,
        assignment_id: Uuid,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment> {
        self.advance(assignment_id, AssignmentStatus::Delivered, acted_by).await
    }

    pub async fn mark_redeemed(
        &self,
        assignment_id: Uuid,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment> {
        self.advance(assignment_id, AssignmentStatus::Redeemed, acted_by).await
    }

    async fn advance(
        &self,
        assignment_id: Uuid,
        status: AssignmentStatus,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment> {
        let assignment = self
            .store
            .advance_assignment(assignment_id, status, acted_by)
            .await?;
        info!(
            assignment_id = %assignment_id,
            status = %status,
            acted_by = %acted_by,
            "Gift card assignment advanced"
        );
        Ok(assignment)
    }

    /// Stores a status reported later by the dispatcher for a gift card
    /// message. The status is kept verbatim and never moves the assignment.
    pub async fn record_delivery_status(
        &self,
        assignment_id: Uuid,
        status: &str,
    ) -> EngineResult<GiftCardAssignment> {
        check_dispatch_status(status)?;
        let assignment = self
            .store
            .record_delivery_status(
                assignment_id,
                status,
                DistributionAction::DeliveryReported,
                DISPATCHER_ACTOR,
            )
            .await?;
        info!(assignment_id = %assignment_id, status = %status, "Gift card delivery status reported");
        Ok(assignment)
    }

    /// Stores a status reported later by the dispatcher for a survey link
    /// message.
    pub async fn record_message_status(
        &self,
        invitation_id: Uuid,
        status: &str,
    ) -> EngineResult<Invitation> {
        check_dispatch_status(status)?;
        let invitation = self.store.record_invitation_status(invitation_id, status).await?;
        info!(invitation_id = %invitation_id, status = %status, "Survey message status reported");
        Ok(invitation)
    }

    /// Sets `completed_at` once; repeated calls keep the first timestamp.
    pub async fn mark_survey_completed(&self, invitation_id: Uuid) -> EngineResult<Invitation> {
        let (invitation, changed) = self.store.complete_invitation(invitation_id).await?;
        if changed {
            info!(
                invitation_id = %invitation_id,
                participant_id = %invitation.participant_id,
                "Survey marked completed"
            );
        }
        Ok(invitation)
    }

    pub async fn mark_survey_uncompleted(
        &self,
        invitation_id: Uuid,
    ) -> EngineResult<UncompleteOutcome> {
        let invitation = self.store.uncomplete_invitation(invitation_id).await?;

        let has_active_card = self
            .store
            .list_assignments_for_participant(invitation.participant_id)
            .await?
            .iter()
            .any(GiftCardAssignment::is_active);

        let warning = has_active_card.then(|| {
            warn!(
                invitation_id = %invitation_id,
                participant_id = %invitation.participant_id,
                "Survey uncompleted while a gift card is still active"
            );
            "A gift card has already been sent to this participant. It was not revoked; \
             unsend it separately if required."
                .to_string()
        });

        Ok(UncompleteOutcome { invitation, warning })
    }

    pub async fn update_notes(
        &self,
        assignment_id: Uuid,
        notes: Option<String>,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment> {
        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        self.store
            .update_assignment_notes(assignment_id, notes, acted_by)
            .await
    }

    /// Global listing across participants, orphaned assignments included.
    pub async fn list_assignments(
        &self,
        query: &ListAssignmentsQuery,
    ) -> EngineResult<(Vec<GiftCardAssignment>, i64)> {
        self.store.list_assignments(query).await
    }

    /// Distribution history of one assignment, oldest first.
    pub async fn distribution_log(
        &self,
        assignment_id: Uuid,
    ) -> EngineResult<Vec<DistributionLogEntry>> {
        self.find_assignment(assignment_id).await?;
        self.store.list_distribution_log(assignment_id).await
    }

    pub async fn find_assignment(&self, assignment_id: Uuid) -> EngineResult<GiftCardAssignment> {
        self.store
            .find_assignment(assignment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("Gift card assignment not found".into()))
    }

    /// Newest first.
    pub async fn assignments_for_participant(
        &self,
        participant_id: Uuid,
    ) -> EngineResult<Vec<GiftCardAssignment>> {
        if self.store.find_participant(participant_id).await?.is_none() {
            return Err(EngineError::NotFound("Participant not found".into()));
        }
        self.store.list_assignments_for_participant(participant_id).await
    }
}
