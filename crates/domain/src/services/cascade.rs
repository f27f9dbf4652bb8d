//! Cascade coordinator: participant and pool item deletion.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::pool::PoolItemStatus;
use crate::models::reversal::{CascadeReport, ReversalOutcome};
use crate::services::reversal::ReversalService;
use crate::store::AllocationStore;

/// Attempts at reversing and removing a participant before giving up.
pub const MAX_CASCADE_PASSES: usize = 3;

#[derive(Clone)]
pub struct CascadeCoordinator {
    store: Arc<dyn AllocationStore>,
    reversal: ReversalService,
}

impl CascadeCoordinator {
    pub fn new(store: Arc<dyn AllocationStore>) -> Self {
        Self {
            reversal: ReversalService::new(store.clone()),
            store,
        }
    }

    /// Deletes a participant after reversing every active gift card they
    /// hold and releasing an unused survey link.
    ///
    /// Reversals whose pool item has vanished are recorded as orphaned and
    /// reported as partial success; they never block the deletion. A card
    /// claimed for the participant while the cascade runs makes the removal
    /// fail with `Conflict`; the reverse, release and remove steps are then
    /// repeated, up to `MAX_CASCADE_PASSES` times.
    pub async fn delete_participant(
        &self,
        participant_id: Uuid,
        requested_by: &str,
    ) -> EngineResult<CascadeReport> {
        if self.store.find_participant(participant_id).await?.is_none() {
            return Err(EngineError::NotFound("Participant not found".into()));
        }

        let mut report = CascadeReport {
            participant_id,
            ..Default::default()
        };

        let mut pass = 1;
        loop {
            self.reverse_active(participant_id, requested_by, &mut report)
                .await?;
            if let Some(link_id) = self.store.release_participant_link(participant_id).await? {
                report.released_link_id = Some(link_id);
            }

            match self.store.remove_participant(participant_id).await {
                Ok(true) => break,
                Ok(false) => return Err(EngineError::NotFound("Participant not found".into())),
                Err(EngineError::Conflict(reason)) if pass < MAX_CASCADE_PASSES => {
                    warn!(
                        participant_id = %participant_id,
                        pass,
                        reason = %reason,
                        "Participant changed during deletion; retrying"
                    );
                    pass += 1;
                }
                Err(EngineError::Conflict(reason)) => {
                    warn!(
                        participant_id = %participant_id,
                        reclaimed_cards = report.reclaimed_cards,
                        "Participant deletion gave up"
                    );
                    return Err(EngineError::Conflict(format!(
                        "{} after {} attempts; {} gift card(s) were already returned to the pool",
                        reason, MAX_CASCADE_PASSES, report.reclaimed_cards
                    )));
                }
                Err(e) => return Err(e),
            }
        }

        report.summarize();
        if report.is_partial() {
            warn!(
                participant_id = %participant_id,
                orphaned = report.orphaned_assignments.len(),
                requested_by = %requested_by,
                "Participant deleted with orphaned assignments"
            );
        } else {
            info!(
                participant_id = %participant_id,
                reclaimed_cards = report.reclaimed_cards,
                requested_by = %requested_by,
                "Participant deleted"
            );
        }
        Ok(report)
    }

    async fn reverse_active(
        &self,
        participant_id: Uuid,
        requested_by: &str,
        report: &mut CascadeReport,
    ) -> EngineResult<()> {
        let active: Vec<Uuid> = self
            .store
            .list_assignments_for_participant(participant_id)
            .await?
            .into_iter()
            .filter(|a| a.is_active())
            .map(|a| a.id)
            .collect();

        for assignment_id in active {
            match self
                .reversal
                .reverse_for_cascade(assignment_id, requested_by)
                .await?
            {
                ReversalOutcome::Reversed {
                    released_to: PoolItemStatus::Available,
                    ..
                } => report.reclaimed_cards += 1,
                ReversalOutcome::Reversed { .. } => report.invalidated_cards += 1,
                ReversalOutcome::Orphaned { .. } => report.orphaned_assignments.push(assignment_id),
                ReversalOutcome::AlreadyUnsent => {}
            }
        }
        Ok(())
    }

    /// Direct link deletion; refused while an invitation still holds the link.
    pub async fn delete_link(&self, link_id: Uuid) -> EngineResult<()> {
        self.store.delete_link(link_id).await?;
        info!(link_id = %link_id, "Survey link deleted");
        Ok(())
    }

    /// Direct gift card deletion; refused while the card is ASSIGNED.
    pub async fn delete_gift_card(&self, card_id: Uuid) -> EngineResult<()> {
        self.store.delete_gift_card(card_id).await?;
        info!(gift_card_id = %card_id, "Gift card deleted");
        Ok(())
    }
}
