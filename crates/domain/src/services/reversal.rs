//! Reversal service: unsends gift card assignments and keeps the audit log.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::reversal::{ReversalAck, ReversalOutcome};
use crate::models::unsent_audit::{
    ListUnsentAuditQuery, ReversalTrigger, UnsentAuditRecord, SYSTEM_DELETE_ACTOR,
};
use crate::store::AllocationStore;

/// Phrase an admin must type to confirm an unsend.
pub const UNSEND_CONFIRMATION_PHRASE: &str = "UNSEND";

/// Checks the confirmation phrase. Exact match, case-sensitive.
pub fn check_confirmation(phrase: &str) -> EngineResult<()> {
    if phrase.trim().is_empty() {
        return Err(EngineError::Validation(
            "confirmation_phrase is required".into(),
        ));
    }
    if phrase != UNSEND_CONFIRMATION_PHRASE {
        return Err(EngineError::ConfirmationMismatch);
    }
    Ok(())
}

#[derive(Clone)]
pub struct ReversalService {
    store: Arc<dyn AllocationStore>,
}

impl ReversalService {
    pub fn new(store: Arc<dyn AllocationStore>) -> Self {
        Self { store }
    }

    /// Admin unsend. The card returns to the pool with its original code.
    /// Unsending an already-unsent assignment acknowledges without writing a
    /// second audit record.
    pub async fn reverse(
        &self,
        assignment_id: Uuid,
        confirmation_phrase: &str,
        acted_by: &str,
    ) -> EngineResult<ReversalAck> {
        check_confirmation(confirmation_phrase)?;

        let outcome = self
            .store
            .reverse_assignment(assignment_id, acted_by, acted_by, ReversalTrigger::Admin)
            .await?;

        let ack = match outcome {
            ReversalOutcome::AlreadyUnsent => ReversalAck {
                assignment_id,
                already_unsent: true,
                audit_record: None,
                message: "Gift card was already unsent".into(),
            },
            ReversalOutcome::Reversed { audit, released_to } => {
                info!(
                    assignment_id = %assignment_id,
                    pool_item_id = %audit.pool_item_id,
                    released_to = %released_to,
                    unsent_by = %acted_by,
                    "Gift card unsent"
                );
                ReversalAck {
                    assignment_id,
                    already_unsent: false,
                    message: format!(
                        "Gift card {} unsent and returned to the pool",
                        audit.card_code
                    ),
                    audit_record: Some(audit),
                }
            }
            // Admin reversals fail closed in the store before reaching here.
            ReversalOutcome::Orphaned { .. } => {
                return Err(EngineError::NotFound(
                    "Pool item for this assignment no longer exists".into(),
                ))
            }
        };
        Ok(ack)
    }

    /// System-attributed reversal used by participant deletion. No
    /// confirmation is required and a missing pool item is recorded as an
    /// orphan instead of failing. `requested_by` is the admin who asked for
    /// the deletion.
    pub async fn reverse_for_cascade(
        &self,
        assignment_id: Uuid,
        requested_by: &str,
    ) -> EngineResult<ReversalOutcome> {
        let outcome = self
            .store
            .reverse_assignment(
                assignment_id,
                SYSTEM_DELETE_ACTOR,
                requested_by,
                ReversalTrigger::ParticipantDeletion,
            )
            .await?;

        if let ReversalOutcome::Orphaned { audit } = &outcome {
            warn!(
                assignment_id = %assignment_id,
                pool_item_id = %audit.pool_item_id,
                "Reversed assignment has no pool item; recorded as orphaned"
            );
        }
        Ok(outcome)
    }

    pub async fn list_audit(
        &self,
        query: &ListUnsentAuditQuery,
    ) -> EngineResult<(Vec<UnsentAuditRecord>, i64)> {
        self.store.list_unsent_audit(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_confirmation() {
        assert!(check_confirmation("UNSEND").is_ok());
        assert!(matches!(
            check_confirmation("unsend"),
            Err(EngineError::ConfirmationMismatch)
        ));
        assert!(matches!(
            check_confirmation("UNSEND "),
            Err(EngineError::ConfirmationMismatch)
        ));
        assert!(matches!(check_confirmation("  "), Err(EngineError::Validation(_))));
    }

    #[tokio::test]
    async fn test_mismatch_is_checked_before_lookup() {
        let service = ReversalService::new(Arc::new(crate::store::InMemoryStore::new()));
        let err = service
            .reverse(Uuid::new_v4(), "please", "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ConfirmationMismatch));

        let err = service
            .reverse(Uuid::new_v4(), UNSEND_CONFIRMATION_PHRASE, "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
