//! Enrollment gate: caps participant registration.

use std::sync::Arc;

use tracing::info;
use validator::Validate;

use crate::error::{EngineError, EngineResult};
use crate::models::enrollment::{EnrollmentConfig, EnrollmentDecision, EnrollmentStatusView};
use crate::models::participant::{NewParticipant, Participant};
use crate::store::AllocationStore;

/// Consults and maintains the enrollment configuration.
#[derive(Clone)]
pub struct EnrollmentGate {
    store: Arc<dyn AllocationStore>,
}

impl EnrollmentGate {
    pub fn new(store: Arc<dyn AllocationStore>) -> Self {
        Self { store }
    }

    /// Whether a new participant may register right now.
    pub async fn check_enrollment(&self) -> EngineResult<EnrollmentDecision> {
        Ok(self.store.enrollment_config().await?.decision())
    }

    pub async fn status(&self) -> EngineResult<EnrollmentStatusView> {
        Ok(self.store.enrollment_config().await?.into())
    }

    /// Registers a participant. The gate check, count increment and insert
    /// happen in one store transaction.
    pub async fn register(&self, participant: NewParticipant) -> EngineResult<Participant> {
        let participant = participant.normalized();
        participant.validate()?;

        let created = self.store.register_participant(participant).await?;
        info!(participant_id = %created.id, "Participant registered");
        Ok(created)
    }

    /// Replaces the limit and switch. A limit below the current count is
    /// rejected and the previous configuration is kept.
    pub async fn update_config(
        &self,
        max_participants: Option<i32>,
        is_enrollment_active: bool,
        acted_by: &str,
    ) -> EngineResult<EnrollmentConfig> {
        if max_participants.is_some_and(|max| max < 0) {
            return Err(EngineError::Validation(
                "max_participants cannot be negative".into(),
            ));
        }

        let config = self
            .store
            .update_enrollment_config(max_participants, is_enrollment_active, acted_by)
            .await?;

        info!(
            max_participants = ?config.max_participants,
            is_enrollment_active = config.is_enrollment_active,
            current_count = config.current_count,
            acted_by = %acted_by,
            "Enrollment configuration updated"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn participant(phone: &str) -> NewParticipant {
        NewParticipant {
            phone: phone.into(),
            email: None,
            verified_at: None,
            consented_at: None,
        }
    }

    fn gate_with(config: EnrollmentConfig) -> EnrollmentGate {
        EnrollmentGate::new(Arc::new(InMemoryStore::with_enrollment(config)))
    }

    #[tokio::test]
    async fn test_register_increments_count() {
        let gate = gate_with(EnrollmentConfig::default());
        tokio_test::assert_ok!(gate.register(participant("+15550001000")).await);
        tokio_test::assert_ok!(gate.register(participant("+15550001001")).await);

        let status = gate.status().await.unwrap();
        assert_eq!(status.current_count, 2);
        assert_eq!(status.remaining_spots, -1);
    }

    #[tokio::test]
    async fn test_register_rejected_when_disabled() {
        let gate = gate_with(EnrollmentConfig {
            is_enrollment_active: false,
            ..Default::default()
        });

        assert_eq!(gate.check_enrollment().await.unwrap(), EnrollmentDecision::Disabled);
        let err = gate.register(participant("+15550001002")).await.unwrap_err();
        assert!(matches!(err, EngineError::Capacity(EnrollmentDecision::Disabled)));
        assert_eq!(gate.status().await.unwrap().current_count, 0);
    }

    #[tokio::test]
    async fn test_register_validates_phone() {
        let gate = gate_with(EnrollmentConfig::default());
        let err = tokio_test::assert_err!(gate.register(participant("12345")).await);
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_config_rejects_negative() {
        let gate = gate_with(EnrollmentConfig::default());
        let err = gate.update_config(Some(-1), true, "admin").await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_config_records_actor() {
        let gate = gate_with(EnrollmentConfig::default());
        let config = gate.update_config(Some(25), true, "admin@example.org").await.unwrap();
        assert_eq!(config.max_participants, Some(25));
        assert_eq!(config.updated_by, "admin@example.org");
    }
}
