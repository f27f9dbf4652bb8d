//! End-to-end engine behavior over the in-memory store.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use domain::models::allocation::ClaimOutcome;
use domain::models::assignment::{AssignmentStatus, DeliveryMethod};
use domain::models::enrollment::{EnrollmentConfig, EnrollmentDecision};
use domain::models::gift_card::{GiftCardType, NewGiftCard};
use domain::models::participant::NewParticipant;
use domain::models::pool::PoolItemStatus;
use domain::models::survey_link::NewSurveyLink;
use domain::models::unsent_audit::{ListUnsentAuditQuery, ReversalTrigger, SYSTEM_DELETE_ACTOR};
use domain::models::upload::{GiftCardUploadRequest, UploadErrorReason};
use domain::services::{
    AllocationService, AssignmentLedger, CascadeCoordinator, EnrollmentGate, IngestionService,
    MockNotificationDispatcher, ReversalService, UNSEND_CONFIRMATION_PHRASE,
};
use domain::store::{AllocationStore, InMemoryStore};
use domain::EngineError;

struct Engine {
    store: Arc<InMemoryStore>,
    gate: EnrollmentGate,
    allocation: AllocationService,
    ledger: AssignmentLedger,
    reversal: ReversalService,
    cascade: CascadeCoordinator,
    ingestion: IngestionService,
}

impl Engine {
    fn new() -> Self {
        Self::with_enrollment(EnrollmentConfig::default())
    }

    fn with_enrollment(config: EnrollmentConfig) -> Self {
        let store = Arc::new(InMemoryStore::with_enrollment(config));
        let dyn_store: Arc<dyn AllocationStore> = store.clone();
        Self {
            gate: EnrollmentGate::new(dyn_store.clone()),
            allocation: AllocationService::new(
                dyn_store.clone(),
                Arc::new(MockNotificationDispatcher::new()),
            ),
            ledger: AssignmentLedger::new(dyn_store.clone()),
            reversal: ReversalService::new(dyn_store.clone()),
            cascade: CascadeCoordinator::new(dyn_store.clone()),
            ingestion: IngestionService::new(dyn_store),
            store,
        }
    }

    async fn stock_cards(&self, count: usize) -> Vec<String> {
        let mut codes = Vec::new();
        for i in 0..count {
            let code = format!("CARD-{:06}-TEST", i);
            self.ingestion
                .add_gift_card(
                    NewGiftCard {
                        card_code: code.clone(),
                        card_type: GiftCardType::Amazon,
                        card_value_cents: Some(2500),
                        redemption_url: None,
                        instructions: None,
                        batch_label: Some("test".into()),
                        expires_at: None,
                    },
                    "admin@example.org",
                )
                .await
                .unwrap();
            codes.push(code);
        }
        codes
    }

    async fn stock_links(&self, count: usize, offset: usize) {
        for i in 0..count {
            self.ingestion
                .add_link(
                    NewSurveyLink {
                        long_url: format!("https://survey.example.com/s/{}", offset + i),
                        short_url: None,
                        batch_label: None,
                    },
                    "admin@example.org",
                )
                .await
                .unwrap();
        }
    }

    async fn register(&self, n: usize) -> Uuid {
        self.gate
            .register(NewParticipant {
                phone: format!("+1555{:07}", n),
                email: Some(format!("participant{}@example.org", n)),
                verified_at: Some(Utc::now()),
                consented_at: Some(Utc::now()),
            })
            .await
            .unwrap()
            .id
    }

    /// Registers, hands out a link and completes the survey.
    async fn eligible_participant(&self, n: usize) -> Uuid {
        self.stock_links(1, n * 1000).await;
        let participant_id = self.register(n).await;
        let claim = self
            .allocation
            .claim_link(participant_id)
            .await
            .unwrap()
            .claimed()
            .unwrap();
        self.ledger.mark_survey_completed(claim.invitation.id).await.unwrap();
        participant_id
    }

    async fn send_card(&self, participant_id: Uuid) -> ClaimOutcome<domain::models::GiftCardClaim> {
        self.allocation
            .claim_gift_card(participant_id, DeliveryMethod::Sms, None, "admin@example.org")
            .await
            .unwrap()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_never_share_an_item() {
    let engine = Engine::new();
    engine.stock_cards(5).await;

    let mut participants = Vec::new();
    for n in 0..12 {
        participants.push(engine.eligible_participant(n).await);
    }

    let mut handles = Vec::new();
    for participant_id in participants {
        let allocation = engine.allocation.clone();
        handles.push(tokio::spawn(async move {
            allocation
                .claim_gift_card(participant_id, DeliveryMethod::Sms, None, "admin")
                .await
        }));
    }

    let mut claimed = HashSet::new();
    let mut exhausted = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            ClaimOutcome::Claimed(claim) => assert!(claimed.insert(claim.card.id)),
            ClaimOutcome::NoItemAvailable => exhausted += 1,
        }
    }

    assert_eq!(claimed.len(), 5);
    assert_eq!(exhausted, 7);
    let counts = engine.store.gift_card_counts().await.unwrap();
    assert_eq!(counts.assigned_cards, 5);
    assert_eq!(counts.available_cards, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_link_claims_never_share_a_link() {
    let engine = Engine::new();
    engine.stock_links(3, 0).await;

    let mut handles = Vec::new();
    for n in 0..8 {
        let participant_id = engine.register(n).await;
        let allocation = engine.allocation.clone();
        handles.push(tokio::spawn(async move { allocation.claim_link(participant_id).await }));
    }

    let mut links = HashSet::new();
    let mut exhausted = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            ClaimOutcome::Claimed(claim) => assert!(links.insert(claim.link.id)),
            ClaimOutcome::NoItemAvailable => exhausted += 1,
        }
    }
    assert_eq!(links.len(), 3);
    assert_eq!(exhausted, 5);
}

#[tokio::test]
async fn empty_pool_returns_no_item_immediately() {
    let engine = Engine::new();
    let participant_id = engine.eligible_participant(1).await;

    let outcome = tokio::time::timeout(
        std::time::Duration::from_secs(1),
        engine.allocation.claim_gift_card(participant_id, DeliveryMethod::Sms, None, "admin"),
    )
    .await
    .expect("claim must not block")
    .unwrap();

    assert_eq!(outcome, ClaimOutcome::NoItemAvailable);
}

#[tokio::test]
async fn reversal_returns_the_same_card_to_the_pool() {
    let engine = Engine::new();
    engine.stock_cards(1).await;
    let first = engine.eligible_participant(1).await;
    let second = engine.eligible_participant(2).await;

    let claim = engine.send_card(first).await.claimed().unwrap();
    let ack = engine
        .reversal
        .reverse(claim.assignment.id, UNSEND_CONFIRMATION_PHRASE, "admin@example.org")
        .await
        .unwrap();
    assert!(!ack.already_unsent);
    let audit = ack.audit_record.unwrap();
    assert_eq!(audit.card_code, claim.card.card_code);
    assert_eq!(audit.previous_status, AssignmentStatus::Sent);
    assert_eq!(audit.trigger, ReversalTrigger::Admin);

    let reclaimed = engine.send_card(second).await.claimed().unwrap();
    assert_eq!(reclaimed.card.id, claim.card.id);
    assert_eq!(reclaimed.card.card_code, claim.card.card_code);
}

#[tokio::test]
async fn reversal_is_idempotent() {
    let engine = Engine::new();
    engine.stock_cards(1).await;
    let participant_id = engine.eligible_participant(1).await;
    let claim = engine.send_card(participant_id).await.claimed().unwrap();

    engine
        .reversal
        .reverse(claim.assignment.id, UNSEND_CONFIRMATION_PHRASE, "admin")
        .await
        .unwrap();
    let again = engine
        .reversal
        .reverse(claim.assignment.id, UNSEND_CONFIRMATION_PHRASE, "admin")
        .await
        .unwrap();

    assert!(again.already_unsent);
    assert!(again.audit_record.is_none());
    assert_eq!(engine.store.audit_len().unwrap(), 1);
    let card = engine.store.find_gift_card(claim.card.id).await.unwrap().unwrap();
    assert_eq!(card.status, PoolItemStatus::Available);
}

#[tokio::test]
async fn reversal_of_missing_pool_item_fails_closed() {
    let engine = Engine::new();
    engine.stock_cards(1).await;
    let participant_id = engine.eligible_participant(1).await;
    let claim = engine.send_card(participant_id).await.claimed().unwrap();
    engine.store.purge_gift_card(claim.card.id).unwrap();

    let err = engine
        .reversal
        .reverse(claim.assignment.id, UNSEND_CONFIRMATION_PHRASE, "admin")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let assignment = engine.ledger.find_assignment(claim.assignment.id).await.unwrap();
    assert_eq!(assignment.status, AssignmentStatus::Sent);
    assert_eq!(engine.store.audit_len().unwrap(), 0);
}

#[tokio::test]
async fn redeemed_card_cannot_be_unsent_by_admin() {
    let engine = Engine::new();
    engine.stock_cards(1).await;
    let participant_id = engine.eligible_participant(1).await;
    let claim = engine.send_card(participant_id).await.claimed().unwrap();
    engine
        .ledger
        .mark_redeemed(claim.assignment.id, "admin@example.org")
        .await
        .unwrap();

    let err = engine
        .reversal
        .reverse(claim.assignment.id, UNSEND_CONFIRMATION_PHRASE, "admin")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
async fn enrollment_ceiling_holds() {
    let engine = Engine::with_enrollment(EnrollmentConfig {
        max_participants: Some(2),
        ..Default::default()
    });
    engine.register(1).await;
    engine.register(2).await;

    let err = engine
        .gate
        .register(NewParticipant {
            phone: "+15559990000".into(),
            email: None,
            verified_at: None,
            consented_at: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Capacity(EnrollmentDecision::Full)));

    let err = engine.gate.update_config(Some(1), true, "admin").await.unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
    let status = engine.gate.status().await.unwrap();
    assert_eq!(status.max_participants, Some(2));
    assert_eq!(status.current_count, 2);
}

#[tokio::test]
async fn deleting_a_participant_reclaims_cards_and_frees_a_spot() {
    let engine = Engine::with_enrollment(EnrollmentConfig {
        max_participants: Some(1),
        ..Default::default()
    });
    engine.stock_cards(1).await;
    let participant_id = engine.eligible_participant(1).await;
    let claim = engine.send_card(participant_id).await.claimed().unwrap();

    let report = engine
        .cascade
        .delete_participant(participant_id, "admin@example.org")
        .await
        .unwrap();
    assert_eq!(report.reclaimed_cards, 1);
    assert!(!report.is_partial());
    assert!(report.message.contains("1 gift card(s) returned to the pool"));

    let card = engine.store.find_gift_card(claim.card.id).await.unwrap().unwrap();
    assert_eq!(card.status, PoolItemStatus::Available);
    let (audit, total) = engine
        .reversal
        .list_audit(&ListUnsentAuditQuery::default())
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(audit[0].trigger, ReversalTrigger::ParticipantDeletion);
    assert_eq!(audit[0].unsent_by, SYSTEM_DELETE_ACTOR);
    assert_eq!(audit[0].requested_by, "admin@example.org");
    assert_eq!(audit[0].participant_snapshot.participant_id, Some(participant_id));

    assert_eq!(engine.gate.status().await.unwrap().current_count, 0);
    assert_eq!(engine.gate.check_enrollment().await.unwrap(), EnrollmentDecision::Allowed);
}

#[tokio::test]
async fn deleting_a_participant_releases_an_unused_link() {
    let engine = Engine::new();
    engine.stock_links(1, 0).await;
    let participant_id = engine.register(1).await;
    let claim = engine
        .allocation
        .claim_link(participant_id)
        .await
        .unwrap()
        .claimed()
        .unwrap();

    let report = engine
        .cascade
        .delete_participant(participant_id, "admin@example.org")
        .await
        .unwrap();
    assert_eq!(report.released_link_id, Some(claim.link.id));
    let link = engine.store.find_link(claim.link.id).await.unwrap().unwrap();
    assert_eq!(link.status, PoolItemStatus::Available);
}

#[tokio::test]
async fn cascade_with_missing_pool_item_is_partial_success() {
    let engine = Engine::new();
    engine.stock_cards(1).await;
    let participant_id = engine.eligible_participant(1).await;
    let claim = engine.send_card(participant_id).await.claimed().unwrap();
    engine.store.purge_gift_card(claim.card.id).unwrap();

    let report = engine
        .cascade
        .delete_participant(participant_id, "admin@example.org")
        .await
        .unwrap();
    assert!(report.is_partial());
    assert_eq!(report.orphaned_assignments, vec![claim.assignment.id]);
    assert!(report.message.contains("Partial success"));
    assert!(engine.store.find_participant(participant_id).await.unwrap().is_none());

    let assignment = engine.ledger.find_assignment(claim.assignment.id).await.unwrap();
    assert_eq!(assignment.status, AssignmentStatus::Unsent);
    assert!(assignment.participant_id.is_none());
    assert_eq!(engine.store.audit_len().unwrap(), 1);
}

#[tokio::test]
async fn assigned_pool_items_cannot_be_deleted_directly() {
    let engine = Engine::new();
    engine.stock_cards(1).await;
    let participant_id = engine.eligible_participant(1).await;
    let claim = engine.send_card(participant_id).await.claimed().unwrap();

    let err = engine.cascade.delete_gift_card(claim.card.id).await.unwrap_err();
    assert!(matches!(err, EngineError::CascadeBlocked(_)));

    let invitation = engine
        .store
        .find_invitation_for_participant(participant_id)
        .await
        .unwrap()
        .unwrap();
    let err = engine
        .cascade
        .delete_link(invitation.link_item_id.unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CascadeBlocked(_)));
}

#[tokio::test]
async fn batch_send_reports_the_unsatisfied_participant() {
    let engine = Engine::new();
    engine.stock_cards(2).await;
    let mut participants = Vec::new();
    for n in 0..3 {
        participants.push(engine.eligible_participant(n).await);
    }

    let result = engine
        .allocation
        .claim_many(&participants, DeliveryMethod::Sms, None, "admin")
        .await
        .unwrap();

    assert_eq!(result.total_requested, 3);
    assert_eq!(result.successful, 2);
    assert_eq!(result.failed, 1);
    let cards: HashSet<Uuid> = result.successes.iter().map(|s| s.pool_item_id).collect();
    assert_eq!(cards.len(), 2);
    assert_eq!(result.failures[0].participant_id, participants[2]);
    assert_eq!(result.failures[0].reason, "No gift card available in pool");

    for success in &result.successes {
        let assignment = engine.ledger.find_assignment(success.assignment_id).await.unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Sent);
    }
}

#[tokio::test]
async fn gift_card_requires_completed_survey_and_no_active_card() {
    let engine = Engine::new();
    engine.stock_cards(2).await;
    engine.stock_links(1, 0).await;

    let participant_id = engine.register(1).await;
    let err = engine
        .allocation
        .claim_gift_card(participant_id, DeliveryMethod::Sms, None, "admin")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotEligible(_)));

    let link = engine
        .allocation
        .claim_link(participant_id)
        .await
        .unwrap()
        .claimed()
        .unwrap();
    engine.ledger.mark_survey_completed(link.invitation.id).await.unwrap();
    engine.send_card(participant_id).await.claimed().unwrap();

    let err = engine
        .allocation
        .claim_gift_card(participant_id, DeliveryMethod::Sms, None, "admin")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotEligible(_)));
}

#[tokio::test]
async fn reupload_reports_duplicates_and_leaves_pool_unchanged() {
    let engine = Engine::new();
    let upload = GiftCardUploadRequest {
        content: "code\nABCD-123456-WXYZ\n".into(),
        ..Default::default()
    };

    let first = engine
        .ingestion
        .upload_gift_cards(upload.clone(), "admin")
        .await
        .unwrap();
    assert_eq!(first.successful_uploads, 1);

    let second = engine.ingestion.upload_gift_cards(upload, "admin").await.unwrap();
    assert_eq!(second.successful_uploads, 0);
    assert_eq!(second.failed_uploads, 1);
    assert_eq!(second.errors[0].reason, UploadErrorReason::Duplicate);
    assert_eq!(second.errors[0].message, "Line 2: Duplicate code: ABCD-123456-WXYZ");

    assert_eq!(engine.store.gift_card_counts().await.unwrap().total_cards, 1);
}
