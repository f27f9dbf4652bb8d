//! PostgreSQL-backed `AllocationStore`.

use async_trait::async_trait;
use domain::models::allocation::{ClaimOutcome, GiftCardClaim, LinkClaim};
use domain::models::assignment::{
    AssignmentStatus, GiftCardAssignment, ListAssignmentsQuery, NewAssignment,
};
use domain::models::distribution_log::{DistributionAction, DistributionLogEntry};
use domain::models::enrollment::EnrollmentConfig;
use domain::models::gift_card::{GiftCard, NewGiftCard};
use domain::models::invitation::Invitation;
use domain::models::participant::{
    EligibleParticipant, ListParticipantsQuery, NewParticipant, Participant,
};
use domain::models::pool::{GiftCardPoolCounts, LinkPoolCounts, ListPoolQuery, PoolItemStatus};
use domain::models::reversal::ReversalOutcome;
use domain::models::survey_link::{NewSurveyLink, SurveyLink};
use domain::models::unsent_audit::{ListUnsentAuditQuery, ReversalTrigger, UnsentAuditRecord};
use domain::store::AllocationStore;
use domain::EngineResult;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbResultExt;
use crate::repositories::{
    AssignmentRepository, DistributionLogRepository, EnrollmentRepository, GiftCardRepository,
    ParticipantRepository, SurveyLinkRepository, UnsentAuditRepository,
};

/// Delegates each store operation to the repository owning its tables.
#[derive(Clone)]
pub struct PgAllocationStore {
    pool: PgPool,
    enrollment: EnrollmentRepository,
    participants: ParticipantRepository,
    links: SurveyLinkRepository,
    gift_cards: GiftCardRepository,
    ledger: AssignmentRepository,
    audit: UnsentAuditRepository,
    distribution_log: DistributionLogRepository,
}

impl PgAllocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            enrollment: EnrollmentRepository::new(pool.clone()),
            participants: ParticipantRepository::new(pool.clone()),
            links: SurveyLinkRepository::new(pool.clone()),
            gift_cards: GiftCardRepository::new(pool.clone()),
            ledger: AssignmentRepository::new(pool.clone()),
            audit: UnsentAuditRepository::new(pool.clone()),
            distribution_log: DistributionLogRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AllocationStore for PgAllocationStore {
    async fn ping(&self) -> EngineResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_db()?;
        Ok(())
    }

    async fn enrollment_config(&self) -> EngineResult<EnrollmentConfig> {
        self.enrollment.get().await
    }

    async fn update_enrollment_config(
        &self,
        max_participants: Option<i32>,
        is_enrollment_active: bool,
        updated_by: &str,
    ) -> EngineResult<EnrollmentConfig> {
        self.enrollment
            .update(max_participants, is_enrollment_active, updated_by)
            .await
    }

    async fn register_participant(&self, participant: NewParticipant) -> EngineResult<Participant> {
        self.participants.register(participant).await
    }

    async fn find_participant(&self, id: Uuid) -> EngineResult<Option<Participant>> {
        self.participants.find_by_id(id).await
    }

    async fn list_participants(
        &self,
        query: &ListParticipantsQuery,
    ) -> EngineResult<(Vec<Participant>, i64)> {
        self.participants.list(query).await
    }

    async fn list_eligible_participants(
        &self,
        query: &ListParticipantsQuery,
    ) -> EngineResult<(Vec<EligibleParticipant>, i64)> {
        self.participants.list_eligible(query).await
    }

    async fn release_participant_link(&self, participant_id: Uuid) -> EngineResult<Option<Uuid>> {
        self.participants.release_link(participant_id).await
    }

    async fn remove_participant(&self, participant_id: Uuid) -> EngineResult<bool> {
        self.participants.remove(participant_id).await
    }

    async fn insert_link(&self, link: NewSurveyLink, uploaded_by: &str) -> EngineResult<SurveyLink> {
        self.links.insert(link, uploaded_by).await
    }

    async fn find_link(&self, id: Uuid) -> EngineResult<Option<SurveyLink>> {
        self.links.find_by_id(id).await
    }

    async fn list_links(&self, query: &ListPoolQuery) -> EngineResult<(Vec<SurveyLink>, i64)> {
        self.links.list(query).await
    }

    async fn link_counts(&self) -> EngineResult<LinkPoolCounts> {
        self.links.counts().await
    }

    async fn claim_link(&self, participant_id: Uuid) -> EngineResult<ClaimOutcome<LinkClaim>> {
        self.links.claim(participant_id).await
    }

    async fn delete_link(&self, id: Uuid) -> EngineResult<()> {
        self.links.delete(id).await
    }

    async fn insert_gift_card(&self, card: NewGiftCard, uploaded_by: &str) -> EngineResult<GiftCard> {
        self.gift_cards.insert(card, uploaded_by).await
    }

    async fn find_gift_card(&self, id: Uuid) -> EngineResult<Option<GiftCard>> {
        self.gift_cards.find_by_id(id).await
    }

    async fn list_gift_cards(&self, query: &ListPoolQuery) -> EngineResult<(Vec<GiftCard>, i64)> {
        self.gift_cards.list(query).await
    }

    async fn gift_card_counts(&self) -> EngineResult<GiftCardPoolCounts> {
        self.gift_cards.counts().await
    }

    async fn update_gift_card_code(&self, id: Uuid, card_code: &str) -> EngineResult<GiftCard> {
        self.gift_cards.update_code(id, card_code).await
    }

    async fn retire_gift_card(&self, id: Uuid, status: PoolItemStatus) -> EngineResult<GiftCard> {
        self.gift_cards.retire(id, status).await
    }

    async fn delete_gift_card(&self, id: Uuid) -> EngineResult<()> {
        self.gift_cards.delete(id).await
    }

    async fn claim_gift_card(&self, request: NewAssignment) -> EngineResult<ClaimOutcome<GiftCardClaim>> {
        self.gift_cards.claim(request).await
    }

    async fn find_invitation(&self, id: Uuid) -> EngineResult<Option<Invitation>> {
        self.ledger.find_invitation(id).await
    }

    async fn find_invitation_for_participant(
        &self,
        participant_id: Uuid,
    ) -> EngineResult<Option<Invitation>> {
        self.ledger.find_invitation_for_participant(participant_id).await
    }

    async fn record_invitation_status(&self, id: Uuid, status: &str) -> EngineResult<Invitation> {
        self.ledger.record_invitation_status(id, status).await
    }

    async fn complete_invitation(&self, id: Uuid) -> EngineResult<(Invitation, bool)> {
        self.ledger.complete_invitation(id).await
    }

    async fn uncomplete_invitation(&self, id: Uuid) -> EngineResult<Invitation> {
        self.ledger.uncomplete_invitation(id).await
    }

    async fn find_assignment(&self, id: Uuid) -> EngineResult<Option<GiftCardAssignment>> {
        self.ledger.find_assignment(id).await
    }

    async fn list_assignments_for_participant(
        &self,
        participant_id: Uuid,
    ) -> EngineResult<Vec<GiftCardAssignment>> {
        self.ledger.list_for_participant(participant_id).await
    }

    async fn list_assignments(
        &self,
        query: &ListAssignmentsQuery,
    ) -> EngineResult<(Vec<GiftCardAssignment>, i64)> {
        self.ledger.list(query).await
    }

    async fn advance_assignment(
        &self,
        id: Uuid,
        status: AssignmentStatus,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment> {
        self.ledger.advance(id, status, acted_by).await
    }

    async fn record_delivery_status(
        &self,
        id: Uuid,
        status: &str,
        action: DistributionAction,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment> {
        self.ledger
            .record_delivery_status(id, status, action, acted_by)
            .await
    }

    async fn update_assignment_notes(
        &self,
        id: Uuid,
        notes: Option<String>,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment> {
        self.ledger.update_notes(id, notes, acted_by).await
    }

    async fn list_distribution_log(
        &self,
        assignment_id: Uuid,
    ) -> EngineResult<Vec<DistributionLogEntry>> {
        self.distribution_log.list(assignment_id).await
    }

    async fn reverse_assignment(
        &self,
        id: Uuid,
        unsent_by: &str,
        requested_by: &str,
        trigger: ReversalTrigger,
    ) -> EngineResult<ReversalOutcome> {
        self.ledger.reverse(id, unsent_by, requested_by, trigger).await
    }

    async fn list_unsent_audit(
        &self,
        query: &ListUnsentAuditQuery,
    ) -> EngineResult<(Vec<UnsentAuditRecord>, i64)> {
        self.audit.list(query).await
    }
}
