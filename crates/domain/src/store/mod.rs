//! The authoritative store behind the allocation engine.
//!
//! Every mutating method is a single atomic transition: implementations must
//! guard state changes with the current status (compare-and-swap or row
//! locks inside one transaction) so concurrent callers never observe an item
//! as both ASSIGNED and AVAILABLE.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::allocation::{ClaimOutcome, GiftCardClaim, LinkClaim};
use crate::models::assignment::{
    AssignmentStatus, GiftCardAssignment, ListAssignmentsQuery, NewAssignment,
};
use crate::models::distribution_log::{DistributionAction, DistributionLogEntry};
use crate::models::enrollment::EnrollmentConfig;
use crate::models::gift_card::{GiftCard, NewGiftCard};
use crate::models::invitation::Invitation;
use crate::models::participant::{
    EligibleParticipant, ListParticipantsQuery, NewParticipant, Participant,
};
use crate::models::pool::{GiftCardPoolCounts, LinkPoolCounts, ListPoolQuery, PoolItemStatus};
use crate::models::reversal::ReversalOutcome;
use crate::models::survey_link::{NewSurveyLink, SurveyLink};
use crate::models::unsent_audit::{ListUnsentAuditQuery, ReversalTrigger, UnsentAuditRecord};

pub use memory::InMemoryStore;

/// Storage operations used by the engine services.
#[async_trait]
pub trait AllocationStore: Send + Sync {
    /// Cheap reachability probe.
    async fn ping(&self) -> EngineResult<()>;

    // Enrollment

    async fn enrollment_config(&self) -> EngineResult<EnrollmentConfig>;

    /// Replaces the limit and switch. Fails with `Config` if `max_participants`
    /// is below the current count, leaving the configuration untouched.
    async fn update_enrollment_config(
        &self,
        max_participants: Option<i32>,
        is_enrollment_active: bool,
        updated_by: &str,
    ) -> EngineResult<EnrollmentConfig>;

    /// Consults the gate and, in the same transaction, increments the count
    /// and inserts the participant. Fails with `Capacity` when not allowed and
    /// `Conflict` when the phone is already registered.
    async fn register_participant(&self, participant: NewParticipant) -> EngineResult<Participant>;

    // Participants

    async fn find_participant(&self, id: Uuid) -> EngineResult<Option<Participant>>;

    async fn list_participants(
        &self,
        query: &ListParticipantsQuery,
    ) -> EngineResult<(Vec<Participant>, i64)>;

    /// Participants with a completed invitation and no active gift card,
    /// oldest completion first. The search term matches phone or email.
    async fn list_eligible_participants(
        &self,
        query: &ListParticipantsQuery,
    ) -> EngineResult<(Vec<EligibleParticipant>, i64)>;

    /// Returns the participant's survey link to the pool when their invitation
    /// holds one and is not completed. Returns the released link id.
    async fn release_participant_link(&self, participant_id: Uuid) -> EngineResult<Option<Uuid>>;

    /// Deletes the participant and invitation and decrements the enrollment
    /// count. Fails with `Conflict` while the participant still holds an
    /// active gift card assignment. Returns `false` if no such participant.
    async fn remove_participant(&self, participant_id: Uuid) -> EngineResult<bool>;

    // Survey link pool

    /// Fails with `Conflict` when the long URL already exists.
    async fn insert_link(&self, link: NewSurveyLink, uploaded_by: &str) -> EngineResult<SurveyLink>;

    async fn find_link(&self, id: Uuid) -> EngineResult<Option<SurveyLink>>;

    async fn list_links(&self, query: &ListPoolQuery) -> EngineResult<(Vec<SurveyLink>, i64)>;

    async fn link_counts(&self) -> EngineResult<LinkPoolCounts>;

    /// Claims the first AVAILABLE link for the participant and records it on
    /// their invitation. A participant whose invitation already holds a link
    /// gets that link back without a second claim.
    async fn claim_link(&self, participant_id: Uuid) -> EngineResult<ClaimOutcome<LinkClaim>>;

    /// Deletes a link. An ASSIGNED link is only deletable once no invitation
    /// references it; otherwise `CascadeBlocked`.
    async fn delete_link(&self, id: Uuid) -> EngineResult<()>;

    // Gift card pool

    /// Fails with `Conflict` when the card code already exists.
    async fn insert_gift_card(&self, card: NewGiftCard, uploaded_by: &str) -> EngineResult<GiftCard>;

    async fn find_gift_card(&self, id: Uuid) -> EngineResult<Option<GiftCard>>;

    async fn list_gift_cards(&self, query: &ListPoolQuery) -> EngineResult<(Vec<GiftCard>, i64)>;

    async fn gift_card_counts(&self) -> EngineResult<GiftCardPoolCounts>;

    /// Changes the code of an AVAILABLE card.
    async fn update_gift_card_code(&self, id: Uuid, card_code: &str) -> EngineResult<GiftCard>;

    /// Moves an AVAILABLE card to EXPIRED or INVALID.
    async fn retire_gift_card(&self, id: Uuid, status: PoolItemStatus) -> EngineResult<GiftCard>;

    /// Deletes a card unless it is ASSIGNED (`CascadeBlocked`).
    async fn delete_gift_card(&self, id: Uuid) -> EngineResult<()>;

    /// Checks eligibility, claims the first claimable card and records the
    /// SENT assignment with its CREATED log entry, all in one transaction. Fails with `NotEligible` when
    /// the participant has no completed invitation or already holds an
    /// active assignment.
    async fn claim_gift_card(&self, request: NewAssignment) -> EngineResult<ClaimOutcome<GiftCardClaim>>;

    // Ledger

    async fn find_invitation(&self, id: Uuid) -> EngineResult<Option<Invitation>>;

    async fn find_invitation_for_participant(
        &self,
        participant_id: Uuid,
    ) -> EngineResult<Option<Invitation>>;

    /// Stores the dispatcher status verbatim.
    async fn record_invitation_status(&self, id: Uuid, status: &str) -> EngineResult<Invitation>;

    /// Sets `completed_at` if it is null. The flag reports whether it changed.
    async fn complete_invitation(&self, id: Uuid) -> EngineResult<(Invitation, bool)>;

    async fn uncomplete_invitation(&self, id: Uuid) -> EngineResult<Invitation>;

    async fn find_assignment(&self, id: Uuid) -> EngineResult<Option<GiftCardAssignment>>;

    async fn list_assignments_for_participant(
        &self,
        participant_id: Uuid,
    ) -> EngineResult<Vec<GiftCardAssignment>>;

    /// All assignments, orphaned ones included, newest first.
    async fn list_assignments(
        &self,
        query: &ListAssignmentsQuery,
    ) -> EngineResult<(Vec<GiftCardAssignment>, i64)>;

    /// Forward-only status change guarded by the current status. Re-applying
    /// the current status is a no-op and writes no log entry.
    async fn advance_assignment(
        &self,
        id: Uuid,
        status: AssignmentStatus,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment>;

    /// Stores the dispatcher status verbatim and logs it under `action`.
    async fn record_delivery_status(
        &self,
        id: Uuid,
        status: &str,
        action: DistributionAction,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment>;

    async fn update_assignment_notes(
        &self,
        id: Uuid,
        notes: Option<String>,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment>;

    /// Oldest first.
    async fn list_distribution_log(
        &self,
        assignment_id: Uuid,
    ) -> EngineResult<Vec<DistributionLogEntry>>;

    // Reversal

    /// Unsends an assignment, appends one audit record and releases its pool
    /// item, atomically. Already-unsent assignments yield `AlreadyUnsent`.
    ///
    /// Admin reversals fail with `NotFound` when the pool item is gone and
    /// with `Conflict` for REDEEMED assignments. Cascade reversals record
    /// missing pool items as `Orphaned` and move redeemed cards to INVALID.
    /// `requested_by` is the admin behind the request.
    async fn reverse_assignment(
        &self,
        id: Uuid,
        unsent_by: &str,
        requested_by: &str,
        trigger: ReversalTrigger,
    ) -> EngineResult<ReversalOutcome>;

    /// Newest first.
    async fn list_unsent_audit(
        &self,
        query: &ListUnsentAuditQuery,
    ) -> EngineResult<(Vec<UnsentAuditRecord>, i64)>;
}
