//! In-memory `AllocationStore`.
//!
//! All state sits behind one lock, so every method is trivially atomic. Used
//! by the domain tests, the API tests and the `memory` store mode.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use shared::pagination::PageParams;

use super::AllocationStore;
use crate::error::{EngineError, EngineResult};
use crate::models::allocation::{ClaimOutcome, GiftCardClaim, LinkClaim};
use crate::models::assignment::{
    AssignmentStatus, GiftCardAssignment, ListAssignmentsQuery, NewAssignment,
};
use crate::models::distribution_log::{DistributionAction, DistributionLogEntry};
use crate::models::enrollment::EnrollmentConfig;
use crate::models::gift_card::{GiftCard, NewGiftCard, DEFAULT_REDEMPTION_URL};
use crate::models::invitation::Invitation;
use crate::models::participant::{
    EligibleParticipant, ListParticipantsQuery, NewParticipant, Participant,
};
use crate::models::pool::{GiftCardPoolCounts, LinkPoolCounts, ListPoolQuery, PoolItemStatus};
use crate::models::reversal::ReversalOutcome;
use crate::models::survey_link::{NewSurveyLink, SurveyLink};
use crate::models::unsent_audit::{ListUnsentAuditQuery, ReversalTrigger, UnsentAuditRecord};

/// Common view over both pools for the shared claim policy.
trait PoolEntry {
    fn id(&self) -> Uuid;
    fn uploaded_at(&self) -> DateTime<Utc>;
    fn is_claimable_at(&self, now: DateTime<Utc>) -> bool;
}

impl PoolEntry for SurveyLink {
    fn id(&self) -> Uuid {
        self.id
    }

    fn uploaded_at(&self) -> DateTime<Utc> {
        self.uploaded_at
    }

    fn is_claimable_at(&self, _now: DateTime<Utc>) -> bool {
        self.status == PoolItemStatus::Available
    }
}

impl PoolEntry for GiftCard {
    fn id(&self) -> Uuid {
        self.id
    }

    fn uploaded_at(&self) -> DateTime<Utc> {
        self.uploaded_at
    }

    fn is_claimable_at(&self, now: DateTime<Utc>) -> bool {
        GiftCard::is_claimable_at(self, now)
    }
}

/// First claimable item by `(uploaded_at, id)`.
fn next_claimable<T: PoolEntry>(items: &HashMap<Uuid, T>, now: DateTime<Utc>) -> Option<Uuid> {
    items
        .values()
        .filter(|item| item.is_claimable_at(now))
        .min_by_key(|item| (item.uploaded_at(), item.id()))
        .map(PoolEntry::id)
}

fn paginate<T>(items: Vec<T>, params: &PageParams) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let page = items
        .into_iter()
        .skip(params.offset() as usize)
        .take(params.limit() as usize)
        .collect();
    (page, total)
}

fn contains_term(value: Option<&str>, term: &str) -> bool {
    value.is_some_and(|v| v.to_lowercase().contains(term))
}

#[derive(Debug, Default)]
struct MemoryState {
    enrollment: EnrollmentConfig,
    participants: HashMap<Uuid, Participant>,
    invitations: HashMap<Uuid, Invitation>,
    links: HashMap<Uuid, SurveyLink>,
    gift_cards: HashMap<Uuid, GiftCard>,
    assignments: HashMap<Uuid, GiftCardAssignment>,
    audit: Vec<UnsentAuditRecord>,
    distribution_log: Vec<DistributionLogEntry>,
    last_upload_at: Option<DateTime<Utc>>,
}

impl MemoryState {
    /// Strictly increasing upload timestamps keep FIFO order stable.
    fn next_upload_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_upload_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_upload_at = Some(stamp);
        stamp
    }

    fn invitation_for(&self, participant_id: Uuid) -> Option<&Invitation> {
        self.invitations
            .values()
            .find(|i| i.participant_id == participant_id)
    }

    fn has_active_assignment(&self, participant_id: Uuid) -> bool {
        self.assignments
            .values()
            .any(|a| a.participant_id == Some(participant_id) && a.is_active())
    }

    fn append_log(
        &mut self,
        assignment_id: Uuid,
        action: DistributionAction,
        detail: Option<String>,
        acted_by: &str,
        at: DateTime<Utc>,
    ) {
        self.distribution_log
            .push(DistributionLogEntry::new(assignment_id, action, detail, acted_by, at));
    }
}

/// `AllocationStore` kept entirely in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the given enrollment configuration.
    pub fn with_enrollment(config: EnrollmentConfig) -> Self {
        let store = Self::default();
        if let Ok(mut state) = store.state.write() {
            state.enrollment = config;
        }
        store
    }

    /// Removes a gift card regardless of its status, as an out-of-band
    /// deletion would.
    pub fn purge_gift_card(&self, id: Uuid) -> EngineResult<bool> {
        Ok(self.write()?.gift_cards.remove(&id).is_some())
    }

    /// Number of audit records held.
    pub fn audit_len(&self) -> EngineResult<usize> {
        Ok(self.read()?.audit.len())
    }

    /// Poisons the lock so every later call fails with `Storage`.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let state = self.state.clone();
        let _ = std::thread::spawn(move || {
            let _guard = state.write();
            panic!("store lock poisoned on purpose");
        })
        .join();
    }

    fn read(&self) -> EngineResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| EngineError::Storage("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> EngineResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| EngineError::Storage("in-memory store lock poisoned".into()))
    }
}

#[async_trait]
impl AllocationStore for InMemoryStore {
    async fn ping(&self) -> EngineResult<()> {
        self.read().map(|_| ())
    }

    async fn enrollment_config(&self) -> EngineResult<EnrollmentConfig> {
        Ok(self.read()?.enrollment.clone())
    }

    async fn update_enrollment_config(
        &self,
        max_participants: Option<i32>,
        is_enrollment_active: bool,
        updated_by: &str,
    ) -> EngineResult<EnrollmentConfig> {
        let mut state = self.write()?;
        state
            .enrollment
            .check_new_limit(max_participants)
            .map_err(EngineError::Config)?;

        state.enrollment.max_participants = max_participants;
        state.enrollment.is_enrollment_active = is_enrollment_active;
        state.enrollment.updated_by = updated_by.to_string();
        state.enrollment.updated_at = Utc::now();
        Ok(state.enrollment.clone())
    }

    async fn register_participant(&self, participant: NewParticipant) -> EngineResult<Participant> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        let decision = state.enrollment.decision();
        if !decision.is_allowed() {
            return Err(EngineError::Capacity(decision));
        }
        if state.participants.values().any(|p| p.phone == participant.phone) {
            return Err(EngineError::Conflict(
                "A participant with this phone number already exists".into(),
            ));
        }

        let created = Participant {
            id: Uuid::new_v4(),
            phone: participant.phone,
            email: participant.email,
            verified_at: participant.verified_at,
            consented_at: participant.consented_at,
            created_at: Utc::now(),
        };
        state.enrollment.current_count += 1;
        state.participants.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_participant(&self, id: Uuid) -> EngineResult<Option<Participant>> {
        Ok(self.read()?.participants.get(&id).cloned())
    }

    async fn list_participants(
        &self,
        query: &ListParticipantsQuery,
    ) -> EngineResult<(Vec<Participant>, i64)> {
        let state = self.read()?;
        let term = query.search_term();
        let mut items: Vec<Participant> = state
            .participants
            .values()
            .filter(|p| match &term {
                Some(t) => contains_term(Some(p.phone.as_str()), t) || contains_term(p.email.as_deref(), t),
                None => true,
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(items, &query.page_params()))
    }

    async fn list_eligible_participants(
        &self,
        query: &ListParticipantsQuery,
    ) -> EngineResult<(Vec<EligibleParticipant>, i64)> {
        let state = self.read()?;
        let term = query.search_term();
        let mut items: Vec<EligibleParticipant> = state
            .participants
            .values()
            .filter(|p| match &term {
                Some(t) => contains_term(Some(p.phone.as_str()), t) || contains_term(p.email.as_deref(), t),
                None => true,
            })
            .filter(|p| !state.has_active_assignment(p.id))
            .filter_map(|p| {
                let invitation = state.invitation_for(p.id)?;
                Some(EligibleParticipant {
                    participant_id: p.id,
                    phone: p.phone.clone(),
                    email: p.email.clone(),
                    invitation_id: invitation.id,
                    completed_at: invitation.completed_at?,
                })
            })
            .collect();
        items.sort_by_key(|e| (e.completed_at, e.participant_id));
        Ok(paginate(items, &query.page_params()))
    }

    async fn release_participant_link(&self, participant_id: Uuid) -> EngineResult<Option<Uuid>> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        let Some(invitation) = state
            .invitations
            .values_mut()
            .find(|i| i.participant_id == participant_id)
        else {
            return Ok(None);
        };
        if invitation.is_completed() {
            return Ok(None);
        }
        let Some(link_id) = invitation.link_item_id else {
            return Ok(None);
        };

        match state.links.get_mut(&link_id) {
            Some(link) if link.status == PoolItemStatus::Assigned => {
                link.status = PoolItemStatus::Available;
                link.assigned_at = None;
                invitation.link_item_id = None;
                Ok(Some(link_id))
            }
            _ => Ok(None),
        }
    }

    async fn remove_participant(&self, participant_id: Uuid) -> EngineResult<bool> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        if !state.participants.contains_key(&participant_id) {
            return Ok(false);
        }
        if state.has_active_assignment(participant_id) {
            return Err(EngineError::Conflict(
                "Participant still holds an active gift card".into(),
            ));
        }

        state.invitations.retain(|_, i| i.participant_id != participant_id);
        for assignment in state.assignments.values_mut() {
            if assignment.participant_id == Some(participant_id) {
                assignment.participant_id = None;
                assignment.invitation_id = None;
            }
        }
        state.participants.remove(&participant_id);
        state.enrollment.current_count = (state.enrollment.current_count - 1).max(0);
        Ok(true)
    }

    async fn insert_link(&self, link: NewSurveyLink, uploaded_by: &str) -> EngineResult<SurveyLink> {
        let mut state = self.write()?;
        if state.links.values().any(|l| l.long_url == link.long_url) {
            return Err(EngineError::Conflict("Survey link already exists".into()));
        }

        let created = SurveyLink {
            id: Uuid::new_v4(),
            long_url: link.long_url,
            short_url: link.short_url,
            status: PoolItemStatus::Available,
            batch_label: link.batch_label,
            uploaded_by: uploaded_by.to_string(),
            uploaded_at: state.next_upload_timestamp(),
            assigned_at: None,
        };
        state.links.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_link(&self, id: Uuid) -> EngineResult<Option<SurveyLink>> {
        Ok(self.read()?.links.get(&id).cloned())
    }

    async fn list_links(&self, query: &ListPoolQuery) -> EngineResult<(Vec<SurveyLink>, i64)> {
        let state = self.read()?;
        let term = query.search_term();
        let mut items: Vec<SurveyLink> = state
            .links
            .values()
            .filter(|l| query.status.map_or(true, |s| l.status == s))
            .filter(|l| match &term {
                Some(t) => {
                    contains_term(Some(l.long_url.as_str()), t)
                        || contains_term(l.short_url.as_deref(), t)
                        || contains_term(l.batch_label.as_deref(), t)
                }
                None => true,
            })
            .cloned()
            .collect();
        items.sort_by_key(|l| (l.uploaded_at, l.id));
        Ok(paginate(items, &query.page_params()))
    }

    async fn link_counts(&self) -> EngineResult<LinkPoolCounts> {
        let state = self.read()?;
        let mut counts = LinkPoolCounts::default();
        for link in state.links.values() {
            counts.total += 1;
            match link.status {
                PoolItemStatus::Assigned => counts.assigned += 1,
                PoolItemStatus::Available => counts.available += 1,
                PoolItemStatus::Expired | PoolItemStatus::Invalid => {}
            }
        }
        Ok(counts)
    }

    async fn claim_link(&self, participant_id: Uuid) -> EngineResult<ClaimOutcome<LinkClaim>> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        if !state.participants.contains_key(&participant_id) {
            return Err(EngineError::NotFound("Participant not found".into()));
        }

        let existing = state.invitation_for(participant_id).cloned();
        if let Some(invitation) = &existing {
            if let Some(link) = invitation.link_item_id.and_then(|id| state.links.get(&id)) {
                return Ok(ClaimOutcome::Claimed(LinkClaim {
                    invitation: invitation.clone(),
                    link: link.clone(),
                    newly_claimed: false,
                }));
            }
        }

        let now = Utc::now();
        let Some(link_id) = next_claimable(&state.links, now) else {
            return Ok(ClaimOutcome::NoItemAvailable);
        };
        let Some(link) = state.links.get_mut(&link_id) else {
            return Ok(ClaimOutcome::NoItemAvailable);
        };
        link.status = PoolItemStatus::Assigned;
        link.assigned_at = Some(now);
        let link = link.clone();

        let invitation = match existing {
            Some(mut invitation) => {
                invitation.link_item_id = Some(link_id);
                invitation
            }
            None => Invitation {
                id: Uuid::new_v4(),
                participant_id,
                link_item_id: Some(link_id),
                message_status: None,
                queued_at: None,
                sent_at: None,
                completed_at: None,
                created_at: now,
            },
        };
        state.invitations.insert(invitation.id, invitation.clone());

        Ok(ClaimOutcome::Claimed(LinkClaim {
            invitation,
            link,
            newly_claimed: true,
        }))
    }

    async fn delete_link(&self, id: Uuid) -> EngineResult<()> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        let status = state
            .links
            .get(&id)
            .map(|l| l.status)
            .ok_or_else(|| EngineError::NotFound("Survey link not found".into()))?;
        let referenced = state
            .invitations
            .values()
            .any(|i| i.link_item_id == Some(id));
        if !status.is_deletable() && referenced {
            return Err(EngineError::CascadeBlocked(
                "Cannot delete a survey link while it is assigned".into(),
            ));
        }

        state.links.remove(&id);
        for invitation in state.invitations.values_mut() {
            if invitation.link_item_id == Some(id) {
                invitation.link_item_id = None;
            }
        }
        Ok(())
    }

    async fn insert_gift_card(&self, card: NewGiftCard, uploaded_by: &str) -> EngineResult<GiftCard> {
        let mut state = self.write()?;
        if state.gift_cards.values().any(|c| c.card_code == card.card_code) {
            return Err(EngineError::Conflict("Gift card code already exists".into()));
        }

        let created = GiftCard {
            id: Uuid::new_v4(),
            card_code: card.card_code,
            card_type: card.card_type,
            card_value_cents: card.card_value_cents,
            redemption_url: card
                .redemption_url
                .unwrap_or_else(|| DEFAULT_REDEMPTION_URL.to_string()),
            instructions: card.instructions,
            status: PoolItemStatus::Available,
            batch_label: card.batch_label,
            uploaded_by: uploaded_by.to_string(),
            uploaded_at: state.next_upload_timestamp(),
            expires_at: card.expires_at,
            assigned_at: None,
            assigned_assignment_id: None,
        };
        state.gift_cards.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_gift_card(&self, id: Uuid) -> EngineResult<Option<GiftCard>> {
        Ok(self.read()?.gift_cards.get(&id).cloned())
    }

    async fn list_gift_cards(&self, query: &ListPoolQuery) -> EngineResult<(Vec<GiftCard>, i64)> {
        let state = self.read()?;
        let term = query.search_term();
        let mut items: Vec<GiftCard> = state
            .gift_cards
            .values()
            .filter(|c| query.status.map_or(true, |s| c.status == s))
            .filter(|c| match &term {
                Some(t) => {
                    contains_term(Some(c.card_code.as_str()), t)
                        || contains_term(c.batch_label.as_deref(), t)
                }
                None => true,
            })
            .cloned()
            .collect();
        items.sort_by_key(|c| (c.uploaded_at, c.id));
        Ok(paginate(items, &query.page_params()))
    }

    async fn gift_card_counts(&self) -> EngineResult<GiftCardPoolCounts> {
        let state = self.read()?;
        let mut counts = GiftCardPoolCounts::default();
        for card in state.gift_cards.values() {
            counts.add(card.status);
        }
        Ok(counts)
    }

    async fn update_gift_card_code(&self, id: Uuid, card_code: &str) -> EngineResult<GiftCard> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        if state
            .gift_cards
            .values()
            .any(|c| c.id != id && c.card_code == card_code)
        {
            return Err(EngineError::Conflict("Gift card code already exists".into()));
        }
        let card = state
            .gift_cards
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound("Gift card not found".into()))?;
        if card.status != PoolItemStatus::Available {
            return Err(EngineError::Conflict(format!(
                "Only available gift cards can be edited; this card is {}",
                card.status
            )));
        }

        card.card_code = card_code.to_string();
        Ok(card.clone())
    }

    async fn retire_gift_card(&self, id: Uuid, status: PoolItemStatus) -> EngineResult<GiftCard> {
        if !matches!(status, PoolItemStatus::Expired | PoolItemStatus::Invalid) {
            return Err(EngineError::Validation(format!(
                "Gift cards can only be retired as EXPIRED or INVALID, not {}",
                status
            )));
        }

        let mut state = self.write()?;
        let card = state
            .gift_cards
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound("Gift card not found".into()))?;
        if card.status != PoolItemStatus::Available {
            return Err(EngineError::Conflict(format!(
                "Gift card is {} and cannot be marked {}",
                card.status, status
            )));
        }

        card.status = status;
        Ok(card.clone())
    }

    async fn delete_gift_card(&self, id: Uuid) -> EngineResult<()> {
        let mut state = self.write()?;
        let status = state
            .gift_cards
            .get(&id)
            .map(|c| c.status)
            .ok_or_else(|| EngineError::NotFound("Gift card not found".into()))?;
        if !status.is_deletable() {
            return Err(EngineError::CascadeBlocked(
                "Cannot delete a gift card while it is assigned".into(),
            ));
        }

        state.gift_cards.remove(&id);
        Ok(())
    }

    async fn claim_gift_card(
        &self,
        request: NewAssignment,
    ) -> EngineResult<ClaimOutcome<GiftCardClaim>> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let participant_id = request.participant_id;

        if !state.participants.contains_key(&participant_id) {
            return Err(EngineError::NotFound("Participant not found".into()));
        }
        let invitation_id = match state.invitation_for(participant_id) {
            None => {
                return Err(EngineError::NotEligible(
                    "Participant has no survey invitation".into(),
                ))
            }
            Some(invitation) if !invitation.is_completed() => {
                return Err(EngineError::NotEligible(
                    "Participant has not completed the survey".into(),
                ))
            }
            Some(invitation) => invitation.id,
        };
        if state.has_active_assignment(participant_id) {
            return Err(EngineError::NotEligible(
                "Participant already has an active gift card".into(),
            ));
        }

        let now = Utc::now();
        let Some(card_id) = next_claimable(&state.gift_cards, now) else {
            return Ok(ClaimOutcome::NoItemAvailable);
        };
        let Some(card) = state.gift_cards.get_mut(&card_id) else {
            return Ok(ClaimOutcome::NoItemAvailable);
        };

        let assignment = GiftCardAssignment {
            id: Uuid::new_v4(),
            participant_id: Some(participant_id),
            invitation_id: Some(invitation_id),
            pool_item_id: card.id,
            card_code: card.card_code.clone(),
            card_type: card.card_type,
            card_value_cents: card.card_value_cents,
            status: AssignmentStatus::Sent,
            delivery_method: request.delivery_method,
            delivery_status: None,
            sent_by: request.sent_by,
            sent_at: now,
            delivered_at: None,
            redeemed_at: None,
            unsent_at: None,
            notes: request.notes,
            source: request.source,
        };
        card.status = PoolItemStatus::Assigned;
        card.assigned_at = Some(now);
        card.assigned_assignment_id = Some(assignment.id);
        let card = card.clone();

        state.assignments.insert(assignment.id, assignment.clone());
        state.append_log(
            assignment.id,
            DistributionAction::Created,
            Some(card.card_code.clone()),
            &assignment.sent_by,
            now,
        );
        Ok(ClaimOutcome::Claimed(GiftCardClaim { assignment, card }))
    }

    async fn find_invitation(&self, id: Uuid) -> EngineResult<Option<Invitation>> {
        Ok(self.read()?.invitations.get(&id).cloned())
    }

    async fn find_invitation_for_participant(
        &self,
        participant_id: Uuid,
    ) -> EngineResult<Option<Invitation>> {
        Ok(self.read()?.invitation_for(participant_id).cloned())
    }

    async fn record_invitation_status(&self, id: Uuid, status: &str) -> EngineResult<Invitation> {
        let mut state = self.write()?;
        let invitation = state
            .invitations
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound("Invitation not found".into()))?;
        invitation.apply_message_status(status, Utc::now());
        Ok(invitation.clone())
    }

    async fn complete_invitation(&self, id: Uuid) -> EngineResult<(Invitation, bool)> {
        let mut state = self.write()?;
        let invitation = state
            .invitations
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound("Invitation not found".into()))?;
        if invitation.completed_at.is_some() {
            return Ok((invitation.clone(), false));
        }
        invitation.completed_at = Some(Utc::now());
        Ok((invitation.clone(), true))
    }

    async fn uncomplete_invitation(&self, id: Uuid) -> EngineResult<Invitation> {
        let mut state = self.write()?;
        let invitation = state
            .invitations
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound("Invitation not found".into()))?;
        invitation.completed_at = None;
        Ok(invitation.clone())
    }

    async fn find_assignment(&self, id: Uuid) -> EngineResult<Option<GiftCardAssignment>> {
        Ok(self.read()?.assignments.get(&id).cloned())
    }

    async fn list_assignments_for_participant(
        &self,
        participant_id: Uuid,
    ) -> EngineResult<Vec<GiftCardAssignment>> {
        let state = self.read()?;
        let mut items: Vec<GiftCardAssignment> = state
            .assignments
            .values()
            .filter(|a| a.participant_id == Some(participant_id))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        Ok(items)
    }

    async fn list_assignments(
        &self,
        query: &ListAssignmentsQuery,
    ) -> EngineResult<(Vec<GiftCardAssignment>, i64)> {
        let state = self.read()?;
        let term = query.search_term();
        let mut items: Vec<GiftCardAssignment> = state
            .assignments
            .values()
            .filter(|a| query.status.map_or(true, |s| a.status == s))
            .filter(|a| query.orphaned.map_or(true, |o| a.participant_id.is_none() == o))
            .filter(|a| match &term {
                Some(t) => {
                    let phone = a
                        .participant_id
                        .and_then(|pid| state.participants.get(&pid))
                        .map(|p| p.phone.as_str());
                    contains_term(Some(a.card_code.as_str()), t) || contains_term(phone, t)
                }
                None => true,
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then(a.id.cmp(&b.id)));
        Ok(paginate(items, &query.page_params()))
    }

    async fn advance_assignment(
        &self,
        id: Uuid,
        status: AssignmentStatus,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let assignment = state
            .assignments
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound("Gift card assignment not found".into()))?;

        if assignment.status == status {
            return Ok(assignment.clone());
        }
        let from = assignment.status;
        let now = Utc::now();
        if !assignment.advance(status, now) {
            return Err(EngineError::Conflict(format!(
                "Cannot change gift card status from {} to {}",
                from, status
            )));
        }
        let updated = assignment.clone();
        let action = match status {
            AssignmentStatus::Redeemed => DistributionAction::MarkedRedeemed,
            _ => DistributionAction::MarkedDelivered,
        };
        state.append_log(id, action, Some(from.to_string()), acted_by, now);
        Ok(updated)
    }

    async fn record_delivery_status(
        &self,
        id: Uuid,
        status: &str,
        action: DistributionAction,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let assignment = state
            .assignments
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound("Gift card assignment not found".into()))?;
        assignment.delivery_status = Some(status.to_string());
        let updated = assignment.clone();
        state.append_log(id, action, Some(status.to_string()), acted_by, Utc::now());
        Ok(updated)
    }

    async fn update_assignment_notes(
        &self,
        id: Uuid,
        notes: Option<String>,
        acted_by: &str,
    ) -> EngineResult<GiftCardAssignment> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let assignment = state
            .assignments
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound("Gift card assignment not found".into()))?;
        assignment.notes = notes.clone();
        let updated = assignment.clone();
        state.append_log(id, DistributionAction::NotesUpdated, notes, acted_by, Utc::now());
        Ok(updated)
    }

    async fn list_distribution_log(
        &self,
        assignment_id: Uuid,
    ) -> EngineResult<Vec<DistributionLogEntry>> {
        Ok(self
            .read()?
            .distribution_log
            .iter()
            .filter(|e| e.assignment_id == assignment_id)
            .cloned()
            .collect())
    }

    async fn reverse_assignment(
        &self,
        id: Uuid,
        unsent_by: &str,
        requested_by: &str,
        trigger: ReversalTrigger,
    ) -> EngineResult<ReversalOutcome> {
        let mut guard = self.write()?;
        let state = &mut *guard;

        let assignment = state
            .assignments
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound("Gift card assignment not found".into()))?;
        if !assignment.is_active() {
            return Ok(ReversalOutcome::AlreadyUnsent);
        }
        if trigger == ReversalTrigger::Admin && assignment.status == AssignmentStatus::Redeemed {
            return Err(EngineError::Conflict(
                "Redeemed gift cards cannot be unsent".into(),
            ));
        }

        let now = Utc::now();
        let participant = assignment
            .participant_id
            .and_then(|pid| state.participants.get(&pid));
        let audit = UnsentAuditRecord::capture(
            &assignment,
            participant,
            trigger,
            unsent_by,
            requested_by,
            now,
        );

        let released_to = match state.gift_cards.get_mut(&assignment.pool_item_id) {
            Some(card)
                if card.status == PoolItemStatus::Assigned
                    && card.assigned_assignment_id == Some(id) =>
            {
                let target = if assignment.status == AssignmentStatus::Redeemed {
                    PoolItemStatus::Invalid
                } else {
                    PoolItemStatus::Available
                };
                card.status = target;
                card.assigned_at = None;
                card.assigned_assignment_id = None;
                Some(target)
            }
            Some(_) if trigger == ReversalTrigger::Admin => {
                return Err(EngineError::Conflict(
                    "Pool item is no longer held by this assignment".into(),
                ))
            }
            None if trigger == ReversalTrigger::Admin => {
                return Err(EngineError::NotFound(
                    "Pool item for this assignment no longer exists".into(),
                ))
            }
            _ => None,
        };

        if let Some(stored) = state.assignments.get_mut(&id) {
            stored.status = AssignmentStatus::Unsent;
            stored.unsent_at = Some(now);
        }
        state.audit.push(audit.clone());
        state.append_log(
            id,
            DistributionAction::Unsent,
            Some(trigger.to_string()),
            unsent_by,
            now,
        );

        Ok(match released_to {
            Some(released_to) => ReversalOutcome::Reversed { audit, released_to },
            None => ReversalOutcome::Orphaned { audit },
        })
    }

    async fn list_unsent_audit(
        &self,
        query: &ListUnsentAuditQuery,
    ) -> EngineResult<(Vec<UnsentAuditRecord>, i64)> {
        let state = self.read()?;
        let mut items: Vec<UnsentAuditRecord> = state
            .audit
            .iter()
            .filter(|r| {
                query
                    .assignment_id
                    .map_or(true, |id| r.original_assignment_id == id)
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.unsent_at.cmp(&a.unsent_at));
        Ok(paginate(items, &query.page_params()))
    }
}
