//! Participant endpoint handlers: registration, lookup, link and gift card
//! claims, and cascade deletion.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use domain::models::allocation::{ClaimOutcome, GiftCardClaim, LinkClaim};
use domain::models::assignment::{GiftCardAssignment, SendGiftCardRequest};
use domain::models::participant::{ListParticipantsQuery, NewParticipant, Participant};
use domain::models::pool::PoolKind;
use domain::models::reversal::CascadeReport;
use domain::models::unsent_audit::ReversalTrigger;
use domain::EngineError;
use shared::pagination::Paginated;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ActedBy;
use crate::middleware::metrics::{record_pool_claim, record_reversal, ClaimMetricOutcome};

/// Register a participant through the enrollment gate.
///
/// POST /api/v1/participants
pub async fn register(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Json(request): Json<NewParticipant>,
) -> Result<(StatusCode, Json<Participant>), ApiError> {
    let request = request.normalized();
    request.validate()?;

    let participant = state.enrollment.register(request).await?;
    info!(
        participant_id = %participant.id,
        acted_by = %acted_by.as_str(),
        "Participant registered via API"
    );
    Ok((StatusCode::CREATED, Json(participant)))
}

/// List participants.
///
/// GET /api/v1/participants?page=1&per_page=50&search=555
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListParticipantsQuery>,
) -> Result<Json<Paginated<Participant>>, ApiError> {
    let (participants, total) = state.store.list_participants(&query).await?;
    Ok(Json(Paginated::new(participants, &query.page_params(), total)))
}

/// GET /api/v1/participants/:id
pub async fn get_participant(
    State(state): State<AppState>,
    Path(participant_id): Path<Uuid>,
) -> Result<Json<Participant>, ApiError> {
    let participant = state
        .store
        .find_participant(participant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Participant not found".to_string()))?;
    Ok(Json(participant))
}

/// Delete a participant, reversing their gift cards and releasing an unused
/// survey link.
///
/// DELETE /api/v1/participants/:id
pub async fn delete_participant(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Path(participant_id): Path<Uuid>,
) -> Result<Json<CascadeReport>, ApiError> {
    let report = state
        .cascade
        .delete_participant(participant_id, acted_by.as_str())
        .await?;

    let reversals =
        report.reclaimed_cards + report.invalidated_cards + report.orphaned_assignments.len();
    for _ in 0..reversals {
        record_reversal(ReversalTrigger::ParticipantDeletion);
    }

    info!(
        participant_id = %participant_id,
        reversals,
        partial = report.is_partial(),
        acted_by = %acted_by.as_str(),
        "Participant deletion requested"
    );
    Ok(Json(report))
}

/// Gift card assignments of a participant, newest first.
///
/// GET /api/v1/participants/:id/assignments
pub async fn list_assignments(
    State(state): State<AppState>,
    Path(participant_id): Path<Uuid>,
) -> Result<Json<Vec<GiftCardAssignment>>, ApiError> {
    let assignments = state.ledger.assignments_for_participant(participant_id).await?;
    Ok(Json(assignments))
}

/// Claim a survey link for the participant and send the invitation.
///
/// Returns 201 on a new claim and 200 when the participant already held a
/// link.
///
/// POST /api/v1/participants/:id/invitation
pub async fn send_invitation(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Path(participant_id): Path<Uuid>,
) -> Result<(StatusCode, Json<LinkClaim>), ApiError> {
    let outcome = state.allocation.claim_link(participant_id).await.map_err(|e| {
        record_pool_claim(PoolKind::Link, ClaimMetricOutcome::Failed);
        e
    })?;

    match outcome {
        ClaimOutcome::Claimed(claim) => {
            let (metric, status) = if claim.newly_claimed {
                (ClaimMetricOutcome::Claimed, StatusCode::CREATED)
            } else {
                (ClaimMetricOutcome::Reused, StatusCode::OK)
            };
            record_pool_claim(PoolKind::Link, metric);
            info!(
                participant_id = %participant_id,
                invitation_id = %claim.invitation.id,
                newly_claimed = claim.newly_claimed,
                acted_by = %acted_by.as_str(),
                "Invitation sent"
            );
            Ok((status, Json(claim)))
        }
        ClaimOutcome::NoItemAvailable => {
            record_pool_claim(PoolKind::Link, ClaimMetricOutcome::Exhausted);
            Err(EngineError::NoItemAvailable(PoolKind::Link).into())
        }
    }
}

/// Claim a gift card for the participant and send it.
///
/// POST /api/v1/participants/:id/gift-card
pub async fn send_gift_card(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Path(participant_id): Path<Uuid>,
    Json(request): Json<SendGiftCardRequest>,
) -> Result<(StatusCode, Json<GiftCardClaim>), ApiError> {
    request.validate()?;

    let outcome = state
        .allocation
        .claim_gift_card(
            participant_id,
            request.delivery_method,
            request.notes,
            acted_by.as_str(),
        )
        .await
        .map_err(|e| {
            record_pool_claim(PoolKind::GiftCard, ClaimMetricOutcome::Failed);
            e
        })?;

    match outcome {
        ClaimOutcome::Claimed(claim) => {
            record_pool_claim(PoolKind::GiftCard, ClaimMetricOutcome::Claimed);
            Ok((StatusCode::CREATED, Json(claim)))
        }
        ClaimOutcome::NoItemAvailable => {
            record_pool_claim(PoolKind::GiftCard, ClaimMetricOutcome::Exhausted);
            Err(EngineError::NoItemAvailable(PoolKind::GiftCard).into())
        }
    }
}
