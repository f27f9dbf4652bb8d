//! Gift card assignment endpoint handlers: listing, ledger transitions,
//! dispatcher reports, resend, notes, unsend and the distribution log.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use domain::models::assignment::{
    GiftCardAssignment, ListAssignmentsQuery, ReportStatusRequest, UpdateNotesRequest,
};
use domain::models::distribution_log::DistributionLogEntry;
use domain::models::reversal::{ReversalAck, UnsendRequest};
use domain::models::unsent_audit::ReversalTrigger;
use shared::pagination::Paginated;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ActedBy;
use crate::middleware::metrics::record_reversal;

/// All assignments, including those whose participant was deleted.
///
/// GET /api/v1/assignments?status=SENT&search=555&orphaned=true
pub async fn list_assignments(
    State(state): State<AppState>,
    Query(query): Query<ListAssignmentsQuery>,
) -> Result<Json<Paginated<GiftCardAssignment>>, ApiError> {
    let (assignments, total) = state.ledger.list_assignments(&query).await?;
    Ok(Json(Paginated::new(assignments, &query.page_params(), total)))
}

/// POST /api/v1/assignments/:id/delivered
pub async fn mark_delivered(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Path(assignment_id): Path<Uuid>,
) -> Result<Json<GiftCardAssignment>, ApiError> {
    let assignment = state
        .ledger
        .mark_delivered(assignment_id, acted_by.as_str())
        .await?;
    Ok(Json(assignment))
}

/// POST /api/v1/assignments/:id/redeemed
pub async fn mark_redeemed(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Path(assignment_id): Path<Uuid>,
) -> Result<Json<GiftCardAssignment>, ApiError> {
    let assignment = state
        .ledger
        .mark_redeemed(assignment_id, acted_by.as_str())
        .await?;
    Ok(Json(assignment))
}

/// Status reported later by the dispatcher. Stored verbatim; the assignment
/// status does not change.
///
/// POST /api/v1/assignments/:id/delivery-status
pub async fn report_delivery_status(
    State(state): State<AppState>,
    Path(assignment_id): Path<Uuid>,
    Json(request): Json<ReportStatusRequest>,
) -> Result<Json<GiftCardAssignment>, ApiError> {
    request.validate()?;

    let assignment = state
        .ledger
        .record_delivery_status(assignment_id, &request.status)
        .await?;
    Ok(Json(assignment))
}

/// Distribution history, oldest first.
///
/// GET /api/v1/assignments/:id/logs
pub async fn distribution_log(
    State(state): State<AppState>,
    Path(assignment_id): Path<Uuid>,
) -> Result<Json<Vec<DistributionLogEntry>>, ApiError> {
    let entries = state.ledger.distribution_log(assignment_id).await?;
    Ok(Json(entries))
}

/// Re-send the same card. No new pool item is claimed.
///
/// POST /api/v1/assignments/:id/resend
pub async fn resend(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Path(assignment_id): Path<Uuid>,
) -> Result<Json<GiftCardAssignment>, ApiError> {
    let assignment = state
        .allocation
        .resend_gift_card(assignment_id, acted_by.as_str())
        .await?;
    Ok(Json(assignment))
}

/// Unsend a gift card and return it to the pool. The body must carry the
/// confirmation phrase `UNSEND`.
///
/// POST /api/v1/assignments/:id/unsend
pub async fn unsend(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Path(assignment_id): Path<Uuid>,
    Json(request): Json<UnsendRequest>,
) -> Result<Json<ReversalAck>, ApiError> {
    let ack = state
        .reversal
        .reverse(assignment_id, &request.confirmation_phrase, acted_by.as_str())
        .await?;

    if !ack.already_unsent {
        record_reversal(ReversalTrigger::Admin);
    }
    Ok(Json(ack))
}

/// PUT /api/v1/assignments/:id/notes
pub async fn update_notes(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Path(assignment_id): Path<Uuid>,
    Json(request): Json<UpdateNotesRequest>,
) -> Result<Json<GiftCardAssignment>, ApiError> {
    request.validate()?;

    let assignment = state
        .ledger
        .update_notes(assignment_id, request.notes, acted_by.as_str())
        .await?;
    info!(assignment_id = %assignment_id, acted_by = %acted_by.as_str(), "Assignment notes updated");
    Ok(Json(assignment))
}
