//! Survey completion toggles and dispatcher reports on invitations.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::assignment::ReportStatusRequest;
use domain::models::invitation::Invitation;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ActedBy;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct UncompleteResponse {
    pub invitation: Invitation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Mark the survey completed. Repeat calls keep the first timestamp.
///
/// POST /api/v1/invitations/:id/complete
pub async fn complete(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Path(invitation_id): Path<Uuid>,
) -> Result<Json<Invitation>, ApiError> {
    let invitation = state.ledger.mark_survey_completed(invitation_id).await?;
    info!(invitation_id = %invitation_id, acted_by = %acted_by.as_str(), "Survey completion recorded");
    Ok(Json(invitation))
}

/// Clear survey completion. Warns when a gift card is already out.
///
/// POST /api/v1/invitations/:id/uncomplete
pub async fn uncomplete(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Path(invitation_id): Path<Uuid>,
) -> Result<Json<UncompleteResponse>, ApiError> {
    let outcome = state.ledger.mark_survey_uncompleted(invitation_id).await?;
    info!(invitation_id = %invitation_id, acted_by = %acted_by.as_str(), "Survey completion cleared");
    Ok(Json(UncompleteResponse {
        invitation: outcome.invitation,
        warning: outcome.warning,
    }))
}

/// Status of the survey link message reported later by the dispatcher.
///
/// POST /api/v1/invitations/:id/message-status
pub async fn report_message_status(
    State(state): State<AppState>,
    Path(invitation_id): Path<Uuid>,
    Json(request): Json<ReportStatusRequest>,
) -> Result<Json<Invitation>, ApiError> {
    request.validate()?;

    let invitation = state
        .ledger
        .record_message_status(invitation_id, &request.status)
        .await?;
    Ok(Json(invitation))
}
