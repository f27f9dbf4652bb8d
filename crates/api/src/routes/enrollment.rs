//! Enrollment configuration endpoint handlers.

use axum::{extract::State, Json};
use domain::models::enrollment::{EnrollmentDecision, EnrollmentStatusView, UpdateEnrollmentRequest};
use serde::Serialize;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ActedBy;

/// Response for the enrollment gate check.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EnrollmentCheckResponse {
    pub decision: EnrollmentDecision,
    pub allowed: bool,
}

/// Current limit, count and derived status.
///
/// GET /api/v1/enrollment
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<EnrollmentStatusView>, ApiError> {
    Ok(Json(state.enrollment.status().await?))
}

/// Whether a new participant may register right now.
///
/// GET /api/v1/enrollment/check
pub async fn check(
    State(state): State<AppState>,
) -> Result<Json<EnrollmentCheckResponse>, ApiError> {
    let decision = state.enrollment.check_enrollment().await?;
    Ok(Json(EnrollmentCheckResponse {
        decision,
        allowed: decision.is_allowed(),
    }))
}

/// Replace the participant limit and the enrollment switch.
///
/// PUT /api/v1/enrollment
pub async fn update_config(
    State(state): State<AppState>,
    acted_by: ActedBy,
    Json(request): Json<UpdateEnrollmentRequest>,
) -> Result<Json<EnrollmentStatusView>, ApiError> {
    request.validate()?;

    let config = state
        .enrollment
        .update_config(
            request.max_participants,
            request.is_enrollment_active,
            acted_by.as_str(),
        )
        .await?;

    Ok(Json(config.into()))
}
