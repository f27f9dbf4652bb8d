use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::models::enrollment::EnrollmentDecision;
use domain::EngineError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Enrollment closed: {0}")]
    EnrollmentClosed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("No item available: {0}")]
    NoItemAvailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid fields: {0}")]
    InvalidFields(String, Vec<ValidationDetail>),

    #[error("Confirmation mismatch: {0}")]
    ConfirmationMismatch(String),

    #[error("Not eligible: {0}")]
    NotEligible(String),

    #[error("Configuration rejected: {0}")]
    ConfigRejected(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::EnrollmentClosed(msg) => (StatusCode::FORBIDDEN, "enrollment_closed", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::NoItemAvailable(msg) => (StatusCode::CONFLICT, "no_item_available", msg),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::InvalidFields(msg, fields) => {
                details = Some(fields);
                (StatusCode::BAD_REQUEST, "validation_error", msg)
            }
            ApiError::ConfirmationMismatch(msg) => {
                (StatusCode::BAD_REQUEST, "confirmation_mismatch", msg)
            }
            ApiError::NotEligible(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "not_eligible", msg),
            ApiError::ConfigRejected(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "config_rejected", msg)
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(msg) => ApiError::Validation(msg),
            EngineError::NotFound(msg) => ApiError::NotFound(msg),
            EngineError::Conflict(msg) | EngineError::CascadeBlocked(msg) => ApiError::Conflict(msg),
            e @ EngineError::NoItemAvailable(_) => ApiError::NoItemAvailable(e.to_string()),
            EngineError::NotEligible(msg) => ApiError::NotEligible(msg),
            EngineError::Capacity(decision) => ApiError::EnrollmentClosed(
                match decision {
                    EnrollmentDecision::Full => "Enrollment is full",
                    EnrollmentDecision::Disabled => "Enrollment is disabled",
                    EnrollmentDecision::Allowed => "Enrollment is open",
                }
                .into(),
            ),
            EngineError::Config(msg) => ApiError::ConfigRejected(msg),
            e @ EngineError::ConfirmationMismatch => ApiError::ConfirmationMismatch(e.to_string()),
            EngineError::Storage(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field)),
                })
            })
            .collect();

        let message = if details.len() == 1 {
            details[0].message.clone()
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::InvalidFields(message, details)
    }
}
