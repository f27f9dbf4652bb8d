//! Engine error taxonomy.

use thiserror::Error;

use crate::models::enrollment::EnrollmentDecision;
use crate::models::pool::PoolKind;

/// Errors returned by engine services and stores.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("No {0} available in pool")]
    NoItemAvailable(PoolKind),

    #[error("Not eligible: {0}")]
    NotEligible(String),

    #[error("Enrollment closed: {0}")]
    Capacity(EnrollmentDecision),

    #[error("Configuration rejected: {0}")]
    Config(String),

    #[error("Confirmation phrase does not match")]
    ConfirmationMismatch,

    #[error("Cascade blocked: {0}")]
    CascadeBlocked(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    e.message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field))
                })
            })
            .collect();

        EngineError::Validation(messages.join("; "))
    }
}
