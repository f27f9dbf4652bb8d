//! Caller identity extractor.
//!
//! Identity is supplied by the fronting auth layer as an opaque `X-Acted-By`
//! header. The value is attributed to uploads, sends and reversals.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

pub const ACTED_BY_HEADER: &str = "X-Acted-By";

const MAX_ACTED_BY_LENGTH: usize = 255;

/// The caller a mutating request acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActedBy(pub String);

impl ActedBy {
    pub fn parse(value: Option<&str>) -> Result<Self, ApiError> {
        let value = value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Missing X-Acted-By header".to_string()))?;

        if value.chars().count() > MAX_ACTED_BY_LENGTH {
            return Err(ApiError::Unauthorized(format!(
                "X-Acted-By must be at most {} characters",
                MAX_ACTED_BY_LENGTH
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ActedBy
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACTED_BY_HEADER)
            .and_then(|v| v.to_str().ok());
        Self::parse(value)
    }
}
