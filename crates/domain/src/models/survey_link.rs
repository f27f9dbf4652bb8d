//! Survey link pool items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::pool::PoolItemStatus;

/// A survey link in the link pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SurveyLink {
    pub id: Uuid,
    pub long_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_url: Option<String>,
    pub status: PoolItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_label: Option<String>,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
}

impl SurveyLink {
    /// The URL sent to participants: the short form when one exists.
    pub fn delivery_url(&self) -> &str {
        self.short_url.as_deref().unwrap_or(&self.long_url)
    }
}

/// Request to add a single survey link.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct NewSurveyLink {
    #[validate(custom(function = "shared::validation::validate_http_url"))]
    pub long_url: String,
    #[validate(custom(function = "shared::validation::validate_http_url"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_url: Option<String>,
    #[validate(length(max = 100, message = "batch_label cannot exceed 100 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_label: Option<String>,
}
