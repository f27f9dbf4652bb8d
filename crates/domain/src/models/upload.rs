//! Bulk upload results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::gift_card::GiftCardType;

/// Why a row was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadErrorReason {
    Duplicate,
    InvalidFormat,
    StorageError,
}

/// A rejected upload row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UploadRowError {
    pub line: usize,
    pub value: String,
    pub reason: UploadErrorReason,
    pub message: String,
}

impl UploadRowError {
    pub fn duplicate(line: usize, value: &str) -> Self {
        Self {
            line,
            value: value.to_string(),
            reason: UploadErrorReason::Duplicate,
            message: format!("Line {}: Duplicate code: {}", line, value),
        }
    }

    pub fn invalid_format(line: usize, value: &str, expected: &str) -> Self {
        Self {
            line,
            value: value.to_string(),
            reason: UploadErrorReason::InvalidFormat,
            message: format!(
                "Line {}: Invalid code format: {}. Expected format: {}",
                line, value, expected
            ),
        }
    }

    /// The row was valid but could not be written.
    pub fn storage_error(line: usize, value: &str) -> Self {
        Self {
            line,
            value: value.to_string(),
            reason: UploadErrorReason::StorageError,
            message: format!("Line {}: Could not store {}; retry the upload", line, value),
        }
    }
}

/// Per-file upload summary. Row failures never abort the batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UploadResult {
    pub total_rows: usize,
    pub successful_uploads: usize,
    pub failed_uploads: usize,
    pub errors: Vec<UploadRowError>,
}

impl UploadResult {
    pub fn record_success(&mut self) {
        self.total_rows += 1;
        self.successful_uploads += 1;
    }

    pub fn record_failure(&mut self, error: UploadRowError) {
        self.total_rows += 1;
        self.failed_uploads += 1;
        self.errors.push(error);
    }
}

/// Body of a link upload request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LinkUploadRequest {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_label: Option<String>,
}

/// Body of a gift card upload request; metadata applies to every row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GiftCardUploadRequest {
    pub content: String,
    #[serde(default)]
    pub card_type: GiftCardType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_value_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redemption_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}
