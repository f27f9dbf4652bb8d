//! Pool ingestion: single adds and bulk uploads.
//!
//! Parsing is pure and line-numbered. Row failures are collected in the
//! `UploadResult`; only an oversized file rejects the whole upload.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use shared::validation::{
    normalize_gift_card_code, validate_gift_card_code, validate_http_url, GIFT_CARD_CODE_FORMAT,
};

use crate::error::{EngineError, EngineResult};
use crate::models::gift_card::{GiftCard, NewGiftCard, DEFAULT_REDEMPTION_URL};
use crate::models::pool::PoolItemStatus;
use crate::models::survey_link::{NewSurveyLink, SurveyLink};
use crate::models::upload::{
    GiftCardUploadRequest, LinkUploadRequest, UploadResult, UploadRowError,
};
use crate::store::AllocationStore;

/// Default cap on non-blank lines per uploaded file.
pub const DEFAULT_MAX_UPLOAD_LINES: usize = 10_000;

const LINK_FORMAT: &str = "http(s) URL";
const CODE_HEADERS: [&str; 3] = ["CODE", "CARD_CODE", "GIFT_CARD_CODE"];

/// One non-skipped line of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    /// 1-based line number in the original file.
    pub line: usize,
    pub value: String,
}

/// Extracts survey URLs: trims lines and skips blanks and `#` comments.
pub fn parse_link_file(content: &str) -> Vec<ParsedRow> {
    content
        .lines()
        .enumerate()
        .map(|(i, raw)| (i + 1, raw.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line, value)| ParsedRow {
            line,
            value: value.to_string(),
        })
        .collect()
}

/// Extracts gift card codes from the first CSV column, normalized to
/// uppercase. A header row naming the code column is skipped.
pub fn parse_gift_card_file(content: &str) -> Vec<ParsedRow> {
    let mut rows = Vec::new();
    for (i, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let first_column = line.split(',').next().unwrap_or_default();
        let code = normalize_gift_card_code(first_column);
        if code.is_empty() {
            continue;
        }
        if rows.is_empty() && CODE_HEADERS.contains(&code.as_str()) {
            continue;
        }

        rows.push(ParsedRow {
            line: i + 1,
            value: code,
        });
    }
    rows
}

#[derive(Clone)]
pub struct IngestionService {
    store: Arc<dyn AllocationStore>,
    max_upload_lines: usize,
    default_redemption_url: String,
}

impl IngestionService {
    pub fn new(store: Arc<dyn AllocationStore>) -> Self {
        Self {
            store,
            max_upload_lines: DEFAULT_MAX_UPLOAD_LINES,
            default_redemption_url: DEFAULT_REDEMPTION_URL.to_string(),
        }
    }

    pub fn with_limits(mut self, max_upload_lines: usize, default_redemption_url: &str) -> Self {
        self.max_upload_lines = max_upload_lines;
        self.default_redemption_url = default_redemption_url.to_string();
        self
    }

    fn check_size(&self, rows: usize) -> EngineResult<()> {
        if rows > self.max_upload_lines {
            return Err(EngineError::Validation(format!(
                "Upload has {} rows; the limit is {}",
                rows, self.max_upload_lines
            )));
        }
        Ok(())
    }

    pub async fn add_link(&self, link: NewSurveyLink, acted_by: &str) -> EngineResult<SurveyLink> {
        let link = NewSurveyLink {
            long_url: link.long_url.trim().to_string(),
            short_url: link
                .short_url
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
            batch_label: link.batch_label,
        };
        link.validate()?;

        let created = self.store.insert_link(link, acted_by).await?;
        info!(link_id = %created.id, uploaded_by = %acted_by, "Survey link added");
        Ok(created)
    }

    pub async fn add_gift_card(&self, card: NewGiftCard, acted_by: &str) -> EngineResult<GiftCard> {
        let card = card.normalized(&self.default_redemption_url);
        card.validate()?;

        let created = self.store.insert_gift_card(card, acted_by).await?;
        info!(gift_card_id = %created.id, uploaded_by = %acted_by, "Gift card added");
        Ok(created)
    }

    pub async fn upload_links(
        &self,
        request: LinkUploadRequest,
        acted_by: &str,
    ) -> EngineResult<UploadResult> {
        let rows = parse_link_file(&request.content);
        self.check_size(rows.len())?;

        let mut result = UploadResult::default();
        let mut seen = HashSet::new();

        for row in rows {
            if validate_http_url(&row.value).is_err() {
                result.record_failure(UploadRowError::invalid_format(row.line, &row.value, LINK_FORMAT));
                continue;
            }
            if !seen.insert(row.value.clone()) {
                result.record_failure(UploadRowError::duplicate(row.line, &row.value));
                continue;
            }

            let link = NewSurveyLink {
                long_url: row.value.clone(),
                short_url: None,
                batch_label: request.batch_label.clone(),
            };
            match self.store.insert_link(link, acted_by).await {
                Ok(_) => result.record_success(),
                Err(EngineError::Conflict(_)) => {
                    result.record_failure(UploadRowError::duplicate(row.line, &row.value))
                }
                Err(e) => {
                    warn!(line = row.line, error = %e, "Survey link row could not be stored");
                    result.record_failure(UploadRowError::storage_error(row.line, &row.value))
                }
            }
        }

        info!(
            total_rows = result.total_rows,
            successful = result.successful_uploads,
            failed = result.failed_uploads,
            uploaded_by = %acted_by,
            "Survey link upload processed"
        );
        Ok(result)
    }

    pub async fn upload_gift_cards(
        &self,
        request: GiftCardUploadRequest,
        acted_by: &str,
    ) -> EngineResult<UploadResult> {
        let rows = parse_gift_card_file(&request.content);
        self.check_size(rows.len())?;

        // Shared metadata is validated once, against a placeholder code.
        let template = NewGiftCard {
            card_code: "AAAA-AAAAAA-AAAA".into(),
            card_type: request.card_type,
            card_value_cents: request.card_value_cents,
            redemption_url: request.redemption_url.clone(),
            instructions: request.instructions.clone(),
            batch_label: request.batch_label.clone(),
            expires_at: request.expires_at,
        }
        .normalized(&self.default_redemption_url);
        template.validate()?;

        let mut result = UploadResult::default();
        let mut seen = HashSet::new();

        for row in rows {
            if validate_gift_card_code(&row.value).is_err() {
                result.record_failure(UploadRowError::invalid_format(
                    row.line,
                    &row.value,
                    GIFT_CARD_CODE_FORMAT,
                ));
                continue;
            }
            if !seen.insert(row.value.clone()) {
                result.record_failure(UploadRowError::duplicate(row.line, &row.value));
                continue;
            }

            let card = NewGiftCard {
                card_code: row.value.clone(),
                ..template.clone()
            };
            match self.store.insert_gift_card(card, acted_by).await {
                Ok(_) => result.record_success(),
                Err(EngineError::Conflict(_)) => {
                    result.record_failure(UploadRowError::duplicate(row.line, &row.value))
                }
                Err(e) => {
                    warn!(line = row.line, error = %e, "Gift card row could not be stored");
                    result.record_failure(UploadRowError::storage_error(row.line, &row.value))
                }
            }
        }

        info!(
            total_rows = result.total_rows,
            successful = result.successful_uploads,
            failed = result.failed_uploads,
            uploaded_by = %acted_by,
            "Gift card upload processed"
        );
        Ok(result)
    }

    /// Edits the code of an AVAILABLE card.
    pub async fn update_gift_card_code(&self, id: Uuid, card_code: &str) -> EngineResult<GiftCard> {
        let code = normalize_gift_card_code(card_code);
        validate_gift_card_code(&code).map_err(|_| {
            EngineError::Validation(format!(
                "Invalid code format: {}. Expected format: {}",
                code, GIFT_CARD_CODE_FORMAT
            ))
        })?;
        self.store.update_gift_card_code(id, &code).await
    }

    /// Marks an AVAILABLE card EXPIRED.
    pub async fn expire_gift_card(&self, id: Uuid) -> EngineResult<GiftCard> {
        self.store.retire_gift_card(id, PoolItemStatus::Expired).await
    }

    /// Marks an AVAILABLE card INVALID.
    pub async fn invalidate_gift_card(&self, id: Uuid) -> EngineResult<GiftCard> {
        self.store.retire_gift_card(id, PoolItemStatus::Invalid).await
    }
}
