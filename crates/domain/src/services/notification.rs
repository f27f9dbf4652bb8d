//! Notification dispatch for claimed links and gift cards.
//!
//! The engine only consumes this boundary: a dispatcher reports a status
//! string (`queued`, `sent`, `delivered`, `failed`) that the ledger stores
//! verbatim. A failed dispatch never releases the claimed item.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::assignment::DeliveryMethod;

pub const STATUS_QUEUED: &str = "queued";
pub const STATUS_SENT: &str = "sent";
pub const STATUS_DELIVERED: &str = "delivered";
pub const STATUS_FAILED: &str = "failed";

/// Statuses a dispatcher may report.
pub const DISPATCH_STATUSES: [&str; 4] = [STATUS_QUEUED, STATUS_SENT, STATUS_DELIVERED, STATUS_FAILED];

/// Custom validator for reported dispatcher statuses.
pub fn validate_dispatch_status(status: &str) -> Result<(), validator::ValidationError> {
    if DISPATCH_STATUSES.contains(&status) {
        Ok(())
    } else {
        let mut error = validator::ValidationError::new("dispatch_status");
        error.message = Some("Status must be one of queued, sent, delivered, failed".into());
        Err(error)
    }
}

/// Where a message goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Recipient {
    pub participant_id: Uuid,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// What is being delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchContent {
    SurveyLink {
        invitation_id: Uuid,
        url: String,
    },
    GiftCard {
        assignment_id: Uuid,
        card_code: String,
        redemption_url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        instructions: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        card_value_cents: Option<i64>,
    },
}

/// One message to dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DispatchRequest {
    pub recipient: Recipient,
    pub delivery_method: DeliveryMethod,
    pub content: DispatchContent,
}

/// Sends links and gift cards to participants.
#[async_trait::async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Dispatches the message and returns the provider status string.
    async fn dispatch(&self, request: &DispatchRequest) -> String;
}

/// Mock dispatcher for development and testing.
///
/// Logs messages but doesn't actually send them.
#[derive(Debug, Clone, Default)]
pub struct MockNotificationDispatcher {
    /// Whether to simulate failures for testing.
    pub simulate_failure: bool,
}

impl MockNotificationDispatcher {
    pub fn new() -> Self {
        Self {
            simulate_failure: false,
        }
    }

    /// Create a mock dispatcher that reports every send as failed.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
        }
    }
}

#[async_trait::async_trait]
impl NotificationDispatcher for MockNotificationDispatcher {
    async fn dispatch(&self, request: &DispatchRequest) -> String {
        if self.simulate_failure {
            tracing::warn!(
                participant_id = %request.recipient.participant_id,
                delivery_method = %request.delivery_method,
                "Mock dispatcher simulating failure"
            );
            return STATUS_FAILED.to_string();
        }

        match &request.content {
            DispatchContent::SurveyLink { invitation_id, .. } => tracing::info!(
                participant_id = %request.recipient.participant_id,
                invitation_id = %invitation_id,
                delivery_method = %request.delivery_method,
                "Mock: Would send survey link"
            ),
            DispatchContent::GiftCard { assignment_id, .. } => tracing::info!(
                participant_id = %request.recipient.participant_id,
                assignment_id = %assignment_id,
                delivery_method = %request.delivery_method,
                "Mock: Would send gift card"
            ),
        }

        STATUS_SENT.to_string()
    }
}
