//! Enrolled participants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A participant admitted through the enrollment gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Participant {
    pub id: Uuid,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consented_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A participant who completed the survey and holds no active gift card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EligibleParticipant {
    pub participant_id: Uuid,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub invitation_id: Uuid,
    pub completed_at: DateTime<Utc>,
}

/// Registration request for a new participant.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct NewParticipant {
    #[validate(custom(function = "shared::validation::validate_phone"))]
    pub phone: String,
    #[validate(email(message = "Invalid email address"))]
    #[validate(length(max = 255, message = "Email must be at most 255 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consented_at: Option<DateTime<Utc>>,
}

impl NewParticipant {
    /// Trims contact fields and drops an empty email.
    pub fn normalized(mut self) -> Self {
        self.phone = self.phone.trim().to_string();
        self.email = self
            .email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        self
    }
}

/// Query parameters for listing participants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ListParticipantsQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Case-insensitive match on phone or email.
    pub search: Option<String>,
}

impl ListParticipantsQuery {
    pub fn page_params(&self) -> shared::pagination::PageParams {
        shared::pagination::PageParams {
            page: self.page,
            per_page: self.per_page,
        }
    }

    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}
