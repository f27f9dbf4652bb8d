//! Enrollment capacity configuration and gate decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Actor recorded on the default configuration.
pub const SYSTEM_ACTOR: &str = "SYSTEM";

/// Outcome of consulting the enrollment gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentDecision {
    Allowed,
    Full,
    Disabled,
}

impl EnrollmentDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentDecision::Allowed => "ALLOWED",
            EnrollmentDecision::Full => "FULL",
            EnrollmentDecision::Disabled => "DISABLED",
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, EnrollmentDecision::Allowed)
    }
}

impl std::fmt::Display for EnrollmentDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display status of enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Disabled,
    Full,
    Open,
    Unlimited,
}

/// Singleton enrollment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EnrollmentConfig {
    /// `None` means unlimited.
    pub max_participants: Option<i32>,
    pub is_enrollment_active: bool,
    pub current_count: i32,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            max_participants: None,
            is_enrollment_active: true,
            current_count: 0,
            updated_by: SYSTEM_ACTOR.to_string(),
            updated_at: Utc::now(),
        }
    }
}

impl EnrollmentConfig {
    pub fn decision(&self) -> EnrollmentDecision {
        if !self.is_enrollment_active {
            return EnrollmentDecision::Disabled;
        }
        match self.max_participants {
            Some(max) if self.current_count >= max => EnrollmentDecision::Full,
            _ => EnrollmentDecision::Allowed,
        }
    }

    /// Remaining places, or `-1` when unlimited.
    pub fn remaining_spots(&self) -> i32 {
        self.max_participants
            .map(|max| (max - self.current_count).max(0))
            .unwrap_or(-1)
    }

    pub fn status(&self) -> EnrollmentStatus {
        match (self.decision(), self.max_participants) {
            (EnrollmentDecision::Disabled, _) => EnrollmentStatus::Disabled,
            (EnrollmentDecision::Full, _) => EnrollmentStatus::Full,
            (EnrollmentDecision::Allowed, None) => EnrollmentStatus::Unlimited,
            (EnrollmentDecision::Allowed, Some(_)) => EnrollmentStatus::Open,
        }
    }

    /// Checks that `max_participants` can be applied without dropping below the current count.
    pub fn check_new_limit(&self, max_participants: Option<i32>) -> Result<(), String> {
        match max_participants {
            Some(max) if max < self.current_count => Err(format!(
                "Cannot set maximum participants to {}. Current enrollment is {}.",
                max, self.current_count
            )),
            _ => Ok(()),
        }
    }
}

/// Enrollment status view returned to admins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EnrollmentStatusView {
    pub max_participants: Option<i32>,
    pub current_count: i32,
    pub is_enrollment_active: bool,
    pub remaining_spots: i32,
    pub status: EnrollmentStatus,
    pub updated_by: String,
    pub updated_at: DateTime<Utc>,
}

impl From<EnrollmentConfig> for EnrollmentStatusView {
    fn from(config: EnrollmentConfig) -> Self {
        Self {
            remaining_spots: config.remaining_spots(),
            status: config.status(),
            max_participants: config.max_participants,
            current_count: config.current_count,
            is_enrollment_active: config.is_enrollment_active,
            updated_by: config.updated_by,
            updated_at: config.updated_at,
        }
    }
}

/// Request to update the enrollment configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdateEnrollmentRequest {
    #[validate(range(min = 0, message = "max_participants cannot be negative"))]
    pub max_participants: Option<i32>,
    pub is_enrollment_active: bool,
}
