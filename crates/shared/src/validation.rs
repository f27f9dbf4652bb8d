//! Common validation utilities.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

/// Maximum length of a survey link URL.
pub const MAX_URL_LENGTH: usize = 2048;

/// Human-readable shape of a gift card code.
pub const GIFT_CARD_CODE_FORMAT: &str = "XXXX-XXXXXX-XXXX";

lazy_static! {
    static ref E164_REGEX: Regex = Regex::new(r"^\+[1-9][0-9]{7,14}$").unwrap();
    static ref GIFT_CARD_CODE_REGEX: Regex =
        Regex::new(r"^[A-Z0-9]{4}-[A-Z0-9]{6}-[A-Z0-9]{4}$").unwrap();
}

/// Validates that a phone number is in E.164 format (e.g. `+15551234567`).
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if E164_REGEX.is_match(phone) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone_format");
        err.message = Some("Phone number must be in E.164 format (e.g. +15551234567)".into());
        Err(err)
    }
}

/// Validates that a value is an absolute http(s) URL without whitespace.
pub fn validate_http_url(url: &str) -> Result<(), ValidationError> {
    let has_scheme = url.starts_with("https://") || url.starts_with("http://");
    let host = url.split("://").nth(1).unwrap_or("");

    if !has_scheme || host.is_empty() || url.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("url_format");
        err.message = Some("URL must be an absolute http or https address".into());
        return Err(err);
    }

    if url.len() > MAX_URL_LENGTH {
        let mut err = ValidationError::new("url_length");
        err.message = Some(format!("URL cannot exceed {} characters", MAX_URL_LENGTH).into());
        return Err(err);
    }

    Ok(())
}

/// Normalizes a gift card code: trims whitespace, strips surrounding quotes, uppercases.
pub fn normalize_gift_card_code(raw: &str) -> String {
    raw.trim().trim_matches('"').trim().to_uppercase()
}

/// Validates a normalized gift card code against the `XXXX-XXXXXX-XXXX` shape.
pub fn validate_gift_card_code(code: &str) -> Result<(), ValidationError> {
    if GIFT_CARD_CODE_REGEX.is_match(code) {
        Ok(())
    } else {
        let mut err = ValidationError::new("gift_card_code_format");
        err.message = Some(
            format!("Invalid code format. Expected format: {}", GIFT_CARD_CODE_FORMAT).into(),
        );
        Err(err)
    }
}

/// Validates that a string is not empty after trimming.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value cannot be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}
