//! Shared utilities and common types for the survey rewards backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Validation helpers for phone numbers, URLs and gift card codes
//! - Page-based pagination types

pub mod pagination;
pub mod validation;
