//! Domain layer for the survey rewards backend.
//!
//! This crate contains:
//! - Domain models (pool items, participants, invitations, assignments, audit records)
//! - The `AllocationStore` abstraction and an in-memory implementation
//! - Engine services: enrollment gate, allocation, ledger, reversal, cascade, ingestion
//! - The engine error taxonomy

pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use error::{EngineError, EngineResult};
