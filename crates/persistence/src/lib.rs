//! Persistence layer for the survey rewards backend.
//!
//! This crate contains:
//! - Database connection management and migrations
//! - Entity definitions (database row mappings)
//! - Repository implementations
//! - `PgAllocationStore`, the PostgreSQL implementation of the engine store

pub mod db;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod repositories;
pub mod store;

pub use store::PgAllocationStore;
