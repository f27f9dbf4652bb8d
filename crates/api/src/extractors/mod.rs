//! Custom Axum extractors.

pub mod acted_by;

pub use acted_by::{ActedBy, ACTED_BY_HEADER};
