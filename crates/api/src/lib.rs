//! Survey rewards HTTP service: enrollment, pool management, allocation and
//! reversal endpoints over a shared `AllocationStore`.

pub mod app;
pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod routes;
