//! Shared utilities for the PeerRank platform.
//!
//! - `telemetry` - tracing/logging initialization
//! - `pagination` - bounded pagination parameters for list operations

pub mod pagination;
pub mod telemetry;

pub use pagination::{PaginatedResult, PaginationParams};
