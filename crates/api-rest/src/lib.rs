//! REST API for PeerRank
//!
//! Axum adapter mapping HTTP requests onto the core services. The core does
//! not depend on this crate; everything transport-shaped (status codes,
//! payload framing, middleware) lives here.

pub mod app;
pub mod config;
pub mod error;
pub mod extractors;
pub mod responses;
pub mod routes;
pub mod state;

pub use app::create_app;
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
