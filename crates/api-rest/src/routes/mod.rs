//! Route modules.

pub mod events;
pub mod health;
pub mod voting;

use crate::state::AppState;
use axum::Router;

/// Assemble the `/api/v1` router.
pub fn v1() -> Router<AppState> {
    Router::new().merge(events::routes()).merge(voting::routes())
}
