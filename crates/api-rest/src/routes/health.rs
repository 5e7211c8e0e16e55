//! Health endpoints.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

/// Health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(liveness))
        .route("/health/ready", get(readiness))
}

/// Process liveness; always succeeds while the server runs.
async fn liveness() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

/// Readiness including a database round trip.
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthBody>) {
    match state.db.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthBody { status: "ok" })),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthBody {
                status: "degraded",
            }),
        ),
    }
}
