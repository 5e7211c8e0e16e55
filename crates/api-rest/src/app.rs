//! Application builder: routes, middleware, and documentation assembled
//! into the Axum router.

use crate::{config::ApiConfig, routes, state::AppState};
use axum::Router;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Build the router over an already-initialized state.
pub fn create_app(state: AppState, config: &ApiConfig) -> Router {
    let mut app = Router::new()
        .merge(routes::health::routes())
        .nest("/api/v1", routes::v1())
        .with_state(state);

    if config.enable_swagger {
        app = app.merge(swagger_ui());
    }

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.request_timeout_seconds,
            ))),
    )
}

fn swagger_ui() -> SwaggerUi {
    #[derive(OpenApi)]
    #[openapi(
        info(
            title = "PeerRank API",
            version = "1.0.0",
            description = "Distributed peer-evaluation voting over partial rankings",
            license(name = "MIT"),
        ),
        servers(
            (url = "/api/v1", description = "API v1")
        ),
        tags(
            (name = "events", description = "Event lifecycle and registration"),
            (name = "proposals", description = "Proposal metadata"),
            (name = "voting", description = "Assignments, ballots, and results"),
        )
    )]
    struct ApiDoc;

    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
