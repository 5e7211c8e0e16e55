//! PeerRank API server binary.

use peerrank_api_rest::{create_app, ApiConfig, AppState};
use peerrank_common::telemetry;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::from_env();
    telemetry::init_tracing(&config.log_level, config.json_logs)?;

    let state = AppState::initialize(&config).await?;
    let app = create_app(state, &config);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "peerrank api listening");

    axum::serve(listener, app).await?;
    Ok(())
}
