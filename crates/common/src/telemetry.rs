//! Telemetry and observability setup.
//!
//! Structured logging via `tracing`, with the filter taken from
//! `RUST_LOG` when set.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Initialize the tracing subscriber.
///
/// `log_level` is the fallback filter when `RUST_LOG` is not set;
/// `json_format` switches the output between human-readable and JSON lines.
pub fn init_tracing(log_level: &str, json_format: bool) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = Registry::default().with(env_filter);

    if json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("Failed to initialize tracing subscriber")?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .context("Failed to initialize tracing subscriber")?;
    }

    Ok(())
}
