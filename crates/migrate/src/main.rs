//! Schema migration CLI.
//!
//! Applies the embedded migrations in order, or rolls back the most recent
//! one with `--rollback`. Exits 0 on success, non-zero otherwise.

use anyhow::Result;
use clap::Parser;
use peerrank_common::telemetry;
use peerrank_infrastructure::{migrations, DatabaseConfig, DatabasePool};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "peerrank-migrate")]
#[command(about = "Apply or roll back the PeerRank database schema")]
struct Cli {
    /// Roll back the most recently applied migration instead of migrating up
    #[arg(long)]
    rollback: bool,

    /// Fallback log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(&cli.log_level, false)?;

    let config = DatabaseConfig::from_env()?;
    let db = DatabasePool::connect(&config).await?;

    let outcome = if cli.rollback {
        info!("rolling back the last migration");
        migrations::rollback(db.pool()).await
    } else {
        info!("applying pending migrations");
        migrations::run(db.pool()).await
    };

    if let Err(err) = outcome {
        error!(%err, "migration failed");
        std::process::exit(1);
    }

    info!("migration process completed");
    Ok(())
}
