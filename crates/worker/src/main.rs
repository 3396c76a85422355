//! Slotbook Worker - Background notification processor
//!
//! Standalone binary running the outbox relay, dispatcher, and requeue
//! janitor against the shared database.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use worker::{Config, run_worker};

#[tokio::main]
async fn main() -> Result<()> {
    slotbook_shared::init_env();
    let _guard = slotbook_shared::init_tracing("worker");

    let config = Config::from_env()?;
    let pool = slotbook_shared::init_db(&config.core).await?;

    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations completed");

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            token.cancel();
        }
    });

    run_worker(pool, config, Some(shutdown)).await
}
