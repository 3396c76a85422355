//! Slotbook API Server
//!
//! Axum-based web server providing:
//! - Authentication (signup/login/refresh/logout)
//! - Provider and work-hour management
//! - Availability lookup and appointment booking

use anyhow::Result;
use api::{AppState, config::Config, run_api};
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,api=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Slotbook API server");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        "Server configuration loaded: {}:{}",
        config.host,
        config.port
    );

    // Create database connection pool
    let pool = PgPool::connect(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations completed");

    let state = AppState::new(pool, config.clone());
    run_api(state, &config).await?;

    Ok(())
}
