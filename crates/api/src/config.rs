//! Server configuration from environment variables

use anyhow::{Context, Result};
use std::env;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: String,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub secret_key: String,
    pub access_token_expires_min: i64,
    pub refresh_token_expires_days: i64,
    pub cors_allowed_origin: String,
    pub slot_duration_minutes: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            app_env: env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string()),
            host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("Failed to parse API_PORT as u16")?,
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL environment variable not set")?,
            secret_key: env::var("SECRET_KEY").context("SECRET_KEY environment variable not set")?,
            access_token_expires_min: env::var("ACCESS_TOKEN_EXPIRES_MIN")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("ACCESS_TOKEN_EXPIRES_MIN must be a valid integer")?,
            refresh_token_expires_days: env::var("REFRESH_TOKEN_EXPIRES_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("REFRESH_TOKEN_EXPIRES_DAYS must be a valid integer")?,
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            slot_duration_minutes: env::var("SLOT_DURATION_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("SLOT_DURATION_MINUTES must be a valid integer")?,
        })
    }

    /// Slot duration as a chrono duration
    pub fn slot_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.slot_duration_minutes)
    }
}
