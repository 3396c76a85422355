//! Configuration for the notification worker
//!
//! Loads configuration from environment variables; defaults match the
//! documented knobs.

use anyhow::{Context, Result};
use slotbook_core::config::CoreConfig;
use std::env;

/// Worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared configuration (database, slot grid)
    pub core: CoreConfig,

    /// Base URL of the notification provider HTTP endpoint
    pub notif_http_base_url: String,

    /// Bearer key for the notification provider
    pub notif_http_api_key: String,

    /// Recipient used when an appointment's contact cannot be resolved
    pub notif_placeholder_recipient: String,

    /// Consecutive failures that open the circuit breaker
    pub circuit_fail_max: u32,

    /// Cool-down before the breaker admits a half-open probe
    pub circuit_reset_seconds: u64,

    /// Bounded retries per dispatch invocation
    pub retry_max_attempts: u32,

    /// Exponential backoff base, seconds
    pub retry_backoff_base: f64,

    /// Exponential backoff ceiling, seconds
    pub retry_backoff_max: f64,

    /// Age beyond which a QUEUED row is considered stuck, seconds
    pub requeue_stale_seconds: i64,

    /// Total attempts ceiling above which a FAILED row stays inert
    pub failed_max_attempts: i16,

    /// Outbox rows drained per relay tick
    pub outbox_batch_size: i64,

    /// Relay tick interval, seconds
    pub outbox_poll_interval_secs: u64,

    /// Requeue janitor tick interval, seconds
    pub requeue_poll_interval_secs: u64,
}

fn env_or<T: std::str::FromStr>(name: &str, default: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("{} must be a valid value", name))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            core: CoreConfig::from_env()?,
            notif_http_base_url: env::var("NOTIF_HTTP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:9000".to_string()),
            notif_http_api_key: env::var("NOTIF_HTTP_API_KEY").unwrap_or_default(),
            notif_placeholder_recipient: env::var("NOTIF_PLACEHOLDER_RECIPIENT")
                .unwrap_or_else(|_| "+5500000000000".to_string()),
            circuit_fail_max: env_or("NOTIF_CIRCUIT_FAIL_MAX", "5")?,
            circuit_reset_seconds: env_or("NOTIF_CIRCUIT_RESET_SECONDS", "60")?,
            retry_max_attempts: env_or("NOTIF_RETRY_MAX_ATTEMPTS", "5")?,
            retry_backoff_base: env_or("NOTIF_RETRY_BACKOFF_BASE", "1.0")?,
            retry_backoff_max: env_or("NOTIF_RETRY_BACKOFF_MAX", "16.0")?,
            requeue_stale_seconds: env_or("NOTIF_REQUEUE_STALE_SECONDS", "120")?,
            failed_max_attempts: env_or("NOTIF_FAILED_MAX_ATTEMPTS", "5")?,
            outbox_batch_size: env_or("OUTBOX_BATCH_SIZE", "50")?,
            outbox_poll_interval_secs: env_or("OUTBOX_POLL_INTERVAL_SECONDS", "10")?,
            requeue_poll_interval_secs: env_or("REQUEUE_POLL_INTERVAL_SECONDS", "60")?,
        })
    }
}

#[cfg(test)]
pub(crate) fn test_config(base_url: &str) -> Config {
    Config {
        core: CoreConfig {
            database_url: "postgres://localhost".to_string(),
            slot_duration_minutes: 30,
        },
        notif_http_base_url: base_url.to_string(),
        notif_http_api_key: "test-key".to_string(),
        notif_placeholder_recipient: "+5500000000000".to_string(),
        circuit_fail_max: 5,
        circuit_reset_seconds: 60,
        retry_max_attempts: 2,
        retry_backoff_base: 0.01,
        retry_backoff_max: 0.02,
        requeue_stale_seconds: 120,
        failed_max_attempts: 5,
        outbox_batch_size: 50,
        outbox_poll_interval_secs: 10,
        requeue_poll_interval_secs: 60,
    }
}
