//! Shared configuration logic
//!
//! Handles loading of common environment variables.

use anyhow::{Context, Result};
use std::env;

/// Common configuration used across services
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Database connection URL
    pub database_url: String,

    /// Grid quantum for appointment slots, in minutes
    pub slot_duration_minutes: i64,
}

impl CoreConfig {
    /// Load common configuration from environment variables
    ///
    /// This will also initialize dotenv if it hasn't been done yet.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_duration_conversion() {
        let cfg = CoreConfig {
            database_url: "postgres://localhost".to_string(),
            slot_duration_minutes: 30,
        };
        assert_eq!(cfg.slot_duration(), chrono::Duration::minutes(30));
    }
}
