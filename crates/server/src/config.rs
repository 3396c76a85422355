//! Unified configuration for the combined server binary

use anyhow::Result;

/// Configuration for every service the unified binary runs
#[derive(Debug, Clone)]
pub struct UnifiedConfig {
    pub api: api::config::Config,
    pub worker: worker::Config,
}

impl UnifiedConfig {
    /// Load all service configuration from the environment
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api: api::config::Config::from_env()?,
            worker: worker::Config::from_env()?,
        })
    }
}
