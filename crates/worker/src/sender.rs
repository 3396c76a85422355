//! HTTP client for the external notification provider
//!
//! The provider accepts `POST {base}/whatsapp/send` with a bearer key.
//! 2xx is success, 429 and 5xx are retryable, any other 4xx is a permanent
//! rejection.

use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Delivery errors, classified by how the dispatcher should react
#[derive(Error, Debug)]
pub enum SendError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned retryable status {status}")]
    UpstreamRetryable { status: u16 },

    #[error("provider rejected ({status}): {body}")]
    UpstreamRejected { status: u16, body: String },

    #[error("circuit open")]
    CircuitOpen,

    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl SendError {
    /// Whether another attempt within the same dispatch may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SendError::Transport(_)
                | SendError::UpstreamRetryable { .. }
                | SendError::CircuitOpen
        )
    }
}

/// Client for the notification provider with pooled connections
#[derive(Clone, Debug)]
pub struct NotificationClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl NotificationClient {
    /// Build a client with the provider timeouts
    pub fn new(config: &Config) -> Result<Self, SendError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SendError::Unexpected(format!("failed to build http client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.notif_http_base_url.trim_end_matches('/').to_string(),
            api_key: config.notif_http_api_key.clone(),
        })
    }

    /// Send one message through the provider
    pub async fn send_whatsapp(
        &self,
        to: &str,
        template: &str,
        variables: &serde_json::Value,
    ) -> Result<(), SendError> {
        let url = format!("{}/whatsapp/send", self.base_url);
        let body = json!({
            "to": to,
            "template": template,
            "variables": variables,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if status.as_u16() == 429 || status.is_server_error() {
            return Err(SendError::UpstreamRetryable {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.unwrap_or_default();
        Err(SendError::UpstreamRejected {
            status: status.as_u16(),
            body,
        })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> SendError {
    if e.is_builder() {
        SendError::Unexpected(e.to_string())
    } else {
        SendError::Transport(e.to_string())
    }
}
