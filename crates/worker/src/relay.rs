//! Outbox relay
//!
//! Periodically drains unpublished outbox events into notification rows.
//! Each batch is one transaction: either every message row is created and
//! every event stamped published, or none are. Submission to the dispatcher
//! happens only after the commit, with a short delay to absorb visibility
//! races.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use slotbook_core::models::{EVENT_APPT_CANCELED, EVENT_APPT_CREATED};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::dispatcher::DispatcherHandle;

/// Delay between commit and dispatcher submission
const SUBMIT_DELAY: Duration = Duration::from_secs(1);

/// Resolves the notification contact for an appointment
///
/// The production implementation joins to the booking user's stored phone;
/// `None` falls back to the configured placeholder recipient.
#[async_trait]
pub trait RecipientResolver: Send + Sync {
    async fn resolve(&self, appointment_id: Uuid) -> Option<String>;
}

/// Database-backed recipient resolution
pub struct DbRecipientResolver {
    pool: PgPool,
}

impl DbRecipientResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipientResolver for DbRecipientResolver {
    async fn resolve(&self, appointment_id: Uuid) -> Option<String> {
        match db::resolve_phone(&self.pool, appointment_id).await {
            Ok(phone) => phone,
            Err(e) => {
                error!("recipient lookup failed for {}: {}", appointment_id, e);
                None
            }
        }
    }
}

/// Run the relay until shutdown
pub async fn run_relay(
    pool: PgPool,
    config: Arc<Config>,
    resolver: Arc<dyn RecipientResolver>,
    handle: DispatcherHandle,
    shutdown: CancellationToken,
) {
    let mut interval =
        tokio::time::interval(Duration::from_secs(config.outbox_poll_interval_secs));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        match relay_batch(&pool, &config, resolver.as_ref()).await {
            Ok(new_ids) => {
                if !new_ids.is_empty() {
                    info!("relayed {} outbox events", new_ids.len());
                }
                for id in new_ids {
                    handle.submit_after(id, SUBMIT_DELAY);
                }
            }
            // Nothing was committed; the next tick retries the whole batch.
            Err(e) => error!("outbox relay batch failed: {}", e),
        }
    }

    info!("outbox relay stopped");
}

/// Drain one batch of unpublished events, returning the ids of the
/// notification rows it created
pub async fn relay_batch(
    pool: &PgPool,
    config: &Config,
    resolver: &dyn RecipientResolver,
) -> Result<Vec<i64>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let events = db::pull_unpublished_tx(&mut tx, config.outbox_batch_size).await?;
    if events.is_empty() {
        return Ok(Vec::new());
    }

    let now = Utc::now();
    let mut new_ids = Vec::new();

    for event in events {
        match event.event_type.as_str() {
            EVENT_APPT_CREATED | EVENT_APPT_CANCELED => {
                let recipient = resolver
                    .resolve(event.aggregate_id)
                    .await
                    .unwrap_or_else(|| config.notif_placeholder_recipient.clone());

                let message_id = db::insert_queued_tx(
                    &mut tx,
                    "whatsapp",
                    &recipient,
                    &event.event_type.to_lowercase(),
                    event.payload.clone(),
                    Some(event.aggregate_id),
                )
                .await?;
                new_ids.push(message_id);
            }
            other => {
                // Recorded as published but generates no message.
                debug!("skipping outbox event type {}", other);
            }
        }

        db::mark_published_tx(&mut tx, event.id, now).await?;
    }

    tx.commit().await?;

    Ok(new_ids)
}
