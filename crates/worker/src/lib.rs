//! Slotbook Worker - Notification pipeline
//!
//! Runs the three background services of the booking system: the outbox
//! relay, the notification dispatcher (retry + circuit breaker), and the
//! stuck-message janitor.

mod breaker;
mod config;
mod db;
mod dispatcher;
mod relay;
mod requeue;
mod sender;

pub use breaker::CircuitBreaker;
pub use config::Config;
pub use dispatcher::DispatcherHandle;
pub use relay::{DbRecipientResolver, RecipientResolver};
pub use sender::{NotificationClient, SendError};

use anyhow::Result;
use dispatcher::DispatchContext;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Capacity of the dispatcher hand-off queue
const DISPATCH_QUEUE_CAPACITY: usize = 1024;

/// Run the background worker services
///
/// This function runs the relay, dispatcher, and requeue janitor until
/// cancelled. In-flight work finishes before it returns.
///
/// # Arguments
/// * `pool` - Database connection pool
/// * `config` - Worker configuration
/// * `shutdown` - Optional cancellation token for graceful shutdown
pub async fn run_worker(
    pool: PgPool,
    config: Config,
    shutdown: Option<CancellationToken>,
) -> Result<()> {
    let shutdown = shutdown.unwrap_or_default();
    let config = Arc::new(config);

    let client = NotificationClient::new(&config)?;
    let breaker = Arc::new(CircuitBreaker::new(
        config.circuit_fail_max,
        Duration::from_secs(config.circuit_reset_seconds),
    ));
    let resolver: Arc<dyn RecipientResolver> = Arc::new(DbRecipientResolver::new(pool.clone()));

    let (tx, rx) = mpsc::channel(DISPATCH_QUEUE_CAPACITY);
    let handle = DispatcherHandle::new(tx);

    info!(
        "Starting worker: outbox_poll={}s, requeue_poll={}s, batch_size={}, retry_max={}, circuit_fail_max={}",
        config.outbox_poll_interval_secs,
        config.requeue_poll_interval_secs,
        config.outbox_batch_size,
        config.retry_max_attempts,
        config.circuit_fail_max,
    );

    let ctx = DispatchContext {
        pool: pool.clone(),
        client,
        breaker,
        config: config.clone(),
        handle: handle.clone(),
    };

    let dispatcher_task = tokio::spawn(dispatcher::run_dispatch_loop(ctx, rx, shutdown.clone()));
    let relay_task = tokio::spawn(relay::run_relay(
        pool.clone(),
        config.clone(),
        resolver,
        handle.clone(),
        shutdown.clone(),
    ));
    let requeue_task = tokio::spawn(requeue::run_requeuer(pool, config, handle, shutdown));

    let _ = tokio::join!(relay_task, requeue_task, dispatcher_task);

    info!("Worker shutdown complete");
    Ok(())
}
