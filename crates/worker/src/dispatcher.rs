//! Notification dispatcher
//!
//! Consumes message ids from a bounded queue and attempts delivery through
//! the circuit breaker with bounded, jittered exponential backoff. Every
//! outcome is recorded on the notification row; rows that exhaust their
//! retries are left for the requeue janitor.

use std::sync::Arc;
use std::time::Duration;

use slotbook_core::models::{NotificationMessage, NotificationStatus};
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::breaker::CircuitBreaker;
use crate::config::Config;
use crate::db;
use crate::sender::{NotificationClient, SendError};

/// Concurrent dispatches per process
const DISPATCH_CONCURRENCY: usize = 8;

/// Bounded lookups for a just-submitted id that is not yet visible
const MSG_LOAD_ATTEMPTS: u32 = 3;
const MSG_LOAD_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Coarse delay before re-submitting after an unexpected failure
const UNEXPECTED_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Hand-off side of the dispatcher queue
#[derive(Clone, Debug)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<i64>,
}

impl DispatcherHandle {
    pub fn new(tx: mpsc::Sender<i64>) -> Self {
        Self { tx }
    }

    /// Submit a message id for delivery
    pub fn submit(&self, message_id: i64) {
        if let Err(e) = self.tx.try_send(message_id) {
            // The queue is bounded; a dropped submission is revived later by
            // the requeue janitor.
            warn!("dispatcher queue rejected message {}: {}", message_id, e);
        }
    }

    /// Submit a message id after a delay
    pub fn submit_after(&self, message_id: i64, delay: Duration) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = tx.send(message_id).await {
                warn!("delayed submission of message {} failed: {}", message_id, e);
            }
        });
    }
}

/// Everything one dispatch invocation needs
#[derive(Clone)]
pub struct DispatchContext {
    pub pool: PgPool,
    pub client: NotificationClient,
    pub breaker: Arc<CircuitBreaker>,
    pub config: Arc<Config>,
    pub handle: DispatcherHandle,
}

/// Consume the dispatcher queue until shutdown, draining in-flight work
pub async fn run_dispatch_loop(
    ctx: DispatchContext,
    mut rx: mpsc::Receiver<i64>,
    shutdown: CancellationToken,
) {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            maybe_id = rx.recv() => {
                match maybe_id {
                    Some(message_id) => {
                        if tasks.len() >= DISPATCH_CONCURRENCY {
                            let _ = tasks.join_next().await;
                        }
                        let ctx = ctx.clone();
                        tasks.spawn(async move {
                            dispatch(&ctx, message_id).await;
                        });
                    }
                    None => break,
                }
            }

            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    while tasks.join_next().await.is_some() {}
    info!("dispatcher drained");
}

/// Attempt delivery of one message and record the outcome
pub async fn dispatch(ctx: &DispatchContext, message_id: i64) {
    let Some(msg) = load_message(ctx, message_id).await else {
        warn!("message {} not found after retries, dropping", message_id);
        return;
    };

    if msg.status == NotificationStatus::Sent {
        debug!("message {} already sent, skipping", message_id);
        return;
    }

    let variables = msg
        .variables
        .clone()
        .unwrap_or_else(|| serde_json::json!({}));

    match send_with_retry(ctx, &msg, &variables).await {
        Ok(()) => {
            record(db::mark_sent(&ctx.pool, message_id).await, message_id);
            info!(
                message_id,
                channel = %msg.channel,
                template = %msg.template,
                "notification sent"
            );
        }
        Err(e @ SendError::CircuitOpen) => {
            let err = format!("circuit-open: {}", e);
            record(
                db::mark_circuit_deferred(&ctx.pool, message_id, &err).await,
                message_id,
            );
            // try again once the breaker may admit a probe
            ctx.handle.submit_after(
                message_id,
                Duration::from_secs(ctx.config.circuit_reset_seconds),
            );
        }
        Err(e @ SendError::Unexpected(_)) => {
            record(
                db::mark_failed(&ctx.pool, message_id, &e.to_string()).await,
                message_id,
            );
            ctx.handle.submit_after(message_id, UNEXPECTED_RETRY_DELAY);
        }
        Err(e) => {
            // Transport / upstream failures: the requeue janitor decides on
            // revival, permanent rejections stay failed.
            warn!(message_id, error = %e, "notification delivery failed");
            record(
                db::mark_failed(&ctx.pool, message_id, &e.to_string()).await,
                message_id,
            );
        }
    }
}

fn record(result: Result<(), sqlx::Error>, message_id: i64) {
    if let Err(e) = result {
        error!("failed to update message {}: {}", message_id, e);
    }
}

async fn load_message(ctx: &DispatchContext, message_id: i64) -> Option<NotificationMessage> {
    for attempt in 0..MSG_LOAD_ATTEMPTS {
        match db::get_message(&ctx.pool, message_id).await {
            Ok(Some(msg)) => return Some(msg),
            // Submissions race row visibility; retry briefly before dropping.
            Ok(None) => {}
            Err(e) => error!("failed to load message {}: {}", message_id, e),
        }

        if attempt + 1 < MSG_LOAD_ATTEMPTS {
            tokio::time::sleep(MSG_LOAD_RETRY_DELAY).await;
        }
    }

    None
}

async fn send_with_retry(
    ctx: &DispatchContext,
    msg: &NotificationMessage,
    variables: &serde_json::Value,
) -> Result<(), SendError> {
    let mut last_error = SendError::CircuitOpen;

    for attempt in 0..ctx.config.retry_max_attempts {
        let result = match ctx.breaker.try_acquire() {
            Err(e) => Err(e),
            Ok(()) => {
                let result = ctx
                    .client
                    .send_whatsapp(&msg.recipient, &msg.template, variables)
                    .await;
                match &result {
                    Ok(()) => ctx.breaker.record_success(),
                    Err(_) => ctx.breaker.record_failure(),
                }
                result
            }
        };

        match result {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() => {
                debug!(
                    message_id = msg.id,
                    attempt,
                    error = %e,
                    "delivery attempt failed"
                );
                last_error = e;
                if attempt + 1 < ctx.config.retry_max_attempts {
                    tokio::time::sleep(backoff_delay(
                        attempt,
                        ctx.config.retry_backoff_base,
                        ctx.config.retry_backoff_max,
                    ))
                    .await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error)
}

/// `min(base * 2^k, max)` plus uniform jitter in `[0, base)`
fn backoff_delay(attempt: u32, base: f64, max: f64) -> Duration {
    let exp = (base * 2f64.powi(attempt as i32)).min(max);
    Duration::from_secs_f64(exp + rand::random::<f64>() * base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use axum::{Router, http::StatusCode, routing::post};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_delay_bounds() {
        for attempt in 0..6 {
            let delay = backoff_delay(attempt, 1.0, 16.0).as_secs_f64();
            let exp = (1.0 * 2f64.powi(attempt as i32)).min(16.0);
            assert!(delay >= exp, "attempt {}: {} < {}", attempt, delay, exp);
            assert!(delay < exp + 1.0, "attempt {}: {} too large", attempt, delay);
        }
    }

    #[test]
    fn test_backoff_delay_caps_at_max() {
        let delay = backoff_delay(10, 1.0, 16.0).as_secs_f64();
        assert!(delay < 17.0);
    }

    async fn spawn_stub(status: StatusCode, hits: Arc<AtomicU32>) -> String {
        let app = Router::new().route(
            "/whatsapp/send",
            post(move || {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    status
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    fn test_context(pool: PgPool, base_url: &str) -> (DispatchContext, mpsc::Receiver<i64>) {
        let config = Arc::new(test_config(base_url));
        let (tx, rx) = mpsc::channel(64);
        let ctx = DispatchContext {
            pool,
            client: NotificationClient::new(&config).unwrap(),
            breaker: Arc::new(CircuitBreaker::new(
                config.circuit_fail_max,
                Duration::from_secs(config.circuit_reset_seconds),
            )),
            config,
            handle: DispatcherHandle::new(tx),
        };
        (ctx, rx)
    }

    async fn insert_queued(pool: &PgPool) -> i64 {
        sqlx::query_scalar(
            r#"
            INSERT INTO notification_messages (channel, recipient, template, variables, status)
            VALUES ('whatsapp', '+5511999990000', 'appt_created', '{}'::jsonb, 'QUEUED')
            RETURNING id
            "#,
        )
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_dispatch_success_marks_sent(pool: PgPool) {
        let hits = Arc::new(AtomicU32::new(0));
        let base = spawn_stub(StatusCode::OK, hits.clone()).await;
        let (ctx, _rx) = test_context(pool.clone(), &base);

        let id = insert_queued(&pool).await;
        dispatch(&ctx, id).await;

        let msg = db::get_message(&pool, id).await.unwrap().unwrap();
        assert_eq!(msg.status, NotificationStatus::Sent);
        assert_eq!(msg.attempts, 1);
        assert!(msg.sent_at.is_some());
        assert!(msg.sent_at.unwrap() >= msg.created_at);
        assert!(msg.last_error.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_dispatch_permanent_rejection_fails_without_retry(pool: PgPool) {
        let hits = Arc::new(AtomicU32::new(0));
        let base = spawn_stub(StatusCode::UNPROCESSABLE_ENTITY, hits.clone()).await;
        let (ctx, _rx) = test_context(pool.clone(), &base);

        let id = insert_queued(&pool).await;
        dispatch(&ctx, id).await;

        let msg = db::get_message(&pool, id).await.unwrap().unwrap();
        assert_eq!(msg.status, NotificationStatus::Failed);
        assert_eq!(msg.attempts, 1);
        assert!(msg.last_error.unwrap().contains("422"));
        // a permanent rejection never burns more than one provider call
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_dispatch_retryable_exhaustion_fails(pool: PgPool) {
        let hits = Arc::new(AtomicU32::new(0));
        let base = spawn_stub(StatusCode::INTERNAL_SERVER_ERROR, hits.clone()).await;
        let (ctx, _rx) = test_context(pool.clone(), &base);

        let id = insert_queued(&pool).await;
        dispatch(&ctx, id).await;

        let msg = db::get_message(&pool, id).await.unwrap().unwrap();
        assert_eq!(msg.status, NotificationStatus::Failed);
        assert_eq!(msg.attempts, 1);
        assert!(msg.last_error.unwrap().contains("500"));
        // retried up to the configured bound
        assert_eq!(
            hits.load(Ordering::SeqCst),
            ctx.config.retry_max_attempts
        );
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_dispatch_circuit_open_requeues(pool: PgPool) {
        let hits = Arc::new(AtomicU32::new(0));
        let base = spawn_stub(StatusCode::OK, hits.clone()).await;
        let (mut ctx, mut rx) = test_context(pool.clone(), &base);

        // resubmit immediately so the test can observe it
        let mut config = test_config(&base);
        config.circuit_reset_seconds = 0;
        ctx.config = Arc::new(config);

        // open the breaker before dispatching
        for _ in 0..ctx.config.circuit_fail_max {
            ctx.breaker.record_failure();
        }

        let id = insert_queued(&pool).await;
        dispatch(&ctx, id).await;

        let msg = db::get_message(&pool, id).await.unwrap().unwrap();
        assert_eq!(msg.status, NotificationStatus::Queued);
        assert_eq!(msg.attempts, 1);
        assert!(msg.last_error.unwrap().starts_with("circuit-open"));
        // the provider was never touched
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        // a delayed resubmission was scheduled
        drop(ctx);
        assert!(rx.recv().await.is_some());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_breaker_opens_after_consecutive_failures(pool: PgPool) {
        let hits = Arc::new(AtomicU32::new(0));
        let base = spawn_stub(StatusCode::INTERNAL_SERVER_ERROR, hits.clone()).await;
        let (mut ctx, _rx) = test_context(pool.clone(), &base);

        // fail_max 2 with a single attempt per dispatch
        let mut config = test_config(&base);
        config.circuit_fail_max = 2;
        config.retry_max_attempts = 1;
        ctx.breaker = Arc::new(CircuitBreaker::new(2, Duration::from_secs(60)));
        ctx.config = Arc::new(config);

        let first = insert_queued(&pool).await;
        let second = insert_queued(&pool).await;
        let third = insert_queued(&pool).await;

        dispatch(&ctx, first).await;
        dispatch(&ctx, second).await;
        assert!(ctx.breaker.is_open());

        dispatch(&ctx, third).await;
        let msg = db::get_message(&pool, third).await.unwrap().unwrap();
        assert_eq!(msg.status, NotificationStatus::Queued);
        assert!(msg.last_error.unwrap().starts_with("circuit-open"));

        // only the first two dispatches reached the provider
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_dispatch_unknown_message_is_dropped(pool: PgPool) {
        let hits = Arc::new(AtomicU32::new(0));
        let base = spawn_stub(StatusCode::OK, hits.clone()).await;
        let (ctx, _rx) = test_context(pool.clone(), &base);

        // must not panic and must not call the provider
        dispatch(&ctx, 999_999).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
