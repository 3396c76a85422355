//! Stuck-message janitor
//!
//! Periodically revives notification rows that stalled: QUEUED rows older
//! than the staleness cutoff (their submission was lost) and FAILED rows
//! still under the attempts ceiling. Rows at or above the ceiling form a
//! terminal dead-letter set and are left untouched.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::db;
use crate::dispatcher::DispatcherHandle;

/// Rows revived per sweep, per category
const SWEEP_LIMIT: i64 = 200;

/// Delay between sweep and dispatcher submission
const SUBMIT_DELAY: Duration = Duration::from_secs(1);

/// Run the janitor until shutdown
pub async fn run_requeuer(
    pool: PgPool,
    config: Arc<Config>,
    handle: DispatcherHandle,
    shutdown: CancellationToken,
) {
    let mut interval =
        tokio::time::interval(Duration::from_secs(config.requeue_poll_interval_secs));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        match sweep(&pool, &config).await {
            Ok(ids) => {
                if !ids.is_empty() {
                    info!("requeueing {} stalled notifications", ids.len());
                }
                for id in ids {
                    handle.submit_after(id, SUBMIT_DELAY);
                }
            }
            Err(e) => error!("requeue sweep failed: {}", e),
        }
    }

    info!("requeue janitor stopped");
}

/// Collect the ids that deserve another delivery attempt
pub async fn sweep(pool: &PgPool, config: &Config) -> Result<Vec<i64>, sqlx::Error> {
    let cutoff = Utc::now() - chrono::Duration::seconds(config.requeue_stale_seconds);

    let mut ids = db::find_stuck_queued(pool, cutoff, SWEEP_LIMIT).await?;
    ids.extend(db::find_retryable_failed(pool, config.failed_max_attempts, SWEEP_LIMIT).await?);

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    async fn insert_message(
        pool: &PgPool,
        status: &str,
        attempts: i16,
        age_seconds: i64,
    ) -> i64 {
        sqlx::query_scalar(
            r#"
            INSERT INTO notification_messages
                (channel, recipient, template, variables, status, attempts, created_at)
            VALUES ('whatsapp', '+5500000000000', 'appt_created', '{}'::jsonb, $1, $2,
                    now() - make_interval(secs => $3))
            RETURNING id
            "#,
        )
        .bind(status)
        .bind(attempts)
        .bind(age_seconds as f64)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_sweep_picks_stale_queued_and_retryable_failed(pool: PgPool) {
        let config = test_config("http://localhost:9000");

        let stale_queued = insert_message(&pool, "QUEUED", 0, 600).await;
        let fresh_queued = insert_message(&pool, "QUEUED", 0, 5).await;
        let retryable_failed = insert_message(&pool, "FAILED", 2, 600).await;
        let terminal_failed = insert_message(&pool, "FAILED", 5, 600).await;
        let sent = insert_message(&pool, "SENT", 1, 600).await;

        let ids = sweep(&pool, &config).await.unwrap();

        assert!(ids.contains(&stale_queued));
        assert!(ids.contains(&retryable_failed));
        // fresh QUEUED rows are still in flight, terminal FAILED rows are a
        // dead-letter set, SENT rows are done
        assert!(!ids.contains(&fresh_queued));
        assert!(!ids.contains(&terminal_failed));
        assert!(!ids.contains(&sent));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_sweep_caps_each_category(pool: PgPool) {
        let config = test_config("http://localhost:9000");

        for _ in 0..(SWEEP_LIMIT + 10) {
            insert_message(&pool, "QUEUED", 0, 600).await;
        }

        let ids = sweep(&pool, &config).await.unwrap();
        assert_eq!(ids.len() as i64, SWEEP_LIMIT);
    }
}
