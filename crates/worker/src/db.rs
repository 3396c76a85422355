//! Database operations for the worker
//!
//! Outbox drain queries run inside the relay's batch transaction; dispatcher
//! updates are point writes on single notification rows.

use chrono::{DateTime, Utc};
use slotbook_core::models::{NotificationMessage, OutboxEvent};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Fetch unpublished outbox events, oldest first, locking them for the
/// duration of the batch transaction
pub async fn pull_unpublished_tx(
    tx: &mut Transaction<'_, Postgres>,
    limit: i64,
) -> Result<Vec<OutboxEvent>, sqlx::Error> {
    sqlx::query_as::<_, OutboxEvent>(
        r#"
        SELECT * FROM outbox
        WHERE published_at IS NULL
        ORDER BY created_at
        LIMIT $1
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(limit)
    .fetch_all(&mut **tx)
    .await
}

/// Stamp an event as published (exactly once, within the batch transaction)
pub async fn mark_published_tx(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE outbox SET published_at = $2 WHERE id = $1 AND published_at IS NULL")
        .bind(event_id)
        .bind(at)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Insert a QUEUED notification message within the batch transaction,
/// returning its id
pub async fn insert_queued_tx(
    tx: &mut Transaction<'_, Postgres>,
    channel: &str,
    recipient: &str,
    template: &str,
    variables: serde_json::Value,
    appointment_id: Option<Uuid>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO notification_messages (channel, recipient, template, variables, status, appointment_id)
        VALUES ($1, $2, $3, $4, 'QUEUED', $5)
        RETURNING id
        "#,
    )
    .bind(channel)
    .bind(recipient)
    .bind(template)
    .bind(variables)
    .bind(appointment_id)
    .fetch_one(&mut **tx)
    .await
}

/// Load a notification message
pub async fn get_message(
    pool: &PgPool,
    message_id: i64,
) -> Result<Option<NotificationMessage>, sqlx::Error> {
    sqlx::query_as::<_, NotificationMessage>("SELECT * FROM notification_messages WHERE id = $1")
        .bind(message_id)
        .fetch_optional(pool)
        .await
}

/// Record a successful delivery
pub async fn mark_sent(pool: &PgPool, message_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE notification_messages
        SET status = 'SENT',
            sent_at = now(),
            attempts = attempts + 1,
            last_error = NULL
        WHERE id = $1
        "#,
    )
    .bind(message_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record a delivery failure; the requeue janitor decides on revival
pub async fn mark_failed(pool: &PgPool, message_id: i64, error: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE notification_messages
        SET status = 'FAILED',
            attempts = attempts + 1,
            last_error = $2
        WHERE id = $1
        "#,
    )
    .bind(message_id)
    .bind(error)
    .execute(pool)
    .await?;

    Ok(())
}

/// Put a message back in the queue after the breaker rejected delivery
pub async fn mark_circuit_deferred(
    pool: &PgPool,
    message_id: i64,
    error: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE notification_messages
        SET status = 'QUEUED',
            attempts = attempts + 1,
            last_error = $2
        WHERE id = $1
        "#,
    )
    .bind(message_id)
    .bind(error)
    .execute(pool)
    .await?;

    Ok(())
}

/// QUEUED rows older than the cutoff; these were never picked up or their
/// submission was lost
pub async fn find_stuck_queued(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id FROM notification_messages
        WHERE status = 'QUEUED' AND created_at < $1
        ORDER BY id DESC
        LIMIT $2
        "#,
    )
    .bind(cutoff)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// FAILED rows still under the attempts ceiling; rows at or above it are a
/// terminal dead-letter set
pub async fn find_retryable_failed(
    pool: &PgPool,
    max_attempts: i16,
    limit: i64,
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id FROM notification_messages
        WHERE status = 'FAILED' AND attempts < $1
        ORDER BY id DESC
        LIMIT $2
        "#,
    )
    .bind(max_attempts)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Contact of the user who booked the appointment, when known
pub async fn resolve_phone(
    pool: &PgPool,
    appointment_id: Uuid,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<String>>(
        r#"
        SELECT u.phone FROM appointments a
        JOIN users u ON u.id = a.user_id
        WHERE a.id = $1
        "#,
    )
    .bind(appointment_id)
    .fetch_optional(pool)
    .await
    .map(Option::flatten)
}
