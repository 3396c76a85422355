//! Outbox event repository
//!
//! Events are only appended inside the transaction that performs the
//! producing business write; the caller controls the transaction boundary.

use slotbook_core::models::OutboxEvent;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::error::ApiError;

/// Append an event within the caller's transaction
pub async fn append_tx(
    tx: &mut Transaction<'_, Postgres>,
    aggregate_type: &str,
    aggregate_id: Uuid,
    event_type: &str,
    payload: serde_json::Value,
) -> Result<OutboxEvent, ApiError> {
    let event = sqlx::query_as::<_, OutboxEvent>(
        r#"
        INSERT INTO outbox (aggregate_type, aggregate_id, event_type, payload)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(aggregate_type)
    .bind(aggregate_id)
    .bind(event_type)
    .bind(payload)
    .fetch_one(&mut **tx)
    .await?;

    Ok(event)
}
