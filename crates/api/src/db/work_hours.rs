//! Work-hour block repository
//!
//! `weekday` uses the storage convention 0=Sunday .. 6=Saturday everywhere.

use chrono::NaiveTime;
use slotbook_core::models::WorkHourBlock;
use slotbook_core::types::ProviderId;
use sqlx::PgPool;

use crate::error::ApiError;

/// Add a work-hour block for a provider
pub async fn add_block(
    pool: &PgPool,
    provider_id: ProviderId,
    weekday: i16,
    start_time: NaiveTime,
    end_time: NaiveTime,
) -> Result<WorkHourBlock, ApiError> {
    let block = sqlx::query_as::<_, WorkHourBlock>(
        r#"
        INSERT INTO provider_work_hours (provider_id, weekday, start_time, end_time)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(provider_id)
    .bind(weekday)
    .bind(start_time)
    .bind(end_time)
    .fetch_one(pool)
    .await?;

    Ok(block)
}

/// List all work-hour blocks for a provider
pub async fn list_blocks(
    pool: &PgPool,
    provider_id: ProviderId,
) -> Result<Vec<WorkHourBlock>, ApiError> {
    let blocks = sqlx::query_as::<_, WorkHourBlock>(
        r#"
        SELECT * FROM provider_work_hours
        WHERE provider_id = $1
        ORDER BY weekday, start_time
        "#,
    )
    .bind(provider_id)
    .fetch_all(pool)
    .await?;

    Ok(blocks)
}

/// All blocks for one weekday of a provider
///
/// An empty result means the provider does not work that day; callers that
/// already validated the provider treat it as "no availability".
pub async fn blocks_for(
    pool: &PgPool,
    provider_id: ProviderId,
    weekday: i16,
) -> Result<Vec<WorkHourBlock>, ApiError> {
    let blocks = sqlx::query_as::<_, WorkHourBlock>(
        r#"
        SELECT * FROM provider_work_hours
        WHERE provider_id = $1 AND weekday = $2
        ORDER BY start_time
        "#,
    )
    .bind(provider_id)
    .bind(weekday)
    .fetch_all(pool)
    .await?;

    Ok(blocks)
}

/// Delete a work-hour block; returns false if it did not belong to the provider
pub async fn delete_block(
    pool: &PgPool,
    provider_id: ProviderId,
    block_id: i64,
) -> Result<bool, ApiError> {
    let result =
        sqlx::query("DELETE FROM provider_work_hours WHERE id = $1 AND provider_id = $2")
            .bind(block_id)
            .bind(provider_id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}
