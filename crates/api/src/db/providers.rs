//! Provider repository

use slotbook_core::models::Provider;
use slotbook_core::types::{ProviderId, UserId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;

/// Create a new provider owned by the given user
pub async fn create_provider(
    pool: &PgPool,
    user_id: UserId,
    display_name: &str,
    establishment_id: Option<Uuid>,
) -> Result<Provider, ApiError> {
    let provider = sqlx::query_as::<_, Provider>(
        r#"
        INSERT INTO providers (user_id, establishment_id, display_name)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(establishment_id)
    .bind(display_name)
    .fetch_one(pool)
    .await?;

    Ok(provider)
}

/// List all providers
pub async fn list_providers(pool: &PgPool) -> Result<Vec<Provider>, ApiError> {
    let providers =
        sqlx::query_as::<_, Provider>("SELECT * FROM providers ORDER BY created_at DESC")
            .fetch_all(pool)
            .await?;

    Ok(providers)
}

/// Get a provider by id
pub async fn get_provider(pool: &PgPool, provider_id: ProviderId) -> Result<Provider, ApiError> {
    let provider = sqlx::query_as::<_, Provider>("SELECT * FROM providers WHERE id = $1")
        .bind(provider_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("provider not found: {}", provider_id)))?;

    Ok(provider)
}

/// Update a provider's display name and establishment
pub async fn update_provider(
    pool: &PgPool,
    provider_id: ProviderId,
    display_name: &str,
    establishment_id: Option<Uuid>,
) -> Result<Provider, ApiError> {
    let provider = sqlx::query_as::<_, Provider>(
        r#"
        UPDATE providers
        SET display_name = $2,
            establishment_id = $3
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(provider_id)
    .bind(display_name)
    .bind(establishment_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("provider not found: {}", provider_id)))?;

    Ok(provider)
}
