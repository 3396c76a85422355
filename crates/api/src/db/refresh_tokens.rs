//! Refresh-token issuance, rotation, and revocation
//!
//! The plaintext token handed to clients is `"{token_id}.{secret}"`. Only the
//! argon2 hash of the secret half is stored, so a database leak does not leak
//! usable refresh tokens.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use slotbook_core::models::RefreshToken;
use slotbook_core::types::UserId;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::security;

/// Issue a new refresh token and return its plaintext form
pub async fn issue(
    pool: &PgPool,
    user_id: UserId,
    expires_days: i64,
) -> Result<String, ApiError> {
    let token_id = Uuid::new_v4();
    let secret = URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>());
    let token_hash = security::hash_password(&secret)?;
    let expires_at = Utc::now() + Duration::days(expires_days);

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(token_id)
    .bind(user_id)
    .bind(&token_hash)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(format!("{}.{}", token_id, secret))
}

/// Rotate a refresh token: revoke the presented one and return the owning
/// user so the caller can issue a fresh pair. Fails with Unauthorized when
/// the token is malformed, unknown, revoked, or expired.
pub async fn rotate(pool: &PgPool, token_plain: &str) -> Result<UserId, ApiError> {
    let (token_id, secret) = split_token(token_plain)
        .ok_or_else(|| ApiError::Unauthorized("invalid refresh token".to_string()))?;

    let row = sqlx::query_as::<_, RefreshToken>("SELECT * FROM refresh_tokens WHERE id = $1")
        .bind(token_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("invalid refresh token".to_string()))?;

    if row.revoked_at.is_some() || row.expires_at <= Utc::now() {
        return Err(ApiError::Unauthorized(
            "refresh token invalid or expired".to_string(),
        ));
    }

    if !security::verify_password(secret, &row.token_hash) {
        return Err(ApiError::Unauthorized("invalid refresh token".to_string()));
    }

    sqlx::query("UPDATE refresh_tokens SET revoked_at = now() WHERE id = $1")
        .bind(token_id)
        .execute(pool)
        .await?;

    Ok(row.user_id)
}

/// Revoke a refresh token; unknown or malformed tokens are ignored
pub async fn revoke(pool: &PgPool, token_plain: &str) -> Result<(), ApiError> {
    let Some((token_id, _secret)) = split_token(token_plain) else {
        return Ok(());
    };

    sqlx::query("UPDATE refresh_tokens SET revoked_at = now() WHERE id = $1 AND revoked_at IS NULL")
        .bind(token_id)
        .execute(pool)
        .await?;

    Ok(())
}

fn split_token(token_plain: &str) -> Option<(Uuid, &str)> {
    let (id_part, secret) = token_plain.split_once('.')?;
    let token_id = id_part.parse::<Uuid>().ok()?;
    Some((token_id, secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_token() {
        let id = Uuid::new_v4();
        let token = format!("{}.some-secret", id);
        let (parsed_id, secret) = split_token(&token).unwrap();
        assert_eq!(parsed_id, id);
        assert_eq!(secret, "some-secret");

        assert!(split_token("no-dot-here").is_none());
        assert!(split_token("not-a-uuid.secret").is_none());
    }

    async fn seed_user(pool: &PgPool) -> UserId {
        sqlx::query_scalar("INSERT INTO users (email, password_hash) VALUES ($1, 'x') RETURNING id")
            .bind(format!("rt-{}@example.com", Uuid::new_v4()))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_issue_and_rotate(pool: PgPool) {
        let user_id = seed_user(&pool).await;

        let token = issue(&pool, user_id, 30).await.unwrap();
        let rotated_user = rotate(&pool, &token).await.unwrap();
        assert_eq!(rotated_user, user_id);

        // rotation revokes: the same token cannot be used twice
        let again = rotate(&pool, &token).await;
        assert!(matches!(again, Err(ApiError::Unauthorized(_))));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_revoke_then_rotate_fails(pool: PgPool) {
        let user_id = seed_user(&pool).await;

        let token = issue(&pool, user_id, 30).await.unwrap();
        revoke(&pool, &token).await.unwrap();

        let result = rotate(&pool, &token).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_rotate_with_wrong_secret_fails(pool: PgPool) {
        let user_id = seed_user(&pool).await;

        let token = issue(&pool, user_id, 30).await.unwrap();
        let (id_part, _) = token.split_once('.').unwrap();
        let forged = format!("{}.forged-secret", id_part);

        let result = rotate(&pool, &forged).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }
}
