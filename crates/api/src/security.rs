//! Password hashing and access-token handling
//!
//! Passwords and refresh-token secrets are hashed with argon2id; access
//! tokens are short-lived HS256 JWTs carrying the user id as `sub`.

use argon2::{
    Argon2, PasswordHasher, PasswordVerifier,
    password_hash::{PasswordHash, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use slotbook_core::types::UserId;
use uuid::Uuid;

use crate::error::ApiError;

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    sub: String,
    exp: usize,
}

/// Validated access-token claims
#[derive(Debug, Clone, Copy)]
pub struct TokenClaims {
    pub user_id: UserId,
    /// Expiry as a unix timestamp; cached auth entries must not outlive it
    pub expires_at: i64,
}

/// Hash a password (or refresh-token secret) with argon2id
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))
}

/// Verify a password against a stored argon2 hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Create a signed access token for a user
pub fn create_access_token(
    user_id: UserId,
    secret: &str,
    expires_min: i64,
) -> Result<String, ApiError> {
    let exp = Utc::now() + Duration::minutes(expires_min);
    let claims = AccessClaims {
        sub: user_id.to_string(),
        exp: exp.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token signing failed: {}", e)))
}

/// Validate an access token, returning its claims on success
pub fn verify_access_token(token: &str, secret: &str) -> Option<TokenClaims> {
    let data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    let user_id = data.claims.sub.parse::<Uuid>().ok().map(UserId::from)?;

    Some(TokenClaims {
        user_id,
        expires_at: data.claims.exp as i64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn test_password_hashes_are_salted() {
        let h1 = hash_password("hunter2").unwrap();
        let h2 = hash_password("hunter2").unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_verify_password_rejects_garbage_hash() {
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }

    #[test]
    fn test_access_token_round_trip() {
        let user_id = UserId::new();
        let token = create_access_token(user_id, "secret", 30).unwrap();
        let claims = verify_access_token(&token, "secret").unwrap();
        assert_eq!(claims.user_id, user_id);
        assert!(claims.expires_at > Utc::now().timestamp());
    }

    #[test]
    fn test_access_token_wrong_secret() {
        let user_id = UserId::new();
        let token = create_access_token(user_id, "secret", 30).unwrap();
        assert!(verify_access_token(&token, "other-secret").is_none());
    }

    #[test]
    fn test_access_token_expired() {
        let user_id = UserId::new();
        // Expired an hour ago; Validation::default() applies a small leeway,
        // which one hour comfortably exceeds.
        let token = create_access_token(user_id, "secret", -60).unwrap();
        assert!(verify_access_token(&token, "secret").is_none());
    }
}
