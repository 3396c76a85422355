//! Bearer-token authentication middleware
//!
//! Validates the access token and injects the authenticated `UserId` into
//! request extensions. Validation results are cached briefly so hot clients
//! do not pay the JWT decode on every request; a cached entry is honored
//! only while the token's own expiry has not passed.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use slotbook_core::types::UserId;

use crate::AppState;
use crate::error::ApiError;
use crate::security;

/// Authenticate the request and attach the user id
pub async fn bearer_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

    let now = Utc::now().timestamp();
    let user_id = match state.auth_cache.get(token).await {
        Some(claims) if claims.expires_at > now => claims.user_id,
        _ => {
            let claims = security::verify_access_token(token, &state.config.secret_key)
                .ok_or_else(|| {
                    ApiError::Unauthorized("invalid or expired access token".to_string())
                })?;
            state.auth_cache.insert(token.to_string(), claims).await;
            claims.user_id
        }
    };

    request.extensions_mut().insert::<UserId>(user_id);

    Ok(next.run(request).await)
}
