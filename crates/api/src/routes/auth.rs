//! Authentication endpoints: signup, login, refresh, logout

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use slotbook_core::types::UserId;

use crate::AppState;
use crate::db::{refresh_tokens, users};
use crate::error::ApiError;
use crate::security;

/// Signup request
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Refresh/logout request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
}

async fn issue_token_pair(state: &AppState, user_id: UserId) -> Result<TokenResponse, ApiError> {
    let access_token = security::create_access_token(
        user_id,
        &state.config.secret_key,
        state.config.access_token_expires_min,
    )?;
    let refresh_token = refresh_tokens::issue(
        &state.pool,
        user_id,
        state.config.refresh_token_expires_days,
    )
    .await?;

    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "bearer",
    })
}

/// Register a new account
async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Response, ApiError> {
    if users::find_by_email(&state.pool, &req.email).await?.is_some() {
        return Err(ApiError::Conflict("email already registered".to_string()));
    }

    let password_hash = security::hash_password(&req.password)?;
    let user = users::create_user(
        &state.pool,
        &req.email,
        &password_hash,
        req.full_name.as_deref(),
        req.phone.as_deref(),
    )
    .await?;

    let tokens = issue_token_pair(&state, user.id).await?;
    Ok((StatusCode::CREATED, Json(tokens)).into_response())
}

/// Exchange credentials for a token pair
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = users::find_by_email(&state.pool, &req.email)
        .await?
        .filter(|u| security::verify_password(&req.password, &u.password_hash))
        .ok_or_else(|| ApiError::Unauthorized("invalid credentials".to_string()))?;

    let tokens = issue_token_pair(&state, user.id).await?;
    Ok(Json(tokens))
}

/// Rotate a refresh token
async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user_id = refresh_tokens::rotate(&state.pool, &req.refresh_token).await?;
    let tokens = issue_token_pair(&state, user_id).await?;
    Ok(Json(tokens))
}

/// Revoke a refresh token
async fn logout(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    refresh_tokens::revoke(&state.pool, &req.refresh_token).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Authentication routes (all public)
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
}
