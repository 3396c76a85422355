//! Provider and work-hour endpoints
//!
//! Reads are public; mutations require the caller to own the provider.

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use slotbook_core::models::{Provider, WorkHourBlock};
use slotbook_core::types::{ProviderId, UserId};
use uuid::Uuid;

use crate::AppState;
use crate::db::{providers, work_hours};
use crate::error::ApiError;
use crate::middleware::bearer_auth::bearer_auth;

/// Create/update provider request
#[derive(Debug, Deserialize)]
pub struct ProviderRequest {
    pub display_name: String,
    pub establishment_id: Option<Uuid>,
}

/// Provider response
#[derive(Debug, Serialize)]
pub struct ProviderResponse {
    pub id: ProviderId,
    pub display_name: String,
    pub establishment_id: Option<Uuid>,
}

impl From<Provider> for ProviderResponse {
    fn from(p: Provider) -> Self {
        Self {
            id: p.id,
            display_name: p.display_name,
            establishment_id: p.establishment_id,
        }
    }
}

/// Work-hour creation request; times are local wall-clock "HH:MM"
#[derive(Debug, Deserialize)]
pub struct WorkHourRequest {
    pub weekday: i16,
    pub start_time: String,
    pub end_time: String,
}

/// Work-hour response
#[derive(Debug, Serialize)]
pub struct WorkHourResponse {
    pub id: i64,
    pub weekday: i16,
    pub start_time: String,
    pub end_time: String,
}

impl From<WorkHourBlock> for WorkHourResponse {
    fn from(b: WorkHourBlock) -> Self {
        Self {
            id: b.id,
            weekday: b.weekday,
            start_time: b.start_time.format("%H:%M").to_string(),
            end_time: b.end_time.format("%H:%M").to_string(),
        }
    }
}

fn parse_time_of_day(value: &str) -> Result<NaiveTime, ApiError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ApiError::BadRequest(format!("invalid time format: {}", value)))
}

/// Load a provider and verify the caller owns it
async fn owned_provider(
    state: &AppState,
    provider_id: ProviderId,
    user_id: UserId,
) -> Result<Provider, ApiError> {
    let provider = providers::get_provider(&state.pool, provider_id).await?;
    if provider.user_id != user_id {
        return Err(ApiError::Forbidden);
    }
    Ok(provider)
}

async fn create_provider(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Json(req): Json<ProviderRequest>,
) -> Result<Response, ApiError> {
    let provider = providers::create_provider(
        &state.pool,
        user_id,
        &req.display_name,
        req.establishment_id,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(ProviderResponse::from(provider))).into_response())
}

async fn list_providers(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProviderResponse>>, ApiError> {
    let providers = providers::list_providers(&state.pool).await?;
    Ok(Json(providers.into_iter().map(Into::into).collect()))
}

async fn get_provider(
    State(state): State<AppState>,
    Path(provider_id): Path<ProviderId>,
) -> Result<Json<ProviderResponse>, ApiError> {
    let provider = providers::get_provider(&state.pool, provider_id).await?;
    Ok(Json(provider.into()))
}

async fn update_provider(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(provider_id): Path<ProviderId>,
    Json(req): Json<ProviderRequest>,
) -> Result<Json<ProviderResponse>, ApiError> {
    owned_provider(&state, provider_id, user_id).await?;

    let provider = providers::update_provider(
        &state.pool,
        provider_id,
        &req.display_name,
        req.establishment_id,
    )
    .await?;

    Ok(Json(provider.into()))
}

async fn add_work_hour(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(provider_id): Path<ProviderId>,
    Json(req): Json<WorkHourRequest>,
) -> Result<Response, ApiError> {
    owned_provider(&state, provider_id, user_id).await?;

    if !(0..=6).contains(&req.weekday) {
        return Err(ApiError::BadRequest(
            "weekday must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        ));
    }

    let start_time = parse_time_of_day(&req.start_time)?;
    let end_time = parse_time_of_day(&req.end_time)?;
    if start_time >= end_time {
        return Err(ApiError::BadRequest(
            "start_time must be before end_time".to_string(),
        ));
    }

    let block =
        work_hours::add_block(&state.pool, provider_id, req.weekday, start_time, end_time).await?;

    Ok((StatusCode::CREATED, Json(WorkHourResponse::from(block))).into_response())
}

async fn list_work_hours(
    State(state): State<AppState>,
    Path(provider_id): Path<ProviderId>,
) -> Result<Json<Vec<WorkHourResponse>>, ApiError> {
    let blocks = work_hours::list_blocks(&state.pool, provider_id).await?;
    Ok(Json(blocks.into_iter().map(Into::into).collect()))
}

async fn delete_work_hour(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path((provider_id, block_id)): Path<(ProviderId, i64)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    owned_provider(&state, provider_id, user_id).await?;

    if !work_hours::delete_block(&state.pool, provider_id, block_id).await? {
        return Err(ApiError::NotFound(format!(
            "work-hour block not found: {}",
            block_id
        )));
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Provider routes
///
/// Reads are public; mutating method routers carry the bearer-auth layer so
/// both can share a path.
pub fn routes(state: AppState) -> Router<AppState> {
    let auth = axum::middleware::from_fn_with_state(state, bearer_auth);

    Router::new()
        .route(
            "/providers",
            get(list_providers).merge(post(create_provider).route_layer(auth.clone())),
        )
        .route(
            "/providers/{id}",
            get(get_provider).merge(patch(update_provider).route_layer(auth.clone())),
        )
        .route(
            "/providers/{id}/work-hours",
            get(list_work_hours).merge(post(add_work_hour).route_layer(auth.clone())),
        )
        .route(
            "/providers/{id}/work-hours/{block_id}",
            delete(delete_work_hour).route_layer(auth),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(
            parse_time_of_day("09:00").unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time_of_day("17:30:00").unwrap(),
            NaiveTime::from_hms_opt(17, 30, 0).unwrap()
        );
        assert!(parse_time_of_day("25:00").is_err());
        assert!(parse_time_of_day("nine").is_err());
    }
}
