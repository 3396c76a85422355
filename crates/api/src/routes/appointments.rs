//! Appointment endpoints

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, post},
};
use serde::{Deserialize, Serialize};
use slotbook_core::models::{Appointment, AppointmentStatus};
use slotbook_core::types::{AppointmentId, ProviderId, UserId};

use crate::AppState;
use crate::db::appointments;
use crate::error::ApiError;

/// Booking request
#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub provider_id: ProviderId,
    /// Offset-bearing ISO-8601 instant, e.g. "2025-11-03T09:00:00-03:00"
    pub starts_at_iso: String,
    pub tz: String,
}

/// Appointment response
#[derive(Debug, Serialize)]
pub struct AppointmentResponse {
    pub id: AppointmentId,
    pub status: AppointmentStatus,
}

impl From<Appointment> for AppointmentResponse {
    fn from(appt: Appointment) -> Self {
        Self {
            id: appt.id,
            status: appt.status,
        }
    }
}

/// Book a slot with the given provider
async fn create_appointment(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Response, ApiError> {
    let appt = appointments::create_appointment(
        &state.pool,
        user_id,
        req.provider_id,
        &req.starts_at_iso,
        &req.tz,
        state.config.slot_duration(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(AppointmentResponse::from(appt))).into_response())
}

/// Cancel an appointment owned by the caller (idempotent)
async fn cancel_appointment(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
    Path(appt_id): Path<AppointmentId>,
) -> Result<Json<AppointmentResponse>, ApiError> {
    let appt = appointments::cancel_appointment(&state.pool, appt_id, user_id).await?;
    Ok(Json(appt.into()))
}

/// List the caller's appointments, most recent slot first
async fn list_my_appointments(
    State(state): State<AppState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<Vec<AppointmentResponse>>, ApiError> {
    let appts = appointments::list_by_user(&state.pool, user_id).await?;
    Ok(Json(appts.into_iter().map(Into::into).collect()))
}

/// Appointment routes (all require authentication)
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/appointments", post(create_appointment).get(list_my_appointments))
        .route("/appointments/{id}", delete(cancel_appointment))
}
