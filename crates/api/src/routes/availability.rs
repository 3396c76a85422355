//! Provider availability endpoint
//!
//! Computes free slot starts for a provider on a local date. Candidates are
//! generated on the local wall clock from the provider's work-hour blocks,
//! then taken and past slots are excluded.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use chrono::NaiveDate;
use serde::Deserialize;
use slotbook_core::types::ProviderId;
use slotbook_core::{candidate_slots, day_window_utc, now_in, parse_timezone, to_utc, weekday_index};
use std::collections::HashSet;

use crate::AppState;
use crate::db::{appointments, work_hours};
use crate::error::ApiError;

/// Availability query parameters
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// Local date, YYYY-MM-DD
    pub date: String,
    /// IANA timezone for the requested day
    #[serde(default = "default_tz")]
    pub tz: String,
}

fn default_tz() -> String {
    "America/Sao_Paulo".to_string()
}

/// Free slot starts for a provider on a local date, as ISO-8601 strings with
/// offset, ascending
async fn get_availability(
    State(state): State<AppState>,
    Path(provider_id): Path<ProviderId>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let date = NaiveDate::parse_from_str(&query.date, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("invalid date: {}", query.date)))?;
    let tz = parse_timezone(&query.tz)?;

    let blocks = work_hours::blocks_for(&state.pool, provider_id, weekday_index(date)).await?;
    if blocks.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let block_times: Vec<_> = blocks.iter().map(|b| (b.start_time, b.end_time)).collect();
    let candidates = candidate_slots(date, &block_times, tz, state.config.slot_duration());
    if candidates.is_empty() {
        return Ok(Json(Vec::new()));
    }

    // A local day is not always 24 UTC hours; the widened window over-fetches
    // and exclusion happens by exact instant.
    let (window_start, window_end) = day_window_utc(date, tz);
    let taken: HashSet<_> = appointments::slots_taken(&state.pool, provider_id, window_start, window_end)
        .await?
        .into_iter()
        .collect();

    let now = now_in(tz);
    let available = candidates
        .into_iter()
        .filter(|slot| !taken.contains(&to_utc(slot)) && *slot > now)
        .map(|slot| slot.to_rfc3339())
        .collect();

    Ok(Json(available))
}

/// Availability routes (public)
pub fn routes() -> Router<AppState> {
    Router::new().route("/providers/{id}/availability", get(get_availability))
}
