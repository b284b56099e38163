use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{NaiveDate, TimeDelta};
use serde::Deserialize;
use uuid::Uuid;

use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

use super::Actor;

/// GET /api/locations/:id/availability: all materialized windows for the
/// location, for calendar display and pre-fetching the validator's input.
pub async fn list_availability(
    State(state): State<AppState>,
    Path(location_id): Path<Uuid>,
) -> Result<Response, AppError> {
    if state.store.get_location(location_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Location with id '{location_id}' was not found"
        )));
    }

    let windows = state.store.availability_windows(location_id).await?;
    Ok(success(windows, "Availability fetched successfully").into_response())
}

#[derive(Debug, Deserialize)]
pub struct ToggleSlotRequest {
    pub date: NaiveDate,
    /// Hour-of-day cell, 0..=23.
    pub hour: u8,
    pub timezone: Option<String>,
}

/// POST /api/locations/:id/availability/toggle: flip one hour cell.
/// The first toggle of an unset cell materializes a blackout window; later
/// toggles update the row in place.
pub async fn toggle_availability(
    State(state): State<AppState>,
    actor: Actor,
    Path(location_id): Path<Uuid>,
    Json(payload): Json<ToggleSlotRequest>,
) -> Result<Response, AppError> {
    if !actor.is_privileged {
        return Err(AppError::Forbidden(
            "Only administrators can manage location availability".into(),
        ));
    }
    if payload.hour > 23 {
        return Err(AppError::Validation(format!(
            "Invalid hour '{}'",
            payload.hour
        )));
    }
    if state.store.get_location(location_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "Location with id '{location_id}' was not found"
        )));
    }

    let tz = match payload.timezone.as_deref() {
        None => chrono_tz::UTC,
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Validation(format!("Unknown timezone '{raw}'")))?,
    };

    let slot_start = local_hour(payload.date, payload.hour, tz)?;
    let slot_end = slot_start + TimeDelta::hours(1);

    let window = state
        .store
        .toggle_availability(location_id, slot_start, slot_end)
        .await?;

    tracing::info!(
        %location_id,
        start = %window.start_at,
        is_available = window.is_available,
        "availability toggled"
    );
    Ok(success(window, "Availability updated successfully").into_response())
}

fn local_hour(
    date: NaiveDate,
    hour: u8,
    tz: chrono_tz::Tz,
) -> Result<chrono::DateTime<chrono::Utc>, AppError> {
    use chrono::TimeZone;

    let naive = date
        .and_hms_opt(u32::from(hour), 0, 0)
        .ok_or_else(|| AppError::Validation(format!("Invalid hour '{hour}'")))?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .ok_or_else(|| AppError::Validation("Invalid date for the given timezone".into()))
}
