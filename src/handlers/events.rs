use axum::extract::{Path, Query, State};
use axum::http::Uri;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::models::Event;
use crate::scheduling::{
    check_overlap, interval_is_bookable, validate_availability, EventFilters, EventView, Verdict,
};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success, Paged};

use super::Actor;

#[derive(Debug, Deserialize)]
pub struct ListEventsParams {
    #[serde(default)]
    pub view: EventView,
    /// Comma-separated tag ids; OR semantics.
    pub tags: Option<String>,
    pub date: Option<NaiveDate>,
    pub timezone: Option<String>,
    #[serde(default)]
    pub page: u32,
}

impl ListEventsParams {
    fn filters(&self) -> Result<EventFilters, AppError> {
        let tags = match &self.tags {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<Uuid>()
                        .map_err(|_| AppError::Validation(format!("Invalid tag id '{s}'")))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(EventFilters {
            tags,
            date: self.date,
            timezone: parse_timezone(self.timezone.as_deref())?,
        })
    }
}

/// GET /api/events: one planned page of the filtered listing.
pub async fn list_events(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<ListEventsParams>,
) -> Result<Response, AppError> {
    let filters = params.filters()?;
    let page = state
        .planner()
        .fetch_page(params.view, &filters, actor.profile_id, params.page, Utc::now())
        .await?;

    Ok(success(
        Paged {
            items: page.events,
            has_more: page.has_more,
        },
        "Events fetched successfully",
    )
    .into_response())
}

/// GET /api/events/count: cardinality of the same predicate set, for
/// badge display.
pub async fn count_events(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<ListEventsParams>,
) -> Result<Response, AppError> {
    let filters = params.filters()?;
    let count = state
        .planner()
        .count(params.view, &filters, actor.profile_id, Utc::now())
        .await?;

    Ok(success(json!({ "count": count }), "Events counted successfully").into_response())
}

#[derive(Debug, Deserialize)]
pub struct EventPayload {
    pub title: String,
    pub description: Option<String>,
    /// Local wall-clock start/end in the stated timezone.
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub timezone: String,
    #[serde(default)]
    pub is_all_day: bool,
    pub location_id: Option<Uuid>,
    pub location_text: Option<String>,
    #[serde(default)]
    pub tags: Vec<Uuid>,
    pub av_needs: Option<String>,
    pub speakers: Option<String>,
    pub link: Option<String>,
    #[serde(default)]
    pub qa_enabled: bool,
}

/// POST /api/events: validate, check availability and overlap, insert.
pub async fn create_event(
    State(state): State<AppState>,
    actor: Actor,
    Json(payload): Json<EventPayload>,
) -> Result<Response, AppError> {
    let Some(profile_id) = actor.profile_id else {
        return Err(AppError::Validation(
            "User profile not found. Please complete your profile setup.".into(),
        ));
    };

    let booking = validate_payload(&payload)?;
    run_booking_checks(&state, &booking, None, actor).await?;

    let now = Utc::now();
    let event = Event {
        id: Uuid::new_v4(),
        title: payload.title.trim().to_string(),
        description: payload.description.clone(),
        start_at: booking.start_at,
        end_at: booking.end_at,
        is_all_day: payload.is_all_day,
        location_id: payload.location_id,
        location_text: payload.location_text.clone(),
        timezone: payload.timezone.clone(),
        color: "#1a365d".to_string(),
        created_by: profile_id,
        recurring_pattern_id: None,
        is_recurring_instance: false,
        av_needs: payload.av_needs.clone(),
        speakers: payload.speakers.clone(),
        link: payload.link.clone(),
        qa_enabled: payload.qa_enabled,
        qa_url: None,
        created_at: now,
        updated_at: now,
    };

    state.store.insert_event(&event).await?;
    if !payload.tags.is_empty() {
        state.store.set_event_tags(event.id, &payload.tags).await?;
    }

    tracing::info!(event_id = %event.id, title = %event.title, "event created");
    Ok(created(event, "Event created successfully").into_response())
}

/// PUT /api/events/:id. Creator-or-privileged; the overlap check excludes
/// the event itself so it never conflicts with its own old slot.
pub async fn update_event(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(payload): Json<EventPayload>,
) -> Result<Response, AppError> {
    let Some(profile_id) = actor.profile_id else {
        return Err(AppError::Validation(
            "User profile not found. Please complete your profile setup.".into(),
        ));
    };

    let Some(mut event) = state.store.get_event(id).await? else {
        return Err(AppError::NotFound(format!(
            "Event with id '{id}' was not found"
        )));
    };
    if event.created_by != profile_id && !actor.is_privileged {
        return Err(AppError::Forbidden(
            "Only the event creator can edit this event".into(),
        ));
    }

    let booking = validate_payload(&payload)?;
    run_booking_checks(&state, &booking, Some(id), actor).await?;

    event.title = payload.title.trim().to_string();
    event.description = payload.description.clone();
    event.start_at = booking.start_at;
    event.end_at = booking.end_at;
    event.is_all_day = payload.is_all_day;
    event.location_id = payload.location_id;
    event.location_text = payload.location_text.clone();
    event.timezone = payload.timezone.clone();
    event.av_needs = payload.av_needs.clone();
    event.speakers = payload.speakers.clone();
    event.link = payload.link.clone();
    event.qa_enabled = payload.qa_enabled;
    event.updated_at = Utc::now();

    state.store.update_event(&event).await?;
    state.store.set_event_tags(event.id, &payload.tags).await?;

    tracing::info!(event_id = %event.id, "event updated");
    Ok(success(event, "Event updated successfully").into_response())
}

/// A payload reduced to its normalized UTC interval and resolved location.
struct ValidatedBooking {
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    location_id: Option<Uuid>,
}

/// Local validation per the error taxonomy: runs before any I/O, and a
/// failure here never reaches the store.
fn validate_payload(payload: &EventPayload) -> Result<ValidatedBooking, AppError> {
    if payload.title.trim().is_empty() {
        return Err(AppError::Validation("Event title is required".into()));
    }

    // Submission forms send an empty custom-location field alongside a
    // selected room; blank text counts as absent.
    let location_text = payload
        .location_text
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty());
    match (payload.location_id, location_text) {
        (None, None) => {
            return Err(AppError::Validation("Please select a location".into()));
        }
        (Some(_), Some(_)) => {
            return Err(AppError::Validation(
                "Provide either a bookable location or a custom location, not both".into(),
            ));
        }
        _ => {}
    }

    if let Some(link) = &payload.link {
        if !link.is_empty() && !url_is_valid(link) {
            return Err(AppError::Validation("Please enter a valid URL".into()));
        }
    }

    let tz = parse_timezone(Some(&payload.timezone))?;

    // All-day events still carry real instants: local midnight to midnight.
    let (start_local, end_local) = if payload.is_all_day {
        (
            payload.start.date().and_hms_opt(0, 0, 0).unwrap_or(payload.start),
            (payload.end.date() + TimeDelta::days(1))
                .and_hms_opt(0, 0, 0)
                .unwrap_or(payload.end),
        )
    } else {
        (payload.start, payload.end)
    };

    let start_at = to_utc(start_local, tz)?;
    let end_at = to_utc(end_local, tz)?;

    if !interval_is_bookable(start_at, end_at) {
        return Err(AppError::Validation(
            "End date must be after start date".into(),
        ));
    }

    Ok(ValidatedBooking {
        start_at,
        end_at,
        location_id: payload.location_id,
    })
}

/// The submission-time availability and overlap checks. Advisory: a clear
/// verdict here does not preclude a concurrent booking landing first.
async fn run_booking_checks(
    state: &AppState,
    booking: &ValidatedBooking,
    exclude: Option<Uuid>,
    actor: Actor,
) -> Result<(), AppError> {
    // Custom free-text locations have no windows or bookings to conflict
    // with.
    let Some(location_id) = booking.location_id else {
        return Ok(());
    };

    let Some(location) = state.store.get_location(location_id).await? else {
        return Err(AppError::NotFound(format!(
            "Location with id '{location_id}' was not found"
        )));
    };
    if !location.anyone_can_book && !actor.is_privileged {
        return Err(AppError::Forbidden(format!(
            "Location '{}' cannot be booked by this profile",
            location.name
        )));
    }

    let windows = state.store.availability_windows(location_id).await?;
    let verdict = validate_availability(&windows, booking.start_at, booking.end_at);
    if let Some(message) = verdict.message() {
        return Err(AppError::Conflict(message));
    }

    let verdict = check_overlap(
        state.store.as_ref(),
        location_id,
        booking.start_at,
        booking.end_at,
        exclude,
    )
    .await;
    if let Some(message) = verdict.message() {
        // Unverified also lands here: a scan we could not complete blocks
        // the booking rather than allowing it.
        debug_assert!(matches!(
            verdict,
            Verdict::Booked { .. } | Verdict::Unverified
        ));
        return Err(AppError::Conflict(message));
    }

    Ok(())
}

fn parse_timezone(name: Option<&str>) -> Result<Tz, AppError> {
    match name {
        None => Ok(chrono_tz::UTC),
        Some(raw) => raw
            .parse::<Tz>()
            .map_err(|_| AppError::Validation(format!("Unknown timezone '{raw}'"))),
    }
}

fn to_utc(local: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>, AppError> {
    use chrono::TimeZone;
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| AppError::Validation("Invalid date format".into()))
}

fn url_is_valid(url: &str) -> bool {
    url.parse::<Uri>()
        .map(|uri| uri.scheme().is_some() && uri.authority().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(location_id: Option<Uuid>, location_text: Option<&str>) -> EventPayload {
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        EventPayload {
            title: "Board games night".to_string(),
            description: None,
            start: day.and_hms_opt(18, 0, 0).unwrap(),
            end: day.and_hms_opt(20, 0, 0).unwrap(),
            timezone: "Europe/Zurich".to_string(),
            is_all_day: false,
            location_id,
            location_text: location_text.map(str::to_string),
            tags: Vec::new(),
            av_needs: None,
            speakers: None,
            link: None,
            qa_enabled: false,
        }
    }

    #[test]
    fn empty_custom_location_next_to_a_room_counts_as_absent() {
        let room = Uuid::new_v4();
        let booking = validate_payload(&payload(Some(room), Some(""))).unwrap();
        assert_eq!(booking.location_id, Some(room));

        let booking = validate_payload(&payload(Some(room), Some("   "))).unwrap();
        assert_eq!(booking.location_id, Some(room));
    }

    #[test]
    fn room_and_real_custom_location_are_mutually_exclusive() {
        let result = validate_payload(&payload(Some(Uuid::new_v4()), Some("the lawn")));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn blank_custom_location_alone_is_no_location() {
        let result = validate_payload(&payload(None, Some("   ")));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
