use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::location::LocationDisplay;
use super::tag::Tag;

/// A booked event as stored. Instants are normalized to UTC; the IANA
/// timezone the event was entered in is kept for display.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub is_all_day: bool,
    pub location_id: Option<Uuid>,
    pub location_text: Option<String>,
    pub timezone: String,
    pub color: String,
    pub created_by: Uuid,
    pub recurring_pattern_id: Option<Uuid>,
    pub is_recurring_instance: bool,
    pub av_needs: Option<String>,
    pub speakers: Option<String>,
    pub link: Option<String>,
    pub qa_enabled: bool,
    pub qa_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An event denormalized for listing: location display fields and the tag
/// list are resolved immediately after fetch so downstream consumers never
/// re-check shape.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    #[serde(flatten)]
    pub event: Event,
    pub location: Option<LocationDisplay>,
    pub tags: Vec<Tag>,
}
