use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub building: Option<String>,
    pub floor: Option<String>,
    /// Distinguishes bookable meeting rooms from residential units.
    pub kind: String,
    /// When false, only privileged actors may book this location.
    pub anyone_can_book: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Location {
    pub fn display(&self) -> LocationDisplay {
        LocationDisplay {
            name: self.name.clone(),
            building: self.building.clone(),
            floor: self.floor.clone(),
        }
    }
}

/// The subset of location fields shown alongside an event listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationDisplay {
    pub name: String,
    pub building: Option<String>,
    pub floor: Option<String>,
}

/// One explicit availability slot for a location. Rows are materialized
/// lazily: the first toggle of an hour cell inserts a window, later toggles
/// update it in place. `is_available = false` marks a blackout.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub location_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub is_available: bool,
}
