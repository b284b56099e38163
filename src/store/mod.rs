//! Data-store seam for the scheduling core.
//!
//! The validator and planner talk to an [`EventStore`] passed in
//! explicitly, never to a global client, so tests substitute the in-memory
//! backend for Postgres.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AvailabilityWindow, Event, Location, Tag};
use crate::scheduling::planner::QueryPlan;

pub mod memory;
pub mod postgres;

pub use memory::MemoryEventStore;
pub use postgres::PgEventStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Ids of events carrying any of the given tags (OR semantics).
    async fn event_ids_with_any_tag(&self, tag_ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError>;

    /// Ids of events the profile has RSVPed to.
    async fn rsvp_event_ids(&self, profile_id: Uuid) -> Result<Vec<Uuid>, StoreError>;

    /// Ids of events the profile co-hosts.
    async fn co_host_event_ids(&self, profile_id: Uuid) -> Result<Vec<Uuid>, StoreError>;

    /// Execute a composed plan and return one ordered page of events.
    async fn fetch_events(&self, plan: &QueryPlan) -> Result<Vec<Event>, StoreError>;

    /// Cardinality of the plan's predicate set (page window ignored).
    async fn count_events(&self, plan: &QueryPlan) -> Result<u64, StoreError>;

    /// All events booked at a location, optionally excluding one (the
    /// event being edited).
    async fn events_at_location(
        &self,
        location_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Event>, StoreError>;

    async fn availability_windows(
        &self,
        location_id: Uuid,
    ) -> Result<Vec<AvailabilityWindow>, StoreError>;

    async fn get_location(&self, id: Uuid) -> Result<Option<Location>, StoreError>;

    async fn locations_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Location>, StoreError>;

    /// Tag lists for a batch of events, keyed by event id.
    async fn tags_for_events(
        &self,
        event_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Tag>>, StoreError>;

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, StoreError>;

    async fn insert_event(&self, event: &Event) -> Result<(), StoreError>;

    async fn update_event(&self, event: &Event) -> Result<(), StoreError>;

    /// Replace the tag relations of an event.
    async fn set_event_tags(&self, event_id: Uuid, tag_ids: &[Uuid]) -> Result<(), StoreError>;

    /// Toggle one availability cell. The first toggle of an unset cell
    /// materializes a blackout row (the implicit default is "available");
    /// later toggles flip the existing row in place.
    async fn toggle_availability(
        &self,
        location_id: Uuid,
        slot_start: DateTime<Utc>,
        slot_end: DateTime<Utc>,
    ) -> Result<AvailabilityWindow, StoreError>;
}
