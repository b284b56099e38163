//! In-memory [`EventStore`] used by the scheduling core's tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{AvailabilityWindow, Event, Location, Tag};
use crate::scheduling::planner::QueryPlan;

use super::{EventStore, StoreError};

#[derive(Default)]
struct Inner {
    events: HashMap<Uuid, Event>,
    locations: HashMap<Uuid, Location>,
    windows: Vec<AvailabilityWindow>,
    tags: HashMap<Uuid, Tag>,
    event_tags: Vec<(Uuid, Uuid)>,
    rsvps: Vec<(Uuid, Uuid)>,
    co_hosts: Vec<(Uuid, Uuid)>,
}

#[derive(Default)]
pub struct MemoryEventStore {
    inner: RwLock<Inner>,
    failure: Mutex<Option<String>>,
    event_fetches: AtomicUsize,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, to exercise fail-closed paths.
    pub fn fail_with(&self, err: StoreError) {
        *self.failure.lock().unwrap() = Some(err.to_string());
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// How many times the events table was queried for a page.
    pub fn event_fetches(&self) -> usize {
        self.event_fetches.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        match self.failure.lock().unwrap().as_ref() {
            Some(msg) => Err(StoreError::Unavailable(msg.clone())),
            None => Ok(()),
        }
    }

    pub async fn add_location(&self, name: &str, anyone_can_book: bool) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.inner.write().await.locations.insert(
            id,
            Location {
                id,
                name: name.to_string(),
                building: None,
                floor: None,
                kind: "meeting_room".to_string(),
                anyone_can_book,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    pub async fn add_event_at(
        &self,
        title: impl Into<String>,
        location_id: Uuid,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Uuid {
        self.add_event_by(title, location_id, Uuid::new_v4(), start_at, end_at)
            .await
    }

    pub async fn add_event_by(
        &self,
        title: impl Into<String>,
        location_id: Uuid,
        created_by: Uuid,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let event = Event {
            id,
            title: title.into(),
            description: None,
            start_at,
            end_at,
            is_all_day: false,
            location_id: Some(location_id),
            location_text: None,
            timezone: "UTC".to_string(),
            color: "#1a365d".to_string(),
            created_by,
            recurring_pattern_id: None,
            is_recurring_instance: false,
            av_needs: None,
            speakers: None,
            link: None,
            qa_enabled: false,
            qa_url: None,
            created_at: now,
            updated_at: now,
        };
        self.inner.write().await.events.insert(id, event);
        id
    }

    pub async fn add_tag(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.write().await.tags.insert(
            id,
            Tag {
                id,
                name: name.to_string(),
            },
        );
        id
    }

    pub async fn tag_event(&self, event_id: Uuid, tag_id: Uuid) {
        self.inner.write().await.event_tags.push((event_id, tag_id));
    }

    pub async fn add_rsvp(&self, profile_id: Uuid, event_id: Uuid) {
        self.inner.write().await.rsvps.push((profile_id, event_id));
    }

    pub async fn add_co_host(&self, profile_id: Uuid, event_id: Uuid) {
        self.inner.write().await.co_hosts.push((profile_id, event_id));
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn event_ids_with_any_tag(&self, tag_ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        self.check()?;
        let inner = self.inner.read().await;
        let mut ids: Vec<Uuid> = inner
            .event_tags
            .iter()
            .filter(|(_, tag)| tag_ids.contains(tag))
            .map(|(event, _)| *event)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn rsvp_event_ids(&self, profile_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        self.check()?;
        let inner = self.inner.read().await;
        Ok(inner
            .rsvps
            .iter()
            .filter(|(profile, _)| *profile == profile_id)
            .map(|(_, event)| *event)
            .collect())
    }

    async fn co_host_event_ids(&self, profile_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        self.check()?;
        let inner = self.inner.read().await;
        Ok(inner
            .co_hosts
            .iter()
            .filter(|(profile, _)| *profile == profile_id)
            .map(|(_, event)| *event)
            .collect())
    }

    async fn fetch_events(&self, plan: &QueryPlan) -> Result<Vec<Event>, StoreError> {
        self.check()?;
        self.event_fetches.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.read().await;
        let mut events: Vec<Event> = inner
            .events
            .values()
            .filter(|e| plan.matches(e))
            .cloned()
            .collect();
        events.sort_by(|a, b| plan.compare(a, b));
        Ok(events
            .into_iter()
            .skip(plan.offset as usize)
            .take(plan.limit as usize)
            .collect())
    }

    async fn count_events(&self, plan: &QueryPlan) -> Result<u64, StoreError> {
        self.check()?;
        let inner = self.inner.read().await;
        Ok(inner.events.values().filter(|e| plan.matches(e)).count() as u64)
    }

    async fn events_at_location(
        &self,
        location_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Event>, StoreError> {
        self.check()?;
        let inner = self.inner.read().await;
        Ok(inner
            .events
            .values()
            .filter(|e| e.location_id == Some(location_id) && Some(e.id) != exclude)
            .cloned()
            .collect())
    }

    async fn availability_windows(
        &self,
        location_id: Uuid,
    ) -> Result<Vec<AvailabilityWindow>, StoreError> {
        self.check()?;
        let inner = self.inner.read().await;
        Ok(inner
            .windows
            .iter()
            .filter(|w| w.location_id == location_id)
            .cloned()
            .collect())
    }

    async fn get_location(&self, id: Uuid) -> Result<Option<Location>, StoreError> {
        self.check()?;
        Ok(self.inner.read().await.locations.get(&id).cloned())
    }

    async fn locations_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Location>, StoreError> {
        self.check()?;
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.locations.get(id).cloned())
            .collect())
    }

    async fn tags_for_events(
        &self,
        event_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Tag>>, StoreError> {
        self.check()?;
        let inner = self.inner.read().await;
        let mut map: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for (event, tag) in &inner.event_tags {
            if event_ids.contains(event) {
                if let Some(tag) = inner.tags.get(tag) {
                    map.entry(*event).or_default().push(tag.clone());
                }
            }
        }
        Ok(map)
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        self.check()?;
        Ok(self.inner.read().await.events.get(&id).cloned())
    }

    async fn insert_event(&self, event: &Event) -> Result<(), StoreError> {
        self.check()?;
        self.inner
            .write()
            .await
            .events
            .insert(event.id, event.clone());
        Ok(())
    }

    async fn update_event(&self, event: &Event) -> Result<(), StoreError> {
        self.check()?;
        self.inner
            .write()
            .await
            .events
            .insert(event.id, event.clone());
        Ok(())
    }

    async fn set_event_tags(&self, event_id: Uuid, tag_ids: &[Uuid]) -> Result<(), StoreError> {
        self.check()?;
        let mut inner = self.inner.write().await;
        inner.event_tags.retain(|(event, _)| *event != event_id);
        for tag in tag_ids {
            inner.event_tags.push((event_id, *tag));
        }
        Ok(())
    }

    async fn toggle_availability(
        &self,
        location_id: Uuid,
        slot_start: DateTime<Utc>,
        slot_end: DateTime<Utc>,
    ) -> Result<AvailabilityWindow, StoreError> {
        self.check()?;
        let mut inner = self.inner.write().await;
        if let Some(window) = inner
            .windows
            .iter_mut()
            .find(|w| w.location_id == location_id && w.start_at == slot_start)
        {
            window.is_available = !window.is_available;
            return Ok(window.clone());
        }
        let window = AvailabilityWindow {
            id: Uuid::new_v4(),
            location_id,
            start_at: slot_start,
            end_at: slot_end,
            is_available: false,
        };
        inner.windows.push(window.clone());
        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn toggling_materializes_then_flips_in_place() {
        let store = MemoryEventStore::new();
        let location = store.add_location("Aare", true).await;
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();

        // First toggle of an unset cell inserts a blackout.
        let window = store
            .toggle_availability(location, start, end)
            .await
            .unwrap();
        assert!(!window.is_available);
        assert_eq!(store.availability_windows(location).await.unwrap().len(), 1);

        // Second toggle flips the same row instead of inserting.
        let window = store
            .toggle_availability(location, start, end)
            .await
            .unwrap();
        assert!(window.is_available);
        assert_eq!(store.availability_windows(location).await.unwrap().len(), 1);
    }
}
