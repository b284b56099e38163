//! Filtered event query planning.
//!
//! A view selector, tag filters, and an optional calendar date compose into
//! a [`QueryPlan`]: the predicate set, ordering, and page window the store
//! executes. Tag and membership filters resolve to id sets up front so an
//! empty set can short-circuit without ever touching the events table.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::{Event, EventRecord, LocationDisplay};
use crate::store::{EventStore, StoreError};

use super::interval::local_day_bounds;

/// Fixed page size for event listings.
pub const EVENTS_PER_PAGE: u32 = 5;

/// A named filter scope applied to the event listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventView {
    Today,
    Upcoming,
    Going,
    Hosting,
    Past,
    /// Unscoped listing, used for search.
    #[default]
    All,
}

/// Filters shared by every view: tags are OR-semantics (an event matches if
/// it carries any selected tag); the date restricts to events intersecting
/// that calendar day in the caller's timezone.
#[derive(Debug, Clone)]
pub struct EventFilters {
    pub tags: Vec<Uuid>,
    pub date: Option<NaiveDate>,
    pub timezone: Tz,
}

impl Default for EventFilters {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            date: None,
            timezone: chrono_tz::UTC,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    StartAsc,
    /// Most recently ended first; only the `past` view uses this.
    StartDesc,
}

/// The composed predicate set, ordering, and page window for one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    /// Restrict to these event ids (tag and RSVP filters, intersected).
    pub id_set: Option<Vec<Uuid>>,
    /// Hosting scope: created by the profile OR id in the co-host set.
    pub created_by_or_in: Option<(Uuid, Vec<Uuid>)>,
    /// The interval must intersect `[day_start, day_end)`.
    pub day: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Start instant within `[from, to)` (the `today` view).
    pub starts_within: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Start instant strictly after this (the `upcoming` view).
    pub starts_after: Option<DateTime<Utc>>,
    /// End instant strictly before this (the `past` view).
    pub ends_before: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub offset: u64,
    pub limit: u64,
}

impl QueryPlan {
    fn unscoped(page: u32) -> Self {
        Self {
            id_set: None,
            created_by_or_in: None,
            day: None,
            starts_within: None,
            starts_after: None,
            ends_before: None,
            order: SortOrder::StartAsc,
            offset: u64::from(page) * u64::from(EVENTS_PER_PAGE),
            limit: u64::from(EVENTS_PER_PAGE),
        }
    }

    /// Whether an event satisfies every predicate of this plan. The
    /// in-memory store evaluates plans with this; Postgres compiles the
    /// same predicates to SQL.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ids) = &self.id_set {
            if !ids.contains(&event.id) {
                return false;
            }
        }
        if let Some((creator, co_hosted)) = &self.created_by_or_in {
            if event.created_by != *creator && !co_hosted.contains(&event.id) {
                return false;
            }
        }
        if let Some((day_start, day_end)) = self.day {
            if !(event.start_at < day_end && event.end_at > day_start) {
                return false;
            }
        }
        if let Some((from, to)) = self.starts_within {
            if !(event.start_at >= from && event.start_at < to) {
                return false;
            }
        }
        if let Some(after) = self.starts_after {
            if event.start_at <= after {
                return false;
            }
        }
        if let Some(before) = self.ends_before {
            if event.end_at >= before {
                return false;
            }
        }
        true
    }

    /// Plan ordering, with the event id as tiebreak so pages are stable.
    pub fn compare(&self, a: &Event, b: &Event) -> Ordering {
        let by_start = match self.order {
            SortOrder::StartAsc => a.start_at.cmp(&b.start_at),
            SortOrder::StartDesc => b.start_at.cmp(&a.start_at),
        };
        by_start.then_with(|| a.id.cmp(&b.id))
    }
}

/// One fetched page plus whether more pages may exist. A page is full
/// exactly when the store returned `EVENTS_PER_PAGE` rows.
#[derive(Debug, Clone)]
pub struct EventPage {
    pub events: Vec<EventRecord>,
    pub has_more: bool,
}

impl EventPage {
    pub fn empty() -> Self {
        Self {
            events: Vec::new(),
            has_more: false,
        }
    }
}

/// Composes query plans and executes them through the injected store.
pub struct QueryPlanner<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for QueryPlanner<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: EventStore + ?Sized> QueryPlanner<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Compose the predicate set for one page. `Ok(None)` means the result
    /// is known to be empty without querying the events table: no event
    /// carries a selected tag, or a membership view has no actor/rows.
    ///
    /// `now` is the caller's wall clock; the planner never reads a clock of
    /// its own, which keeps the time-scoped views deterministic in tests.
    pub async fn plan(
        &self,
        view: EventView,
        filters: &EventFilters,
        actor: Option<Uuid>,
        page: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<QueryPlan>, StoreError> {
        let mut plan = QueryPlan::unscoped(page);
        let mut id_set: Option<Vec<Uuid>> = None;

        if !filters.tags.is_empty() {
            let tagged = self.store.event_ids_with_any_tag(&filters.tags).await?;
            if tagged.is_empty() {
                return Ok(None);
            }
            id_set = Some(tagged);
        }

        if let Some(date) = filters.date {
            plan.day = Some(local_day_bounds(date, filters.timezone));
        }

        match view {
            EventView::Today => {
                plan.starts_within =
                    Some(local_day_bounds(now.with_timezone(&filters.timezone).date_naive(), filters.timezone));
            }
            EventView::Upcoming => plan.starts_after = Some(now),
            EventView::Going => {
                let Some(profile_id) = actor else {
                    return Ok(None);
                };
                let going = self.store.rsvp_event_ids(profile_id).await?;
                if going.is_empty() {
                    return Ok(None);
                }
                id_set = match id_set {
                    Some(ids) => {
                        let keep: HashSet<Uuid> = going.into_iter().collect();
                        let both: Vec<Uuid> = ids.into_iter().filter(|id| keep.contains(id)).collect();
                        if both.is_empty() {
                            return Ok(None);
                        }
                        Some(both)
                    }
                    None => Some(going),
                };
            }
            EventView::Hosting => {
                let Some(profile_id) = actor else {
                    return Ok(None);
                };
                let co_hosted = self.store.co_host_event_ids(profile_id).await?;
                plan.created_by_or_in = Some((profile_id, co_hosted));
            }
            EventView::Past => {
                plan.ends_before = Some(now);
                plan.order = SortOrder::StartDesc;
            }
            EventView::All => {}
        }

        plan.id_set = id_set;
        Ok(Some(plan))
    }

    /// Fetch one page and denormalize it. Any store error aborts the whole
    /// page; partial results are never returned as if complete.
    pub async fn fetch_page(
        &self,
        view: EventView,
        filters: &EventFilters,
        actor: Option<Uuid>,
        page: u32,
        now: DateTime<Utc>,
    ) -> Result<EventPage, StoreError> {
        let Some(plan) = self.plan(view, filters, actor, page, now).await? else {
            return Ok(EventPage::empty());
        };

        let events = self.store.fetch_events(&plan).await?;
        let has_more = events.len() as u64 == plan.limit;
        let records = self.denormalize(events).await?;

        Ok(EventPage {
            events: records,
            has_more,
        })
    }

    /// Count events matching the same predicate stages as [`fetch_page`],
    /// for badge display. Sharing the plan keeps counts and lists from
    /// diverging.
    pub async fn count(
        &self,
        view: EventView,
        filters: &EventFilters,
        actor: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        match self.plan(view, filters, actor, 0, now).await? {
            Some(plan) => self.store.count_events(&plan).await,
            None => Ok(0),
        }
    }

    /// Resolve location display fields and tag lists for a fetched page.
    async fn denormalize(&self, events: Vec<Event>) -> Result<Vec<EventRecord>, StoreError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let location_ids: Vec<Uuid> = {
            let mut seen = HashSet::new();
            events
                .iter()
                .filter_map(|e| e.location_id)
                .filter(|id| seen.insert(*id))
                .collect()
        };
        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();

        let locations: HashMap<Uuid, LocationDisplay> = self
            .store
            .locations_by_ids(&location_ids)
            .await?
            .into_iter()
            .map(|l| (l.id, l.display()))
            .collect();
        let mut tags = self.store.tags_for_events(&event_ids).await?;

        Ok(events
            .into_iter()
            .map(|event| {
                let location = event.location_id.and_then(|id| locations.get(&id).cloned());
                let tags = tags.remove(&event.id).unwrap_or_default();
                EventRecord {
                    event,
                    location,
                    tags,
                }
            })
            .collect())
    }
}
