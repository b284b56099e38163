//! Incremental pagination state for an event listing.
//!
//! The pager owns the accumulated results, the next page number, and the
//! `has_more` flag for one view. Loads are suppressed while a page is in
//! flight, and every filter change bumps an epoch so a stale in-flight
//! response is discarded instead of appended.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::EventRecord;
use crate::store::{EventStore, StoreError};

use super::planner::{EventFilters, EventPage, EventView, QueryPlanner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerState {
    /// Nothing fetched yet (also the post-reset state).
    Idle,
    /// First page in flight.
    Loading,
    /// At least one page applied; more may exist.
    Loaded,
    /// A follow-up page in flight; prior results stay visible.
    LoadingMore,
    /// The last page was short; terminal until a reset.
    Exhausted,
}

/// A ticket for one in-flight page fetch. Carries everything the fetch
/// needs plus the epoch it belongs to.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub epoch: u64,
    pub view: EventView,
    pub filters: EventFilters,
    pub actor: Option<Uuid>,
    pub page: u32,
}

pub struct EventPager {
    view: EventView,
    filters: EventFilters,
    actor: Option<Uuid>,
    state: PagerState,
    page: u32,
    epoch: u64,
    has_more: bool,
    events: Vec<EventRecord>,
}

impl EventPager {
    pub fn new(view: EventView, filters: EventFilters, actor: Option<Uuid>) -> Self {
        Self {
            view,
            filters,
            actor,
            state: PagerState::Idle,
            page: 0,
            epoch: 0,
            has_more: true,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> PagerState {
        self.state
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, PagerState::Loading | PagerState::LoadingMore)
    }

    /// Begin fetching the next page. Returns `None` while a fetch is
    /// already in flight or the listing is exhausted, so duplicate and
    /// out-of-order page requests never start.
    pub fn begin_load(&mut self) -> Option<PageRequest> {
        match self.state {
            PagerState::Idle => self.state = PagerState::Loading,
            PagerState::Loaded => self.state = PagerState::LoadingMore,
            PagerState::Loading | PagerState::LoadingMore | PagerState::Exhausted => return None,
        }
        Some(PageRequest {
            epoch: self.epoch,
            view: self.view,
            filters: self.filters.clone(),
            actor: self.actor,
            page: self.page,
        })
    }

    /// Apply a fetched page. A response from a previous epoch (the filters
    /// changed while it was in flight) is discarded; the return value says
    /// whether the page was applied. Page 0 replaces the accumulated list,
    /// later pages append.
    pub fn complete(&mut self, epoch: u64, page: EventPage) -> bool {
        if epoch != self.epoch {
            tracing::debug!(stale = epoch, current = self.epoch, "discarding stale page");
            return false;
        }

        if self.page == 0 {
            self.events = page.events;
        } else {
            self.events.extend(page.events);
        }
        self.page += 1;
        self.has_more = page.has_more;
        self.state = if page.has_more {
            PagerState::Loaded
        } else {
            PagerState::Exhausted
        };
        true
    }

    /// A fetch failed: return to the prior resting state without consuming
    /// the page number, so the caller can retry.
    pub fn fail(&mut self, epoch: u64) {
        if epoch != self.epoch {
            return;
        }
        self.state = if self.page == 0 {
            PagerState::Idle
        } else {
            PagerState::Loaded
        };
    }

    /// Discard accumulated results and start over. Called on any filter
    /// change; also invalidates whatever is still in flight.
    pub fn reset(&mut self) {
        self.events.clear();
        self.page = 0;
        self.has_more = true;
        self.state = PagerState::Idle;
        self.epoch += 1;
    }

    pub fn set_view(&mut self, view: EventView) {
        if self.view != view {
            self.view = view;
            self.reset();
        }
    }

    pub fn set_filters(&mut self, filters: EventFilters) {
        self.filters = filters;
        self.reset();
    }

    /// Drive one load through the planner: begin, fetch, apply. Returns
    /// whether a page was applied (false when suppressed or exhausted).
    pub async fn load_more<S>(
        &mut self,
        planner: &QueryPlanner<S>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>
    where
        S: EventStore + ?Sized,
    {
        let Some(req) = self.begin_load() else {
            return Ok(false);
        };
        match planner
            .fetch_page(req.view, &req.filters, req.actor, req.page, now)
            .await
        {
            Ok(page) => Ok(self.complete(req.epoch, page)),
            Err(err) => {
                self.fail(req.epoch);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryEventStore;
    use chrono::{TimeDelta, TimeZone};
    use std::sync::Arc;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    async fn store_with_events(n: i64) -> Arc<MemoryEventStore> {
        let store = Arc::new(MemoryEventStore::new());
        let room = store.add_location("Sihl", true).await;
        let now = noon();
        for i in 0..n {
            store
                .add_event_at(
                    format!("Event {i}"),
                    room,
                    now + TimeDelta::hours(i),
                    now + TimeDelta::hours(i) + TimeDelta::minutes(30),
                )
                .await;
        }
        store
    }

    #[tokio::test]
    async fn loads_pages_until_exhausted() {
        let store = store_with_events(12).await;
        let planner = QueryPlanner::new(store);
        let mut pager = EventPager::new(EventView::All, EventFilters::default(), None);

        assert_eq!(pager.state(), PagerState::Idle);
        assert!(pager.load_more(&planner, noon()).await.unwrap());
        assert_eq!(pager.state(), PagerState::Loaded);
        assert_eq!(pager.events().len(), 5);

        assert!(pager.load_more(&planner, noon()).await.unwrap());
        assert_eq!(pager.events().len(), 10);

        assert!(pager.load_more(&planner, noon()).await.unwrap());
        assert_eq!(pager.events().len(), 12);
        assert_eq!(pager.state(), PagerState::Exhausted);
        assert!(!pager.has_more());

        // Terminal until a reset.
        assert!(!pager.load_more(&planner, noon()).await.unwrap());
        assert_eq!(pager.events().len(), 12);
    }

    #[tokio::test]
    async fn concurrent_loads_are_suppressed() {
        let store = store_with_events(6).await;
        let planner = QueryPlanner::new(store);
        let mut pager = EventPager::new(EventView::All, EventFilters::default(), None);

        let req = pager.begin_load().unwrap();
        // A second begin while the first is in flight is refused.
        assert!(pager.begin_load().is_none());
        assert_eq!(pager.state(), PagerState::Loading);

        let page = planner
            .fetch_page(req.view, &req.filters, req.actor, req.page, noon())
            .await
            .unwrap();
        assert!(pager.complete(req.epoch, page));
        assert_eq!(pager.state(), PagerState::Loaded);
    }

    #[tokio::test]
    async fn reset_discards_results_and_stale_responses() {
        let store = store_with_events(8).await;
        let planner = QueryPlanner::new(store);
        let mut pager = EventPager::new(EventView::All, EventFilters::default(), None);

        pager.load_more(&planner, noon()).await.unwrap();
        assert_eq!(pager.events().len(), 5);

        // A page goes in flight, then the filters change underneath it.
        let req = pager.begin_load().unwrap();
        let page = planner
            .fetch_page(req.view, &req.filters, req.actor, req.page, noon())
            .await
            .unwrap();
        pager.reset();

        assert!(pager.events().is_empty());
        assert!(pager.has_more());
        assert_eq!(pager.state(), PagerState::Idle);

        // The stale response arrives and is discarded.
        assert!(!pager.complete(req.epoch, page));
        assert!(pager.events().is_empty());
    }

    #[tokio::test]
    async fn changing_the_view_resets() {
        let store = store_with_events(3).await;
        let planner = QueryPlanner::new(store);
        let mut pager = EventPager::new(EventView::All, EventFilters::default(), None);

        pager.load_more(&planner, noon()).await.unwrap();
        assert!(!pager.events().is_empty());

        pager.set_view(EventView::Past);
        assert!(pager.events().is_empty());
        assert!(pager.has_more());
        assert_eq!(pager.state(), PagerState::Idle);

        // Setting the same view again is a no-op.
        pager.load_more(&planner, noon()).await.unwrap();
        let len = pager.events().len();
        pager.set_view(EventView::Past);
        assert_eq!(pager.events().len(), len);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_prior_results_and_allows_retry() {
        let store = store_with_events(7).await;
        let planner = QueryPlanner::new(Arc::clone(&store));
        let mut pager = EventPager::new(EventView::All, EventFilters::default(), None);

        pager.load_more(&planner, noon()).await.unwrap();
        assert_eq!(pager.events().len(), 5);

        store.fail_with(StoreError::Unavailable("connection reset".into()));
        let err = pager.load_more(&planner, noon()).await;
        assert!(err.is_err());
        assert_eq!(pager.events().len(), 5);
        assert_eq!(pager.state(), PagerState::Loaded);

        store.recover();
        assert!(pager.load_more(&planner, noon()).await.unwrap());
        assert_eq!(pager.events().len(), 7);
    }
}
