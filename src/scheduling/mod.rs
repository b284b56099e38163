//! Event scheduling core: availability/overlap validation, filtered query
//! planning, and incremental pagination state.

pub mod availability;
pub mod interval;
pub mod pager;
pub mod planner;

pub use availability::{check_overlap, interval_is_bookable, validate_availability, Verdict};
pub use pager::{EventPager, PagerState};
pub use planner::{EventFilters, EventPage, EventView, QueryPlan, QueryPlanner, EVENTS_PER_PAGE};
