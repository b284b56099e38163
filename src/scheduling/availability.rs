//! Booking validation: blackout windows and event overlap.
//!
//! Both checks are advisory. They run while a booking form is being edited
//! and once more at submission time, but nothing prevents two actors from
//! passing the check simultaneously; the store's own constraints are the
//! last line of defense.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::AvailabilityWindow;
use crate::store::EventStore;

use super::interval::{blackout_conflicts, overlaps};

/// Outcome of a booking check. Anything other than `Clear` blocks
/// submission; the variants carry distinct user-facing messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Clear,
    /// The location has a blackout window covering part of the interval.
    Unavailable,
    /// Another event already occupies the interval.
    Booked { title: String },
    /// The overlap scan itself failed; fail closed rather than allow a
    /// booking we could not verify.
    Unverified,
}

impl Verdict {
    pub fn is_clear(&self) -> bool {
        matches!(self, Verdict::Clear)
    }

    /// The user-facing message for a blocking verdict.
    pub fn message(&self) -> Option<String> {
        match self {
            Verdict::Clear => None,
            Verdict::Unavailable => {
                Some("location not available during this time period".to_string())
            }
            Verdict::Booked { title } => Some(format!(
                "room already booked for this time (conflict with \"{title}\")"
            )),
            Verdict::Unverified => {
                Some("could not verify room availability, please try again".to_string())
            }
        }
    }
}

/// Reject inverted and zero-length intervals before any conflict math runs.
pub fn interval_is_bookable(start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    start < end
}

/// Check a candidate interval against a location's availability windows.
///
/// Pure function of its inputs: the caller pre-fetches the windows and
/// re-runs this whenever location, start, or end changes. Only blackout
/// windows (`is_available = false`) can conflict; explicit open slots are
/// ignored.
pub fn validate_availability(
    windows: &[AvailabilityWindow],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Verdict {
    let blocked = windows
        .iter()
        .filter(|w| !w.is_available)
        .any(|w| blackout_conflicts(start, end, w.start_at, w.end_at));

    if blocked {
        Verdict::Unavailable
    } else {
        Verdict::Clear
    }
}

/// Scan the location's booked events for an overlap with `[start, end)`.
///
/// `exclude` skips the event being edited so it does not conflict with
/// itself. Touching endpoints do not conflict, so back-to-back bookings are
/// legal. A failed fetch yields `Verdict::Unverified` instead of silently
/// allowing the booking.
pub async fn check_overlap<S>(
    store: &S,
    location_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude: Option<Uuid>,
) -> Verdict
where
    S: EventStore + ?Sized,
{
    let booked = match store.events_at_location(location_id, exclude).await {
        Ok(events) => events,
        Err(err) => {
            tracing::warn!(error = %err, %location_id, "overlap scan failed, blocking booking");
            return Verdict::Unverified;
        }
    };

    match booked
        .iter()
        .find(|e| overlaps(e.start_at, e.end_at, start, end))
    {
        Some(conflict) => Verdict::Booked {
            title: conflict.title.clone(),
        },
        None => Verdict::Clear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryEventStore;
    use crate::store::StoreError;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, m, 0).unwrap()
    }

    fn blackout(start: DateTime<Utc>, end: DateTime<Utc>) -> AvailabilityWindow {
        AvailabilityWindow {
            id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
            start_at: start,
            end_at: end,
            is_available: false,
        }
    }

    #[test]
    fn booking_inside_a_blackout_is_unavailable() {
        let windows = vec![blackout(at(9, 0), at(10, 0))];
        let verdict = validate_availability(&windows, at(9, 30), at(9, 45));
        assert_eq!(verdict, Verdict::Unavailable);
        assert_eq!(
            verdict.message().unwrap(),
            "location not available during this time period"
        );
    }

    #[test]
    fn booking_that_touches_a_blackout_is_clear() {
        let windows = vec![blackout(at(9, 0), at(10, 0))];
        assert!(validate_availability(&windows, at(8, 0), at(9, 0)).is_clear());
        assert!(validate_availability(&windows, at(10, 0), at(11, 0)).is_clear());
    }

    #[test]
    fn open_windows_never_conflict() {
        let mut open = blackout(at(9, 0), at(10, 0));
        open.is_available = true;
        assert!(validate_availability(&[open], at(9, 15), at(9, 45)).is_clear());
    }

    #[test]
    fn inverted_and_zero_length_intervals_are_not_bookable() {
        assert!(!interval_is_bookable(at(10, 0), at(9, 0)));
        assert!(!interval_is_bookable(at(10, 0), at(10, 0)));
        assert!(interval_is_bookable(at(9, 0), at(10, 0)));
    }

    #[tokio::test]
    async fn overlap_names_the_conflicting_event() {
        let store = MemoryEventStore::new();
        let location = store.add_location("Aare", true).await;
        store
            .add_event_at("Standup", location, at(10, 0), at(10, 30))
            .await;

        // Adjacent booking is legal.
        let verdict = check_overlap(&store, location, at(10, 30), at(11, 0), None).await;
        assert!(verdict.is_clear());

        // Overlapping booking names the conflict.
        let verdict = check_overlap(&store, location, at(10, 15), at(10, 45), None).await;
        assert_eq!(
            verdict,
            Verdict::Booked {
                title: "Standup".to_string()
            }
        );
        assert!(verdict.message().unwrap().contains("Standup"));
    }

    #[tokio::test]
    async fn editing_an_event_does_not_conflict_with_itself() {
        let store = MemoryEventStore::new();
        let location = store.add_location("Aare", true).await;
        let id = store
            .add_event_at("Standup", location, at(10, 0), at(10, 30))
            .await;

        let verdict = check_overlap(&store, location, at(10, 0), at(10, 45), Some(id)).await;
        assert!(verdict.is_clear());
    }

    #[tokio::test]
    async fn failed_scan_fails_closed() {
        let store = MemoryEventStore::new();
        let location = store.add_location("Aare", true).await;
        store.fail_with(StoreError::Unavailable("connection reset".into()));

        let verdict = check_overlap(&store, location, at(10, 0), at(11, 0), None).await;
        assert_eq!(verdict, Verdict::Unverified);
    }
}
