//! Shared half-open interval math for booking checks and day filters.
//!
//! Booked intervals are `[start, end)`: the end instant is excluded so
//! back-to-back bookings never conflict.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use chrono_tz::Tz;

/// Classic half-open overlap test: `[a0, a1)` and `[b0, b1)` share at least
/// one instant iff each starts before the other ends.
pub fn overlaps(
    a0: DateTime<Utc>,
    a1: DateTime<Utc>,
    b0: DateTime<Utc>,
    b1: DateTime<Utc>,
) -> bool {
    a0 < b1 && b0 < a1
}

/// Conflict test between a candidate booking `[start, end)` and a blackout
/// window `[w_start, w_end)`. A conflict exists when the candidate starts
/// inside the window, ends inside it, or fully contains it. Touching
/// endpoints do not conflict.
pub fn blackout_conflicts(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    w_start: DateTime<Utc>,
    w_end: DateTime<Utc>,
) -> bool {
    (start >= w_start && start < w_end)
        || (end > w_start && end <= w_end)
        || (start <= w_start && end >= w_end)
}

/// The UTC bounds `[midnight, next midnight)` of a calendar date in the
/// given timezone. DST gaps and folds resolve to the earliest valid local
/// instant.
pub fn local_day_bounds(date: NaiveDate, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let day_start = local_midnight(date, tz);
    let day_end = local_midnight(date + TimeDelta::days(1), tz);
    (day_start, day_end)
}

fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    use chrono::offset::LocalResult;
    use chrono::TimeZone;

    let naive = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // Midnight skipped by a DST gap: the day starts when the gap ends.
        LocalResult::None => tz
            .from_local_datetime(&(naive + TimeDelta::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, m, 0).unwrap()
    }

    #[test]
    fn adjacent_intervals_do_not_overlap() {
        assert!(!overlaps(at(10, 0), at(10, 30), at(10, 30), at(11, 0)));
        assert!(!overlaps(at(10, 30), at(11, 0), at(10, 0), at(10, 30)));
    }

    #[test]
    fn partial_and_contained_intervals_overlap() {
        assert!(overlaps(at(10, 15), at(10, 45), at(10, 0), at(10, 30)));
        assert!(overlaps(at(10, 0), at(11, 0), at(10, 15), at(10, 30)));
        assert!(overlaps(at(10, 15), at(10, 30), at(10, 0), at(11, 0)));
    }

    #[test]
    fn blackout_conflict_covers_all_three_cases() {
        let (w0, w1) = (at(9, 0), at(10, 0));
        // Starts inside the window.
        assert!(blackout_conflicts(at(9, 30), at(10, 30), w0, w1));
        // Ends inside the window.
        assert!(blackout_conflicts(at(8, 30), at(9, 30), w0, w1));
        // Contains the window.
        assert!(blackout_conflicts(at(8, 0), at(11, 0), w0, w1));
    }

    #[test]
    fn touching_a_blackout_is_legal() {
        let (w0, w1) = (at(9, 0), at(10, 0));
        assert!(!blackout_conflicts(at(8, 0), at(9, 0), w0, w1));
        assert!(!blackout_conflicts(at(10, 0), at(11, 0), w0, w1));
    }

    #[test]
    fn local_day_bounds_honor_the_timezone() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let (start, end) = local_day_bounds(date, chrono_tz::Europe::Zurich);
        // Zurich is UTC+2 in June.
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 5, 31, 22, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 6, 1, 22, 0, 0).unwrap());
        assert_eq!(end - start, TimeDelta::days(1));
    }

    #[test]
    fn utc_day_bounds_are_midnight_to_midnight() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let (start, end) = local_day_bounds(date, chrono_tz::UTC);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap());
    }
}
