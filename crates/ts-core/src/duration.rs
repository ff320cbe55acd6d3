//! Elapsed-minute calculation.

use chrono::{DateTime, Utc};

const MS_PER_MINUTE: i64 = 60_000;

/// Returns the whole minutes between `start` and `end`, rounded half-up.
///
/// `None` when the entry is still open.
pub fn compute(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Option<i64> {
    end.map(|end| elapsed_minutes(start, end))
}

/// Rounds `end - start` to the nearest minute, halves rounding towards +inf.
pub fn elapsed_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let ms = (end - start).num_milliseconds();
    (ms + MS_PER_MINUTE / 2).div_euclid(MS_PER_MINUTE)
}
