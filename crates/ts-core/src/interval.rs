//! Boundary and overlap checks for blocks inside a day.
//!
//! All intervals are half-open: `[start, end)`. Two blocks that share only an
//! endpoint do not overlap.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::Entry;
use crate::types::EntryId;

/// A half-open time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether two intervals share at least one instant.
    ///
    /// An open-ended `other` (no end) extends forever.
    pub fn overlaps(&self, other_start: DateTime<Utc>, other_end: Option<DateTime<Utc>>) -> bool {
        self.start < other_end.unwrap_or(DateTime::<Utc>::MAX_UTC) && self.end > other_start
    }
}

/// Why a block does not fit inside its day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoundaryViolation {
    /// The block starts before the day or ends after a closed day.
    OutOfBounds,
    /// The block ends at or before its start.
    InvalidRange,
    /// The day is still open and the block ends in the future.
    FutureEnd,
}

impl BoundaryViolation {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfBounds => "OUT_OF_BOUNDS",
            Self::InvalidRange => "INVALID_RANGE",
            Self::FutureEnd => "FUTURE_END",
        }
    }
}

impl fmt::Display for BoundaryViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::OutOfBounds => "block lies outside the day",
            Self::InvalidRange => "block must end after it starts",
            Self::FutureEnd => "block cannot end in the future while the day is open",
        };
        write!(f, "{message}")
    }
}

/// A sibling block that collides with a candidate interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictingBlock {
    pub id: EntryId,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Checks that `block` lies within `day`, evaluated at `now`.
pub fn validate_boundaries(
    block: &Interval,
    day: &Entry,
    now: DateTime<Utc>,
) -> Result<(), BoundaryViolation> {
    if block.start < day.start_time {
        return Err(BoundaryViolation::OutOfBounds);
    }
    if block.end <= block.start {
        return Err(BoundaryViolation::InvalidRange);
    }
    match day.end_time {
        None if block.end > now => Err(BoundaryViolation::FutureEnd),
        Some(day_end) if block.end > day_end => Err(BoundaryViolation::OutOfBounds),
        _ => Ok(()),
    }
}

/// Returns every sibling whose interval overlaps `candidate`.
///
/// The sibling with id `exclude` (the block being updated) is skipped.
pub fn check_overlap(
    candidate: &Interval,
    siblings: &[Entry],
    exclude: Option<&EntryId>,
) -> Vec<ConflictingBlock> {
    siblings
        .iter()
        .filter(|sibling| exclude != Some(&sibling.id))
        .filter(|sibling| candidate.overlaps(sibling.start_time, sibling.end_time))
        .map(|sibling| ConflictingBlock {
            id: sibling.id.clone(),
            start_time: sibling.start_time,
            end_time: sibling.end_time,
        })
        .collect()
}
