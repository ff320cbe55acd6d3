//! Core domain logic for the timesheet.
//!
//! This crate contains the fundamental types and logic for:
//! - Duration: rounding elapsed time to whole minutes
//! - Intervals: keeping blocks inside their day and apart from each other
//! - Gate: the weekly approval lock on simple entries
//! - Lifecycle: timers, days, blocks and plain entries over a repository

pub mod duration;
pub mod entry;
pub mod error;
pub mod gate;
pub mod interval;
pub mod lifecycle;
pub mod repository;
pub mod types;

#[cfg(test)]
mod memory;

pub use entry::{Entry, EntryKind, EntryPatch};
pub use error::{EntryError, ErrorClass, ErrorReport, Operation};
pub use gate::{GateError, LockDecision, MutationGate, week_start};
pub use interval::{BoundaryViolation, ConflictingBlock, Interval};
pub use lifecycle::{
    DaySummary, EntryChanges, EntryDetails, EntryLifecycle, NewBlock, NewEntry, StartDay, Status,
};
pub use repository::{ApprovalLookup, EntryRepository, ReferenceField, StoreError};
pub use types::{ApprovalStatus, CategoryRef, EntryId, EntryMode, OwnerId, ProjectRef, ValidationError};
