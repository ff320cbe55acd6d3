//! Storage seams for entries and approval records.
//!
//! The lifecycle manager only talks to the data store through these traits,
//! so any backend that can answer the queries below (SQLite, an in-memory map
//! in tests) can sit underneath it.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::entry::{Entry, EntryPatch};
use crate::types::{ApprovalStatus, EntryId, OwnerId};

/// A foreign reference an entry row can violate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceField {
    Project,
    Category,
    Parent,
}

impl ReferenceField {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project_ref",
            Self::Category => "category_ref",
            Self::Parent => "parent_id",
        }
    }
}

impl fmt::Display for ReferenceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failures reported by a data store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The targeted row does not exist.
    #[error("row not found")]
    NotFound,

    /// A single-row query matched more than one row.
    #[error("expected at most one row, found {count}")]
    MultipleRows { count: usize },

    /// A foreign reference points at nothing.
    #[error("invalid reference in {field}")]
    InvalidReference { field: ReferenceField },

    /// The store already holds an open entry of this mode for the owner.
    #[error("an open entry of this mode already exists")]
    OpenEntryExists,

    /// The store rejected a block overlapping one of its siblings.
    #[error("block overlaps a sibling")]
    BlockOverlap,

    /// Any other backend failure.
    #[error("store backend failure")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Entry persistence with the mode-specific queries the lifecycle needs.
pub trait EntryRepository {
    /// The owner's open simple entry, if any.
    fn active_simple(&self, owner: &OwnerId) -> Result<Option<Entry>, StoreError>;

    /// The owner's open day entry, if any.
    fn active_day(&self, owner: &OwnerId) -> Result<Option<Entry>, StoreError>;

    /// Blocks under `day_id` owned by `owner`, ordered by start ascending.
    fn blocks_for_day(&self, day_id: &EntryId, owner: &OwnerId) -> Result<Vec<Entry>, StoreError>;

    /// Entries of `owner` starting within `[from, to)`, ordered by start.
    fn list_between(
        &self,
        owner: &OwnerId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Entry>, StoreError>;

    fn get(&self, id: &EntryId) -> Result<Option<Entry>, StoreError>;

    /// Stores a new entry and returns it as persisted.
    fn insert(&self, entry: &Entry) -> Result<Entry, StoreError>;

    /// Applies `patch` and returns the updated row.
    fn update(&self, id: &EntryId, patch: &EntryPatch) -> Result<Entry, StoreError>;

    fn delete(&self, id: &EntryId) -> Result<(), StoreError>;
}

/// Read access to the externally owned weekly approval records.
pub trait ApprovalLookup {
    /// Status for the week starting on `week_start`, `None` if no record exists.
    fn approval_status(
        &self,
        owner: &OwnerId,
        week_start: NaiveDate,
    ) -> Result<Option<ApprovalStatus>, StoreError>;
}
