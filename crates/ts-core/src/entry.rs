//! Entries - the recorded units of worked time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interval::Interval;
use crate::types::{CategoryRef, EntryId, EntryMode, OwnerId, ProjectRef};

/// What kind of entry a row is, with the parent link carried only by blocks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum EntryKind {
    /// Timer-driven or manually recorded task.
    Simple,
    /// Container spanning a working day.
    Day,
    /// Sub-interval nested in a day.
    Block { parent_id: EntryId },
}

impl EntryKind {
    /// The flat mode stored alongside the parent column.
    #[must_use]
    pub const fn mode(&self) -> EntryMode {
        match self {
            Self::Simple => EntryMode::Simple,
            Self::Day => EntryMode::Day,
            Self::Block { .. } => EntryMode::Block,
        }
    }

    /// The parent day, for blocks.
    pub const fn parent_id(&self) -> Option<&EntryId> {
        match self {
            Self::Block { parent_id } => Some(parent_id),
            Self::Simple | Self::Day => None,
        }
    }
}

/// One row of recorded time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    pub id: EntryId,

    pub owner_id: OwnerId,

    #[serde(flatten)]
    pub kind: EntryKind,

    pub start_time: DateTime<Utc>,

    /// Unset while the entry is open.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,

    /// Derived from start/end; unset while open.
    #[serde(default)]
    pub duration_minutes: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_ref: Option<ProjectRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_ref: Option<CategoryRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Entry {
    /// Creates an open entry with a fresh ID, stamped at `now`.
    pub fn open(
        owner_id: OwnerId,
        kind: EntryKind,
        start_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            owner_id,
            kind,
            start_time,
            end_time: None,
            duration_minutes: None,
            project_ref: None,
            category_ref: None,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> EntryMode {
        self.kind.mode()
    }

    pub const fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// The closed interval of this entry, if it has an end.
    pub fn interval(&self) -> Option<Interval> {
        self.end_time.map(|end| Interval::new(self.start_time, end))
    }
}

/// A partial update of an entry.
///
/// Outer `None` leaves a field untouched; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<Option<DateTime<Utc>>>,
    pub duration_minutes: Option<Option<i64>>,
    pub project_ref: Option<Option<ProjectRef>>,
    pub category_ref: Option<Option<CategoryRef>>,
    pub description: Option<Option<String>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl EntryPatch {
    /// Applies the patch to an in-memory entry.
    pub fn apply_to(&self, entry: &mut Entry) {
        if let Some(start) = self.start_time {
            entry.start_time = start;
        }
        if let Some(end) = self.end_time {
            entry.end_time = end;
        }
        if let Some(duration) = self.duration_minutes {
            entry.duration_minutes = duration;
        }
        if let Some(project) = &self.project_ref {
            entry.project_ref.clone_from(project);
        }
        if let Some(category) = &self.category_ref {
            entry.category_ref.clone_from(category);
        }
        if let Some(description) = &self.description {
            entry.description.clone_from(description);
        }
        if let Some(updated_at) = self.updated_at {
            entry.updated_at = updated_at;
        }
    }
}
