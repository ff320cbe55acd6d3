//! Entry lifecycle: timers, days, blocks and plain entries.
//!
//! Three independent state machines share one store:
//!
//! - simple: `absent -> start_timer -> running -> stop_timer -> absent`
//! - day: `absent -> start_day -> running -> end_day -> absent`
//! - block: created, moved and deleted inside a day
//!
//! Every operation is a read-validate-write sequence. The in-process checks
//! fail fast; a store that enforces the same rules (unique open entry per
//! owner and mode, non-overlapping siblings) turns a lost race into the same
//! error the check would have produced.
//!
//! Operations that depend on the current time come in pairs: `op` reads the
//! wall clock and delegates to `op_at`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::duration;
use crate::entry::{Entry, EntryKind, EntryPatch};
use crate::error::{EntryError, Operation};
use crate::gate::{LockDecision, MutationGate};
use crate::interval::{Interval, check_overlap, validate_boundaries};
use crate::repository::{ApprovalLookup, EntryRepository, ReferenceField, StoreError};
use crate::types::{CategoryRef, EntryId, EntryMode, OwnerId, ProjectRef};

/// Optional metadata attached to a new entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDetails {
    #[serde(default)]
    pub project_ref: Option<ProjectRef>,
    #[serde(default)]
    pub category_ref: Option<CategoryRef>,
    #[serde(default)]
    pub description: Option<String>,
}

impl EntryDetails {
    fn apply_to(self, entry: &mut Entry) {
        entry.project_ref = self.project_ref;
        entry.category_ref = self.category_ref;
        entry.description = self.description;
    }
}

/// Payload for opening a day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartDay {
    /// Back-dated start; defaults to now.
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub details: EntryDetails,
}

/// Payload for a new block inside the active day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBlock {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(flatten)]
    pub details: EntryDetails,
}

/// Payload for a manually recorded simple entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub details: EntryDetails,
}

/// Requested changes to a block or simple entry.
///
/// Reference and description fields use `Some(None)` to clear the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryChanges {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub project_ref: Option<Option<ProjectRef>>,
    pub category_ref: Option<Option<CategoryRef>>,
    pub description: Option<Option<String>>,
}

impl EntryChanges {
    const fn touches_times(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some()
    }

    fn into_patch(self, duration_minutes: Option<Option<i64>>, now: DateTime<Utc>) -> EntryPatch {
        EntryPatch {
            start_time: self.start_time,
            end_time: self.end_time.map(Some),
            duration_minutes,
            project_ref: self.project_ref,
            category_ref: self.category_ref,
            description: self.description,
            updated_at: Some(now),
        }
    }
}

/// A day together with its blocks, ordered by start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub day: Entry,
    pub blocks: Vec<Entry>,
}

/// What is currently running for an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub timer: Option<Entry>,
    pub day: Option<DaySummary>,
}

/// Orchestrates entry mutations over a repository and the approval gate.
pub struct EntryLifecycle<'a, R, A> {
    entries: &'a R,
    gate: MutationGate<'a, A>,
}

impl<'a, R: EntryRepository, A: ApprovalLookup> EntryLifecycle<'a, R, A> {
    pub const fn new(entries: &'a R, approvals: &'a A) -> Self {
        Self {
            entries,
            gate: MutationGate::new(approvals),
        }
    }

    // ========== Simple timer ==========

    pub fn start_timer(&self, owner: &OwnerId, details: EntryDetails) -> Result<Entry, EntryError> {
        self.start_timer_at(owner, details, Utc::now())
    }

    pub fn start_timer_at(
        &self,
        owner: &OwnerId,
        details: EntryDetails,
        now: DateTime<Utc>,
    ) -> Result<Entry, EntryError> {
        if let Some(running) = self.active_simple(owner)? {
            return Err(EntryError::TimerAlreadyRunning {
                entry: Box::new(running),
            });
        }

        let mut entry = Entry::open(owner.clone(), EntryKind::Simple, now, now);
        details.apply_to(&mut entry);
        let entry = self.insert_open(owner, &entry)?;
        tracing::debug!(entry_id = %entry.id, owner = %owner, "timer started");
        Ok(entry)
    }

    pub fn stop_timer(&self, owner: &OwnerId) -> Result<Entry, EntryError> {
        self.stop_timer_at(owner, Utc::now())
    }

    /// Closes the running timer. The stored duration is at least one minute.
    pub fn stop_timer_at(&self, owner: &OwnerId, now: DateTime<Utc>) -> Result<Entry, EntryError> {
        let running = self.active_simple(owner)?.ok_or(EntryError::NoActiveTimer)?;
        if now <= running.start_time {
            return Err(EntryError::InvalidTimeRange);
        }

        let minutes = duration::elapsed_minutes(running.start_time, now).max(1);
        let patch = EntryPatch {
            end_time: Some(Some(now)),
            duration_minutes: Some(Some(minutes)),
            updated_at: Some(now),
            ..EntryPatch::default()
        };
        let entry = self
            .entries
            .update(&running.id, &patch)
            .map_err(|err| missing_or_failure(&running.id, Operation::Update, err))?;
        tracing::debug!(entry_id = %entry.id, minutes, "timer stopped");
        Ok(entry)
    }

    // ========== Day ==========

    pub fn start_day(&self, owner: &OwnerId, request: StartDay) -> Result<Entry, EntryError> {
        self.start_day_at(owner, request, Utc::now())
    }

    pub fn start_day_at(
        &self,
        owner: &OwnerId,
        request: StartDay,
        now: DateTime<Utc>,
    ) -> Result<Entry, EntryError> {
        if let Some(active) = self.active_day(owner)? {
            return Err(EntryError::DayAlreadyActive {
                entry: Box::new(active),
            });
        }

        let start = request.start_time.unwrap_or(now);
        if start > now {
            return Err(EntryError::InvalidTimeRange);
        }

        let mut entry = Entry::open(owner.clone(), EntryKind::Day, start, now);
        request.details.apply_to(&mut entry);
        let entry = self.insert_open(owner, &entry)?;
        tracing::debug!(entry_id = %entry.id, start = %entry.start_time, "day started");
        Ok(entry)
    }

    pub fn end_day(&self, owner: &OwnerId) -> Result<DaySummary, EntryError> {
        self.end_day_at(owner, Utc::now())
    }

    /// Closes the active day. Its blocks are returned untouched.
    pub fn end_day_at(&self, owner: &OwnerId, now: DateTime<Utc>) -> Result<DaySummary, EntryError> {
        let active = self.active_day(owner)?.ok_or(EntryError::NoActiveDay)?;
        if now <= active.start_time {
            return Err(EntryError::InvalidTimeRange);
        }

        let patch = EntryPatch {
            end_time: Some(Some(now)),
            duration_minutes: Some(duration::compute(active.start_time, Some(now))),
            updated_at: Some(now),
            ..EntryPatch::default()
        };
        let day = self
            .entries
            .update(&active.id, &patch)
            .map_err(|err| missing_or_failure(&active.id, Operation::Update, err))?;
        let blocks = self.blocks_for_day(&day.id, owner)?;
        tracing::debug!(entry_id = %day.id, blocks = blocks.len(), "day ended");
        Ok(DaySummary { day, blocks })
    }

    // ========== Blocks ==========

    pub fn create_block(&self, owner: &OwnerId, request: NewBlock) -> Result<Entry, EntryError> {
        self.create_block_at(owner, request, Utc::now())
    }

    pub fn create_block_at(
        &self,
        owner: &OwnerId,
        request: NewBlock,
        now: DateTime<Utc>,
    ) -> Result<Entry, EntryError> {
        let day = self.active_day(owner)?.ok_or(EntryError::NoActiveDay)?;
        let interval = Interval::new(request.start_time, request.end_time);
        self.ensure_fits(&interval, &day, owner, None, now)?;

        let mut entry = Entry::open(
            owner.clone(),
            EntryKind::Block {
                parent_id: day.id.clone(),
            },
            request.start_time,
            now,
        );
        entry.end_time = Some(request.end_time);
        entry.duration_minutes = duration::compute(request.start_time, entry.end_time);
        request.details.apply_to(&mut entry);

        let entry = match self.entries.insert(&entry) {
            Ok(entry) => entry,
            Err(StoreError::BlockOverlap) => {
                return Err(self.overlap_race(Operation::Create, &day.id, owner, &interval, None));
            }
            Err(err) => return Err(store_failure(Operation::Create, err)),
        };
        tracing::debug!(entry_id = %entry.id, day_id = %day.id, "block created");
        Ok(entry)
    }

    pub fn update_block(
        &self,
        owner: &OwnerId,
        id: &EntryId,
        changes: EntryChanges,
    ) -> Result<Entry, EntryError> {
        self.update_block_at(owner, id, changes, Utc::now())
    }

    /// Moves or edits a block. The merged interval is re-validated against the
    /// parent day and the other blocks before anything is written.
    pub fn update_block_at(
        &self,
        owner: &OwnerId,
        id: &EntryId,
        changes: EntryChanges,
        now: DateTime<Utc>,
    ) -> Result<Entry, EntryError> {
        let block = self.owned(owner, id)?;
        let EntryKind::Block { parent_id } = &block.kind else {
            return Err(EntryError::InvalidEntryMode { mode: block.mode() });
        };
        let day = self.parent_day(parent_id, owner)?;

        let start = changes.start_time.unwrap_or(block.start_time);
        let end = changes
            .end_time
            .or(block.end_time)
            .ok_or(EntryError::InvalidTimeRange)?;
        let interval = Interval::new(start, end);
        self.ensure_fits(&interval, &day, owner, Some(&block.id), now)?;

        let duration = changes
            .touches_times()
            .then(|| duration::compute(start, Some(end)));
        let patch = changes.into_patch(duration, now);
        let entry = match self.entries.update(&block.id, &patch) {
            Ok(entry) => entry,
            Err(StoreError::BlockOverlap) => {
                return Err(self.overlap_race(
                    Operation::Update,
                    &day.id,
                    owner,
                    &interval,
                    Some(&block.id),
                ));
            }
            Err(err) => return Err(missing_or_failure(&block.id, Operation::Update, err)),
        };
        tracing::debug!(entry_id = %entry.id, "block updated");
        Ok(entry)
    }

    /// Deletes a block. Only ownership is checked.
    pub fn delete_block(&self, owner: &OwnerId, id: &EntryId) -> Result<(), EntryError> {
        let block = self.owned(owner, id)?;
        if block.mode() != EntryMode::Block {
            return Err(EntryError::InvalidEntryMode { mode: block.mode() });
        }
        self.entries
            .delete(&block.id)
            .map_err(|err| missing_or_failure(&block.id, Operation::Delete, err))?;
        tracing::debug!(entry_id = %block.id, "block deleted");
        Ok(())
    }

    // ========== Plain entries ==========

    pub fn create_entry(&self, owner: &OwnerId, request: NewEntry) -> Result<Entry, EntryError> {
        self.create_entry_at(owner, request, Utc::now())
    }

    /// Records a simple entry directly. Without an end it acts as a timer.
    pub fn create_entry_at(
        &self,
        owner: &OwnerId,
        request: NewEntry,
        now: DateTime<Utc>,
    ) -> Result<Entry, EntryError> {
        match request.end_time {
            Some(end) if end <= request.start_time => return Err(EntryError::InvalidTimeRange),
            Some(_) => {}
            None => {
                if let Some(running) = self.active_simple(owner)? {
                    return Err(EntryError::TimerAlreadyRunning {
                        entry: Box::new(running),
                    });
                }
            }
        }

        let mut entry = Entry::open(owner.clone(), EntryKind::Simple, request.start_time, now);
        entry.end_time = request.end_time;
        entry.duration_minutes = duration::compute(request.start_time, request.end_time);
        request.details.apply_to(&mut entry);
        let entry = self.insert_open(owner, &entry)?;
        tracing::debug!(entry_id = %entry.id, "entry created");
        Ok(entry)
    }

    /// Fetches an entry the owner may see.
    pub fn get_entry(&self, owner: &OwnerId, id: &EntryId) -> Result<Entry, EntryError> {
        self.owned(owner, id)
    }

    pub fn update_entry(
        &self,
        owner: &OwnerId,
        id: &EntryId,
        changes: EntryChanges,
    ) -> Result<Entry, EntryError> {
        self.update_entry_at(owner, id, changes, Utc::now())
    }

    /// Edits a simple entry, subject to the weekly approval lock on its
    /// current start.
    pub fn update_entry_at(
        &self,
        owner: &OwnerId,
        id: &EntryId,
        changes: EntryChanges,
        now: DateTime<Utc>,
    ) -> Result<Entry, EntryError> {
        let entry = self.owned(owner, id)?;
        self.ensure_unlocked(&entry)?;

        let start = changes.start_time.unwrap_or(entry.start_time);
        let end = changes.end_time.or(entry.end_time);
        if end.is_some_and(|end| end <= start) {
            return Err(EntryError::InvalidTimeRange);
        }

        let duration = changes
            .touches_times()
            .then(|| duration::compute(start, end));
        let patch = changes.into_patch(duration, now);
        let updated = self
            .entries
            .update(&entry.id, &patch)
            .map_err(|err| missing_or_failure(&entry.id, Operation::Update, err))?;
        tracing::debug!(entry_id = %updated.id, "entry updated");
        Ok(updated)
    }

    /// Deletes a simple entry, subject to the weekly approval lock.
    pub fn delete_entry(&self, owner: &OwnerId, id: &EntryId) -> Result<(), EntryError> {
        let entry = self.owned(owner, id)?;
        self.ensure_unlocked(&entry)?;
        self.entries
            .delete(&entry.id)
            .map_err(|err| missing_or_failure(&entry.id, Operation::Delete, err))?;
        tracing::debug!(entry_id = %entry.id, "entry deleted");
        Ok(())
    }

    // ========== Reads ==========

    /// The running timer and the active day with its blocks.
    pub fn status(&self, owner: &OwnerId) -> Result<Status, EntryError> {
        let timer = self.active_simple(owner)?;
        let day = match self.active_day(owner)? {
            Some(day) => {
                let blocks = self.blocks_for_day(&day.id, owner)?;
                Some(DaySummary { day, blocks })
            }
            None => None,
        };
        Ok(Status { timer, day })
    }

    /// Entries starting within `[from, to)`.
    pub fn list(
        &self,
        owner: &OwnerId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Entry>, EntryError> {
        if to <= from {
            return Err(EntryError::InvalidTimeRange);
        }
        self.entries
            .list_between(owner, from, to)
            .map_err(|err| store_failure(Operation::Fetch, err))
    }

    // ========== Helpers ==========

    fn active_simple(&self, owner: &OwnerId) -> Result<Option<Entry>, EntryError> {
        self.entries
            .active_simple(owner)
            .map_err(|err| store_failure(Operation::Fetch, err))
    }

    fn active_day(&self, owner: &OwnerId) -> Result<Option<Entry>, EntryError> {
        self.entries
            .active_day(owner)
            .map_err(|err| store_failure(Operation::Fetch, err))
    }

    fn blocks_for_day(&self, day_id: &EntryId, owner: &OwnerId) -> Result<Vec<Entry>, EntryError> {
        self.entries
            .blocks_for_day(day_id, owner)
            .map_err(|err| store_failure(Operation::Fetch, err))
    }

    /// Loads an entry and checks that `owner` holds it.
    fn owned(&self, owner: &OwnerId, id: &EntryId) -> Result<Entry, EntryError> {
        let entry = self
            .entries
            .get(id)
            .map_err(|err| store_failure(Operation::Fetch, err))?
            .ok_or_else(|| EntryError::NotFound { id: id.clone() })?;
        if &entry.owner_id != owner {
            tracing::warn!(entry_id = %id, owner = %owner, "entry owned by someone else");
            return Err(EntryError::Forbidden { id: id.clone() });
        }
        Ok(entry)
    }

    /// The day a block hangs off. A missing or foreign parent leaves no day
    /// context to validate against.
    fn parent_day(&self, parent_id: &EntryId, owner: &OwnerId) -> Result<Entry, EntryError> {
        let parent = self
            .entries
            .get(parent_id)
            .map_err(|err| store_failure(Operation::Fetch, err))?;
        match parent {
            Some(day) if day.mode() == EntryMode::Day && &day.owner_id == owner => Ok(day),
            _ => Err(EntryError::NoActiveDay),
        }
    }

    fn ensure_fits(
        &self,
        interval: &Interval,
        day: &Entry,
        owner: &OwnerId,
        exclude: Option<&EntryId>,
        now: DateTime<Utc>,
    ) -> Result<(), EntryError> {
        validate_boundaries(interval, day, now)
            .map_err(|reason| EntryError::BlockOutsideDay { reason })?;
        let siblings = self.blocks_for_day(&day.id, owner)?;
        let conflicts = check_overlap(interval, &siblings, exclude);
        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(EntryError::BlocksOverlap { conflicts })
        }
    }

    fn ensure_unlocked(&self, entry: &Entry) -> Result<(), EntryError> {
        if entry.mode() != EntryMode::Simple {
            return Err(EntryError::InvalidEntryMode { mode: entry.mode() });
        }
        let entry_date = entry.start_time.date_naive();
        match self.gate.check_lock(&entry.owner_id, entry_date) {
            Ok(LockDecision::Allowed) => Ok(()),
            Ok(LockDecision::Locked(status)) => {
                tracing::warn!(entry_id = %entry.id, %status, "timesheet locked");
                Err(EntryError::TimesheetLocked { status })
            }
            Err(err) => Err(EntryError::TimesheetCheckFailed(err)),
        }
    }

    /// Inserts an entry that may be open, translating a store-level
    /// uniqueness rejection into the matching "already running" error.
    fn insert_open(&self, owner: &OwnerId, entry: &Entry) -> Result<Entry, EntryError> {
        match self.entries.insert(entry) {
            Ok(stored) => Ok(stored),
            Err(StoreError::OpenEntryExists) => {
                let existing = match entry.mode() {
                    EntryMode::Day => self.active_day(owner)?,
                    EntryMode::Simple | EntryMode::Block => self.active_simple(owner)?,
                };
                match (entry.mode(), existing) {
                    (EntryMode::Day, Some(day)) => Err(EntryError::DayAlreadyActive {
                        entry: Box::new(day),
                    }),
                    (_, Some(running)) => Err(EntryError::TimerAlreadyRunning {
                        entry: Box::new(running),
                    }),
                    (_, None) => Err(store_failure(Operation::Create, StoreError::OpenEntryExists)),
                }
            }
            Err(err) => Err(store_failure(Operation::Create, err)),
        }
    }

    /// Rebuilds the conflict list after the store rejected an overlap that the
    /// in-process check did not see. If the re-read finds no conflict either,
    /// the rejection is reported as a store failure of `operation`.
    fn overlap_race(
        &self,
        operation: Operation,
        day_id: &EntryId,
        owner: &OwnerId,
        interval: &Interval,
        exclude: Option<&EntryId>,
    ) -> EntryError {
        let siblings = match self.blocks_for_day(day_id, owner) {
            Ok(siblings) => siblings,
            Err(err) => return err,
        };
        let conflicts = check_overlap(interval, &siblings, exclude);
        if conflicts.is_empty() {
            tracing::warn!(%day_id, "store rejected an overlap no sibling explains");
            return store_failure(operation, StoreError::BlockOverlap);
        }
        EntryError::BlocksOverlap { conflicts }
    }
}

/// Maps a store failure to the client-facing error for `operation`.
fn store_failure(operation: Operation, err: StoreError) -> EntryError {
    match err {
        StoreError::InvalidReference {
            field: ReferenceField::Project,
        } => EntryError::InvalidProjectRef,
        StoreError::InvalidReference {
            field: ReferenceField::Category,
        } => EntryError::InvalidCategoryRef,
        StoreError::InvalidReference {
            field: ReferenceField::Parent,
        } => EntryError::NoActiveDay,
        source => {
            tracing::error!(%operation, error = ?source, "entry store failure");
            EntryError::Store { operation, source }
        }
    }
}

fn missing_or_failure(id: &EntryId, operation: Operation, err: StoreError) -> EntryError {
    match err {
        StoreError::NotFound => EntryError::NotFound { id: id.clone() },
        err => store_failure(operation, err),
    }
}
