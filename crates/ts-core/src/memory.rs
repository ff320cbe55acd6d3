//! In-memory store used by the lifecycle tests.
//!
//! Mirrors the constraints the SQLite store enforces: one open simple entry
//! and one open day per owner, and non-overlapping sibling blocks.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::entry::{Entry, EntryPatch};
use crate::interval::check_overlap;
use crate::repository::{ApprovalLookup, EntryRepository, StoreError};
use crate::types::{ApprovalStatus, EntryId, EntryMode, OwnerId};

#[derive(Default)]
pub struct MemoryStore {
    entries: RefCell<Vec<Entry>>,
    approvals: RefCell<HashMap<(OwnerId, NaiveDate), ApprovalStatus>>,
    hide_active: Cell<bool>,
    hidden_sibling_reads: Cell<u32>,
    fail_approvals: Cell<bool>,
    fail_writes: Cell<bool>,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn set_approval(&self, owner: &OwnerId, week_start: NaiveDate, status: ApprovalStatus) {
        self.approvals
            .borrow_mut()
            .insert((owner.clone(), week_start), status);
    }

    /// The next active-entry query misses, as if a concurrent writer had not
    /// committed yet.
    pub fn hide_active_once(&self) {
        self.hide_active.set(true);
    }

    /// The next `reads` sibling queries come back empty, while writes still
    /// see every block.
    pub fn hide_siblings(&self, reads: u32) {
        self.hidden_sibling_reads.set(reads);
    }

    pub fn fail_approvals(&self) {
        self.fail_approvals.set(true);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.set(true);
    }

    fn active(&self, owner: &OwnerId, mode: EntryMode) -> Result<Option<Entry>, StoreError> {
        if self.hide_active.replace(false) {
            return Ok(None);
        }
        let found: Vec<Entry> = self
            .entries
            .borrow()
            .iter()
            .filter(|e| &e.owner_id == owner && e.mode() == mode && e.is_open())
            .cloned()
            .collect();
        match found.len() {
            0 | 1 => Ok(found.into_iter().next()),
            count => Err(StoreError::MultipleRows { count }),
        }
    }

    fn check_write(&self, entry: &Entry, entries: &[Entry]) -> Result<(), StoreError> {
        if self.fail_writes.get() {
            return Err(StoreError::backend(std::io::Error::other("write refused")));
        }
        let others = entries.iter().filter(|e| e.id != entry.id);
        if entry.is_open() && entry.mode() != EntryMode::Block {
            let clash = others
                .clone()
                .any(|e| e.owner_id == entry.owner_id && e.mode() == entry.mode() && e.is_open());
            if clash {
                return Err(StoreError::OpenEntryExists);
            }
        }
        if let (Some(parent), Some(interval)) = (entry.kind.parent_id(), entry.interval()) {
            let siblings: Vec<Entry> = others
                .filter(|e| e.kind.parent_id() == Some(parent))
                .cloned()
                .collect();
            if !check_overlap(&interval, &siblings, None).is_empty() {
                return Err(StoreError::BlockOverlap);
            }
        }
        Ok(())
    }
}

impl EntryRepository for MemoryStore {
    fn active_simple(&self, owner: &OwnerId) -> Result<Option<Entry>, StoreError> {
        self.active(owner, EntryMode::Simple)
    }

    fn active_day(&self, owner: &OwnerId) -> Result<Option<Entry>, StoreError> {
        self.active(owner, EntryMode::Day)
    }

    fn blocks_for_day(&self, day_id: &EntryId, owner: &OwnerId) -> Result<Vec<Entry>, StoreError> {
        let hidden = self.hidden_sibling_reads.get();
        if hidden > 0 {
            self.hidden_sibling_reads.set(hidden - 1);
            return Ok(Vec::new());
        }
        let mut blocks: Vec<Entry> = self
            .entries
            .borrow()
            .iter()
            .filter(|e| &e.owner_id == owner && e.kind.parent_id() == Some(day_id))
            .cloned()
            .collect();
        blocks.sort_by_key(|e| e.start_time);
        Ok(blocks)
    }

    fn list_between(
        &self,
        owner: &OwnerId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Entry>, StoreError> {
        let mut entries: Vec<Entry> = self
            .entries
            .borrow()
            .iter()
            .filter(|e| &e.owner_id == owner && e.start_time >= from && e.start_time < to)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.start_time);
        Ok(entries)
    }

    fn get(&self, id: &EntryId) -> Result<Option<Entry>, StoreError> {
        Ok(self.entries.borrow().iter().find(|e| &e.id == id).cloned())
    }

    fn insert(&self, entry: &Entry) -> Result<Entry, StoreError> {
        let mut entries = self.entries.borrow_mut();
        self.check_write(entry, &entries)?;
        entries.push(entry.clone());
        Ok(entry.clone())
    }

    fn update(&self, id: &EntryId, patch: &EntryPatch) -> Result<Entry, StoreError> {
        let mut entries = self.entries.borrow_mut();
        let index = entries
            .iter()
            .position(|e| &e.id == id)
            .ok_or(StoreError::NotFound)?;
        let mut updated = entries[index].clone();
        patch.apply_to(&mut updated);
        self.check_write(&updated, &entries)?;
        entries[index] = updated.clone();
        Ok(updated)
    }

    fn delete(&self, id: &EntryId) -> Result<(), StoreError> {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|e| &e.id != id);
        if entries.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

impl ApprovalLookup for MemoryStore {
    fn approval_status(
        &self,
        owner: &OwnerId,
        week_start: NaiveDate,
    ) -> Result<Option<ApprovalStatus>, StoreError> {
        if self.fail_approvals.get() {
            return Err(StoreError::backend(std::io::Error::other("approvals offline")));
        }
        Ok(self
            .approvals
            .borrow()
            .get(&(owner.clone(), week_start))
            .copied())
    }
}
