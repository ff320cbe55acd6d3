//! Weekly approval lock on simple entries.
//!
//! Once a week has been submitted or validated by the approval workflow, the
//! simple entries starting in that week can no longer be edited or deleted.
//! When the lookup itself fails the gate denies the modification.

use chrono::{Datelike, Days, NaiveDate};
use thiserror::Error;

use crate::repository::{ApprovalLookup, StoreError};
use crate::types::{ApprovalStatus, OwnerId};

/// Outcome of a lock check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockDecision {
    /// No record, or the week is still a draft.
    Allowed,
    /// The week is frozen with the given status.
    Locked(ApprovalStatus),
}

/// The approval record could not be read.
#[derive(Debug, Error)]
#[error("failed to check approval status for week of {week_start}")]
pub struct GateError {
    pub week_start: NaiveDate,
    #[source]
    pub source: StoreError,
}

/// The Monday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date - Days::new(offset)
}

/// Decides whether a pre-existing entry may still be modified.
#[derive(Debug, Clone, Copy)]
pub struct MutationGate<'a, A> {
    approvals: &'a A,
}

impl<'a, A: ApprovalLookup> MutationGate<'a, A> {
    pub const fn new(approvals: &'a A) -> Self {
        Self { approvals }
    }

    /// Looks up the approval record for the week containing `entry_date`.
    pub fn check_lock(
        &self,
        owner: &OwnerId,
        entry_date: NaiveDate,
    ) -> Result<LockDecision, GateError> {
        let week = week_start(entry_date);
        match self.approvals.approval_status(owner, week) {
            Ok(Some(status)) if status.is_locked() => Ok(LockDecision::Locked(status)),
            Ok(_) => Ok(LockDecision::Allowed),
            Err(source) => {
                tracing::error!(
                    owner = %owner,
                    week_start = %week,
                    error = %source,
                    "approval lookup failed, denying modification"
                );
                Err(GateError {
                    week_start: week,
                    source,
                })
            }
        }
    }
}
