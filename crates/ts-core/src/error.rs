//! Errors surfaced by lifecycle operations.
//!
//! Every [`EntryError`] carries a stable machine code and a classification so
//! callers can map it to their own transport. [`EntryError::report`] flattens
//! an error into the shape handed to clients; store internals never appear in
//! its message.

use std::fmt;

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::entry::Entry;
use crate::gate::GateError;
use crate::interval::{BoundaryViolation, ConflictingBlock};
use crate::repository::StoreError;
use crate::types::{ApprovalStatus, EntryId, EntryMode};

/// Broad class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The caller can correct the request.
    Validation,
    /// The entry belongs to someone else.
    Authorization,
    /// The approval workflow forbids the change.
    Workflow,
    /// The data store failed.
    Infrastructure,
    NotFound,
}

/// Store operation that failed, for infrastructure error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Fetch,
    Create,
    Update,
    Delete,
}

impl Operation {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Fetch => "FETCH_FAILED",
            Self::Create => "CREATE_FAILED",
            Self::Update => "UPDATE_FAILED",
            Self::Delete => "DELETE_FAILED",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Self::Fetch => "fetch",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{verb}")
    }
}

/// Failure of a lifecycle operation.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("entry {id} not found")]
    NotFound { id: EntryId },

    #[error("entry {id} belongs to another owner")]
    Forbidden { id: EntryId },

    #[error("a timer is already running")]
    TimerAlreadyRunning { entry: Box<Entry> },

    #[error("a day is already active")]
    DayAlreadyActive { entry: Box<Entry> },

    #[error("no timer is running")]
    NoActiveTimer,

    #[error("no day is active")]
    NoActiveDay,

    #[error("{reason}")]
    BlockOutsideDay { reason: BoundaryViolation },

    #[error("block overlaps {} existing block(s)", .conflicts.len())]
    BlocksOverlap { conflicts: Vec<ConflictingBlock> },

    #[error("project reference does not exist")]
    InvalidProjectRef,

    #[error("category reference does not exist")]
    InvalidCategoryRef,

    #[error("timesheet for this week is {status}")]
    TimesheetLocked { status: ApprovalStatus },

    #[error("could not verify the timesheet approval status")]
    TimesheetCheckFailed(#[source] GateError),

    #[error("end time must be after start time")]
    InvalidTimeRange,

    #[error("{mode} entries cannot be changed through this operation")]
    InvalidEntryMode { mode: EntryMode },

    #[error("failed to {operation} entry")]
    Store {
        operation: Operation,
        #[source]
        source: StoreError,
    },
}

/// Client-facing shape of an [`EntryError`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub message: String,
    pub classification: ErrorClass,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl EntryError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::TimerAlreadyRunning { .. } => "TIMER_ALREADY_RUNNING",
            Self::DayAlreadyActive { .. } => "DAY_ALREADY_ACTIVE",
            Self::NoActiveTimer => "NO_ACTIVE_TIMER",
            Self::NoActiveDay => "NO_ACTIVE_DAY",
            Self::BlockOutsideDay { .. } => "BLOCK_OUTSIDE_DAY_BOUNDARIES",
            Self::BlocksOverlap { .. } => "BLOCKS_OVERLAP",
            Self::InvalidProjectRef => "INVALID_PROJECT_REF",
            Self::InvalidCategoryRef => "INVALID_CATEGORY_REF",
            Self::TimesheetLocked { .. } => "TIMESHEET_LOCKED",
            Self::TimesheetCheckFailed(_) => "TIMESHEET_CHECK_FAILED",
            Self::InvalidTimeRange => "INVALID_TIME_RANGE",
            Self::InvalidEntryMode { .. } => "INVALID_ENTRY_MODE",
            Self::Store { operation, .. } => operation.code(),
        }
    }

    #[must_use]
    pub const fn classification(&self) -> ErrorClass {
        match self {
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::Forbidden { .. } => ErrorClass::Authorization,
            Self::TimesheetLocked { .. } | Self::TimesheetCheckFailed(_) => ErrorClass::Workflow,
            Self::Store { .. } => ErrorClass::Infrastructure,
            Self::TimerAlreadyRunning { .. }
            | Self::DayAlreadyActive { .. }
            | Self::NoActiveTimer
            | Self::NoActiveDay
            | Self::BlockOutsideDay { .. }
            | Self::BlocksOverlap { .. }
            | Self::InvalidProjectRef
            | Self::InvalidCategoryRef
            | Self::InvalidTimeRange
            | Self::InvalidEntryMode { .. } => ErrorClass::Validation,
        }
    }

    /// Structured data attached to the error, if any.
    pub fn data(&self) -> Option<Value> {
        match self {
            Self::TimerAlreadyRunning { entry } | Self::DayAlreadyActive { entry } => {
                Some(json!({ "entry": entry }))
            }
            Self::BlockOutsideDay { reason } => Some(json!({ "reason": reason })),
            Self::BlocksOverlap { conflicts } => Some(json!({ "conflicting_blocks": conflicts })),
            Self::TimesheetLocked { status } => Some(json!({ "status": status })),
            _ => None,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            message: self.to_string(),
            classification: self.classification(),
            code: self.code(),
            data: self.data(),
        }
    }
}
