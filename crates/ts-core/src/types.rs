//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Invalid entry mode value.
    #[error("invalid entry mode: {value}")]
    InvalidMode { value: String },

    /// Invalid approval status value.
    #[error("invalid approval status: {value}")]
    InvalidApprovalStatus { value: String },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated entry identifier.
    ///
    /// New entries get a random UUID; stored IDs are accepted as-is.
    EntryId, "entry ID"
);

define_string_id!(
    /// The owner of a set of entries.
    OwnerId, "owner ID"
);

define_string_id!(
    /// Reference to a project row in the data store.
    ProjectRef, "project reference"
);

define_string_id!(
    /// Reference to a category row in the data store.
    CategoryRef, "category reference"
);

impl EntryId {
    /// Generates a fresh random entry ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Flat discriminant of an entry, as stored in the `mode` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryMode {
    /// Ad-hoc timer entry.
    Simple,
    /// Full-day container.
    Day,
    /// Sub-interval of a day.
    Block,
}

impl EntryMode {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Day => "day",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for EntryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntryMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simple" => Ok(Self::Simple),
            "day" => Ok(Self::Day),
            "block" => Ok(Self::Block),
            _ => Err(ValidationError::InvalidMode {
                value: s.to_string(),
            }),
        }
    }
}

/// Status of the weekly approval record owned by the approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    /// Still being edited by the owner.
    Draft,
    /// Handed in for review.
    Submitted,
    /// Accepted by a reviewer.
    Validated,
}

impl ApprovalStatus {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Validated => "validated",
        }
    }

    /// Whether entries in a week with this status are frozen.
    #[must_use]
    pub const fn is_locked(self) -> bool {
        matches!(self, Self::Submitted | Self::Validated)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "submitted" => Ok(Self::Submitted),
            "validated" => Ok(Self::Validated),
            _ => Err(ValidationError::InvalidApprovalStatus {
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_id_rejects_empty() {
        assert!(EntryId::new("").is_err());
        assert!(EntryId::new("   ").is_err());
        assert!(EntryId::new("entry-1").is_ok());
    }

    #[test]
    fn owner_id_rejects_empty() {
        let err = OwnerId::new("").unwrap_err();
        assert_eq!(err.to_string(), "owner ID cannot be empty");
    }

    #[test]
    fn generated_entry_ids_are_unique() {
        let a = EntryId::generate();
        let b = EntryId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn entry_id_serde_rejects_empty() {
        let result: Result<EntryId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn project_ref_serializes_as_plain_string() {
        let project = ProjectRef::new("acme").unwrap();
        assert_eq!(serde_json::to_string(&project).unwrap(), "\"acme\"");
    }

    #[test]
    fn entry_mode_from_str() {
        assert_eq!("simple".parse::<EntryMode>().unwrap(), EntryMode::Simple);
        assert_eq!("day".parse::<EntryMode>().unwrap(), EntryMode::Day);
        assert_eq!("block".parse::<EntryMode>().unwrap(), EntryMode::Block);
        assert!("week".parse::<EntryMode>().is_err());
    }

    #[test]
    fn entry_mode_as_str_matches_serde() {
        for mode in [EntryMode::Simple, EntryMode::Day, EntryMode::Block] {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.as_str()));
        }
    }

    #[test]
    fn approval_status_lock_rules() {
        assert!(!ApprovalStatus::Draft.is_locked());
        assert!(ApprovalStatus::Submitted.is_locked());
        assert!(ApprovalStatus::Validated.is_locked());
    }

    #[test]
    fn approval_status_from_str() {
        assert_eq!(
            "submitted".parse::<ApprovalStatus>().unwrap(),
            ApprovalStatus::Submitted
        );
        let err = "approved".parse::<ApprovalStatus>().unwrap_err();
        assert_eq!(err.to_string(), "invalid approval status: approved");
    }
}
