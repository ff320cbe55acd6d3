//! Storage layer for the timesheet.
//!
//! Provides persistence for entries, projects, categories and weekly approval
//! records using `rusqlite`, and implements the [`EntryRepository`] and
//! [`ApprovalLookup`] seams of `ts-core`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization. Separate processes (or
//! separate `Database` instances) may write concurrently; SQLite serializes
//! the writes and the constraints below keep the data consistent.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in ISO 8601 format with nanosecond precision
//! (e.g., `2024-01-15T10:30:00.000000000Z`). Nothing is truncated, so distinct
//! instants stay distinct in storage. The fixed width means lexicographic
//! ordering matches chronological ordering, which the range queries, the
//! `end_time > start_time` check and the overlap triggers rely on.
//!
//! ## Store-Enforced Invariants
//!
//! The lifecycle manager checks its rules before writing, but two requests can
//! pass those checks at the same time. The schema is the source of truth:
//!
//! - `idx_entries_one_open`: partial unique index allowing one open `simple`
//!   and one open `day` entry per owner.
//! - `entries_block_overlap_*`: triggers rejecting a block that overlaps a
//!   sibling under the same day (half-open intervals).
//! - `entries_*_ref_*` / `entries_parent_*`: triggers rejecting dangling
//!   project, category and parent references. Each raises a distinct message
//!   so the violated field can be reported.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params, params_from_iter};
use thiserror::Error;
use ts_core::{
    ApprovalLookup, ApprovalStatus, CategoryRef, Entry, EntryId, EntryKind, EntryLifecycle,
    EntryMode, EntryPatch, EntryRepository, OwnerId, ProjectRef, ReferenceField, StoreError,
};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for entry {entry_id}: {timestamp}")]
    TimestampParse {
        entry_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row does not describe a valid entry.
    #[error("invalid entry data for {entry_id}: {message}")]
    InvalidEntryData { entry_id: String, message: String },
    /// A stored approval row could not be parsed.
    #[error("invalid approval record for week of {week_start}: {message}")]
    InvalidApproval { week_start: String, message: String },
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        Self::backend(err)
    }
}

const ENTRY_COLUMNS: &str = "id, owner_id, mode, parent_id, start_time, end_time, \
     duration_minutes, project_ref, category_ref, description, created_at, updated_at";

/// Messages raised by the schema triggers.
const PROJECT_REF_VIOLATION: &str = "invalid project_ref";
const CATEGORY_REF_VIOLATION: &str = "invalid category_ref";
const PARENT_VIOLATION: &str = "invalid parent_id";
const OVERLAP_VIOLATION: &str = "block overlaps sibling";

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A project or category row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRecord {
    pub id: String,
    pub name: Option<String>,
}

/// Raw entry columns, before validation.
struct EntryRow {
    id: String,
    owner_id: String,
    mode: String,
    parent_id: Option<String>,
    start_time: String,
    end_time: Option<String>,
    duration_minutes: Option<i64>,
    project_ref: Option<String>,
    category_ref: Option<String>,
    description: Option<String>,
    created_at: String,
    updated_at: String,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        tracing::debug!(path = %path.display(), "opened database");
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Sets how long a write waits for a lock held by another connection.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<(), DbError> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Lifecycle manager backed by this database for both entries and
    /// approval records.
    pub const fn lifecycle(&self) -> EntryLifecycle<'_, Self, Self> {
        EntryLifecycle::new(self, self)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                name TEXT,
                created_at TEXT NOT NULL
            );

            -- Weekly approval records, owned by the approval workflow.
            -- week_start: the Monday of the week, 'YYYY-MM-DD'
            CREATE TABLE IF NOT EXISTS timesheet_approvals (
                owner_id TEXT NOT NULL,
                week_start TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('draft', 'submitted', 'validated')),
                updated_at TEXT NOT NULL,
                PRIMARY KEY (owner_id, week_start)
            );

            -- Entries: timers, days and the blocks nested in days
            -- parent_id: set exactly for blocks, the id of their day
            -- end_time / duration_minutes: NULL while open
            CREATE TABLE IF NOT EXISTS entries (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                mode TEXT NOT NULL CHECK (mode IN ('simple', 'day', 'block')),
                parent_id TEXT,
                start_time TEXT NOT NULL,
                end_time TEXT,
                duration_minutes INTEGER,
                project_ref TEXT,
                category_ref TEXT,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK ((mode = 'block') = (parent_id IS NOT NULL)),
                CHECK (mode <> 'block' OR end_time IS NOT NULL),
                CHECK (end_time IS NULL OR end_time > start_time)
            );

            CREATE INDEX IF NOT EXISTS idx_entries_owner_start ON entries(owner_id, start_time);
            CREATE INDEX IF NOT EXISTS idx_entries_parent ON entries(parent_id, start_time);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_one_open
                ON entries(owner_id, mode)
                WHERE end_time IS NULL AND mode IN ('simple', 'day');

            CREATE TRIGGER IF NOT EXISTS entries_project_ref_insert
            BEFORE INSERT ON entries
            WHEN NEW.project_ref IS NOT NULL
                AND NOT EXISTS (SELECT 1 FROM projects WHERE id = NEW.project_ref)
            BEGIN
                SELECT RAISE(ABORT, 'invalid project_ref');
            END;

            CREATE TRIGGER IF NOT EXISTS entries_project_ref_update
            BEFORE UPDATE OF project_ref ON entries
            WHEN NEW.project_ref IS NOT NULL
                AND NOT EXISTS (SELECT 1 FROM projects WHERE id = NEW.project_ref)
            BEGIN
                SELECT RAISE(ABORT, 'invalid project_ref');
            END;

            CREATE TRIGGER IF NOT EXISTS entries_category_ref_insert
            BEFORE INSERT ON entries
            WHEN NEW.category_ref IS NOT NULL
                AND NOT EXISTS (SELECT 1 FROM categories WHERE id = NEW.category_ref)
            BEGIN
                SELECT RAISE(ABORT, 'invalid category_ref');
            END;

            CREATE TRIGGER IF NOT EXISTS entries_category_ref_update
            BEFORE UPDATE OF category_ref ON entries
            WHEN NEW.category_ref IS NOT NULL
                AND NOT EXISTS (SELECT 1 FROM categories WHERE id = NEW.category_ref)
            BEGIN
                SELECT RAISE(ABORT, 'invalid category_ref');
            END;

            CREATE TRIGGER IF NOT EXISTS entries_parent_insert
            BEFORE INSERT ON entries
            WHEN NEW.parent_id IS NOT NULL
                AND NOT EXISTS (
                    SELECT 1 FROM entries
                    WHERE id = NEW.parent_id AND mode = 'day' AND owner_id = NEW.owner_id
                )
            BEGIN
                SELECT RAISE(ABORT, 'invalid parent_id');
            END;

            CREATE TRIGGER IF NOT EXISTS entries_block_overlap_insert
            BEFORE INSERT ON entries
            WHEN NEW.mode = 'block'
                AND EXISTS (
                    SELECT 1 FROM entries
                    WHERE parent_id = NEW.parent_id
                        AND id <> NEW.id
                        AND start_time < NEW.end_time
                        AND COALESCE(end_time, '9999') > NEW.start_time
                )
            BEGIN
                SELECT RAISE(ABORT, 'block overlaps sibling');
            END;

            CREATE TRIGGER IF NOT EXISTS entries_block_overlap_update
            BEFORE UPDATE OF start_time, end_time ON entries
            WHEN NEW.mode = 'block'
                AND EXISTS (
                    SELECT 1 FROM entries
                    WHERE parent_id = NEW.parent_id
                        AND id <> NEW.id
                        AND start_time < NEW.end_time
                        AND COALESCE(end_time, '9999') > NEW.start_time
                )
            BEGIN
                SELECT RAISE(ABORT, 'block overlaps sibling');
            END;
            ",
        )?;
        Ok(())
    }

    // ========== Reference data ==========

    /// Adds a project, updating its name if it already exists.
    pub fn add_project(&self, id: &ProjectRef, name: Option<&str>) -> Result<(), DbError> {
        self.upsert_reference("projects", id.as_str(), name)
    }

    /// Adds a category, updating its name if it already exists.
    pub fn add_category(&self, id: &CategoryRef, name: Option<&str>) -> Result<(), DbError> {
        self.upsert_reference("categories", id.as_str(), name)
    }

    /// Lists projects ordered by ID.
    pub fn list_projects(&self) -> Result<Vec<ReferenceRecord>, DbError> {
        self.list_references("projects")
    }

    /// Lists categories ordered by ID.
    pub fn list_categories(&self) -> Result<Vec<ReferenceRecord>, DbError> {
        self.list_references("categories")
    }

    fn upsert_reference(&self, table: &str, id: &str, name: Option<&str>) -> Result<(), DbError> {
        self.conn.execute(
            &format!(
                "
                INSERT INTO {table} (id, name, created_at) VALUES (?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET name = COALESCE(excluded.name, {table}.name)
                "
            ),
            params![id, name, format_timestamp(Utc::now())],
        )?;
        Ok(())
    }

    fn list_references(&self, table: &str) -> Result<Vec<ReferenceRecord>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, name FROM {table} ORDER BY id ASC"))?;
        let rows = stmt.query_map([], |row| {
            Ok(ReferenceRecord {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    // ========== Approvals ==========

    /// Records the approval status for the week starting on `week_start`.
    ///
    /// The approval workflow owns these records; this exists so a local
    /// installation can stand in for it.
    pub fn set_approval_status(
        &self,
        owner: &OwnerId,
        week_start: NaiveDate,
        status: ApprovalStatus,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO timesheet_approvals (owner_id, week_start, status, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(owner_id, week_start) DO UPDATE SET
                status = excluded.status,
                updated_at = excluded.updated_at
            ",
            params![
                owner.as_str(),
                week_start.to_string(),
                status.as_str(),
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(())
    }

    fn read_approval(
        &self,
        owner: &OwnerId,
        week_start: NaiveDate,
    ) -> Result<Option<ApprovalStatus>, DbError> {
        let week = week_start.to_string();
        let status: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM timesheet_approvals WHERE owner_id = ? AND week_start = ?",
                params![owner.as_str(), week],
                |row| row.get(0),
            )
            .optional()?;
        status
            .map(|status| {
                status.parse().map_err(|err: ts_core::ValidationError| DbError::InvalidApproval {
                    week_start: week.clone(),
                    message: err.to_string(),
                })
            })
            .transpose()
    }

    // ========== Entries ==========

    fn query_entries(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Entry>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, read_entry_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.into_entry()?);
        }
        Ok(entries)
    }

    fn open_entry(&self, owner: &OwnerId, mode: EntryMode) -> Result<Option<Entry>, StoreError> {
        let entries = self.query_entries(
            &format!(
                "
                SELECT {ENTRY_COLUMNS}
                FROM entries
                WHERE owner_id = ? AND mode = ? AND end_time IS NULL
                "
            ),
            &[&owner.as_str(), &mode.as_str()],
        )?;
        if entries.len() > 1 {
            return Err(StoreError::MultipleRows {
                count: entries.len(),
            });
        }
        Ok(entries.into_iter().next())
    }
}

impl EntryRepository for Database {
    fn active_simple(&self, owner: &OwnerId) -> Result<Option<Entry>, StoreError> {
        self.open_entry(owner, EntryMode::Simple)
    }

    fn active_day(&self, owner: &OwnerId) -> Result<Option<Entry>, StoreError> {
        self.open_entry(owner, EntryMode::Day)
    }

    fn blocks_for_day(&self, day_id: &EntryId, owner: &OwnerId) -> Result<Vec<Entry>, StoreError> {
        let blocks = self.query_entries(
            &format!(
                "
                SELECT {ENTRY_COLUMNS}
                FROM entries
                WHERE parent_id = ? AND owner_id = ? AND mode = 'block'
                ORDER BY start_time ASC, id ASC
                "
            ),
            &[&day_id.as_str(), &owner.as_str()],
        )?;
        Ok(blocks)
    }

    fn list_between(
        &self,
        owner: &OwnerId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Entry>, StoreError> {
        let entries = self.query_entries(
            &format!(
                "
                SELECT {ENTRY_COLUMNS}
                FROM entries
                WHERE owner_id = ? AND start_time >= ? AND start_time < ?
                ORDER BY start_time ASC, id ASC
                "
            ),
            &[&owner.as_str(), &format_timestamp(from), &format_timestamp(to)],
        )?;
        Ok(entries)
    }

    fn get(&self, id: &EntryId) -> Result<Option<Entry>, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?"),
                [id.as_str()],
                read_entry_row,
            )
            .optional()
            .map_err(DbError::from)?;
        Ok(row.map(EntryRow::into_entry).transpose()?)
    }

    fn insert(&self, entry: &Entry) -> Result<Entry, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "
                    INSERT INTO entries ({ENTRY_COLUMNS})
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    RETURNING {ENTRY_COLUMNS}
                    "
                ),
                params![
                    entry.id.as_str(),
                    entry.owner_id.as_str(),
                    entry.mode().as_str(),
                    entry.kind.parent_id().map(EntryId::as_str),
                    format_timestamp(entry.start_time),
                    entry.end_time.map(format_timestamp),
                    entry.duration_minutes,
                    entry.project_ref.as_ref().map(ProjectRef::as_str),
                    entry.category_ref.as_ref().map(CategoryRef::as_str),
                    entry.description,
                    format_timestamp(entry.created_at),
                    format_timestamp(entry.updated_at),
                ],
                read_entry_row,
            )
            .map_err(map_write_error)?;
        Ok(row.into_entry()?)
    }

    fn update(&self, id: &EntryId, patch: &EntryPatch) -> Result<Entry, StoreError> {
        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(start) = patch.start_time {
            assignments.push("start_time = ?");
            values.push(Value::Text(format_timestamp(start)));
        }
        if let Some(end) = patch.end_time {
            assignments.push("end_time = ?");
            values.push(optional_text(end.map(format_timestamp)));
        }
        if let Some(duration) = patch.duration_minutes {
            assignments.push("duration_minutes = ?");
            values.push(duration.map_or(Value::Null, Value::Integer));
        }
        if let Some(project) = &patch.project_ref {
            assignments.push("project_ref = ?");
            values.push(optional_text(project.as_ref().map(ToString::to_string)));
        }
        if let Some(category) = &patch.category_ref {
            assignments.push("category_ref = ?");
            values.push(optional_text(category.as_ref().map(ToString::to_string)));
        }
        if let Some(description) = &patch.description {
            assignments.push("description = ?");
            values.push(optional_text(description.clone()));
        }
        if let Some(updated_at) = patch.updated_at {
            assignments.push("updated_at = ?");
            values.push(Value::Text(format_timestamp(updated_at)));
        }

        if assignments.is_empty() {
            return self.get(id)?.ok_or(StoreError::NotFound);
        }
        values.push(Value::Text(id.to_string()));

        let sql = format!(
            "UPDATE entries SET {} WHERE id = ? RETURNING {ENTRY_COLUMNS}",
            assignments.join(", ")
        );
        let row = self
            .conn
            .query_row(&sql, params_from_iter(values), read_entry_row)
            .map_err(map_write_error)?;
        Ok(row.into_entry()?)
    }

    fn delete(&self, id: &EntryId) -> Result<(), StoreError> {
        let deleted = self
            .conn
            .execute("DELETE FROM entries WHERE id = ?", [id.as_str()])
            .map_err(map_write_error)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

impl ApprovalLookup for Database {
    fn approval_status(
        &self,
        owner: &OwnerId,
        week_start: NaiveDate,
    ) -> Result<Option<ApprovalStatus>, StoreError> {
        Ok(self.read_approval(owner, week_start)?)
    }
}

fn read_entry_row(row: &Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        mode: row.get(2)?,
        parent_id: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        duration_minutes: row.get(6)?,
        project_ref: row.get(7)?,
        category_ref: row.get(8)?,
        description: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl EntryRow {
    fn into_entry(self) -> Result<Entry, DbError> {
        let entry_id = self.id.clone();
        let invalid = |message: String| DbError::InvalidEntryData {
            entry_id: entry_id.clone(),
            message,
        };

        let mode: EntryMode = self
            .mode
            .parse()
            .map_err(|err: ts_core::ValidationError| invalid(err.to_string()))?;
        let kind = match (mode, self.parent_id) {
            (EntryMode::Block, Some(parent)) => EntryKind::Block {
                parent_id: EntryId::new(parent).map_err(|err| invalid(err.to_string()))?,
            },
            (EntryMode::Block, None) => return Err(invalid("block without parent".to_string())),
            (EntryMode::Simple, _) => EntryKind::Simple,
            (EntryMode::Day, _) => EntryKind::Day,
        };

        Ok(Entry {
            id: EntryId::new(self.id).map_err(|err| invalid(err.to_string()))?,
            owner_id: OwnerId::new(self.owner_id).map_err(|err| invalid(err.to_string()))?,
            kind,
            start_time: parse_timestamp(&self.start_time, &entry_id)?,
            end_time: self
                .end_time
                .map(|end| parse_timestamp(&end, &entry_id))
                .transpose()?,
            duration_minutes: self.duration_minutes,
            project_ref: self
                .project_ref
                .map(ProjectRef::new)
                .transpose()
                .map_err(|err| invalid(err.to_string()))?,
            category_ref: self
                .category_ref
                .map(CategoryRef::new)
                .transpose()
                .map_err(|err| invalid(err.to_string()))?,
            description: self.description,
            created_at: parse_timestamp(&self.created_at, &entry_id)?,
            updated_at: parse_timestamp(&self.updated_at, &entry_id)?,
        })
    }
}

/// Translates constraint failures raised by the schema into store errors.
fn map_write_error(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::QueryReturnedNoRows => return StoreError::NotFound,
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            match message.as_deref() {
                Some(PROJECT_REF_VIOLATION) => {
                    return StoreError::InvalidReference {
                        field: ReferenceField::Project,
                    };
                }
                Some(CATEGORY_REF_VIOLATION) => {
                    return StoreError::InvalidReference {
                        field: ReferenceField::Category,
                    };
                }
                Some(PARENT_VIOLATION) => {
                    return StoreError::InvalidReference {
                        field: ReferenceField::Parent,
                    };
                }
                Some(OVERLAP_VIOLATION) => return StoreError::BlockOverlap,
                Some(message) if message.contains("entries.owner_id, entries.mode") => {
                    return StoreError::OpenEntryExists;
                }
                _ => {}
            }
        }
        _ => {}
    }
    StoreError::backend(DbError::Sqlite(err))
}

fn optional_text(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::Text)
}

fn parse_timestamp(timestamp: &str, entry_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            entry_id: entry_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
