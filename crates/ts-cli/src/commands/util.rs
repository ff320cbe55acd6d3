//! Shared utilities for CLI commands.

use std::fmt::Write as _;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use ts_core::{CategoryRef, Entry, EntryChanges, EntryDetails, ProjectRef};

use crate::cli::{ChangesArgs, DetailsArgs};

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Parse a datetime string as either RFC 3339 or relative time.
///
/// Supports:
/// - RFC 3339: "2026-01-15T10:30:00Z"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    parse_datetime_at(s, Utc::now())
}

/// Like [`parse_datetime`], resolving relative phrases against `now`.
pub fn parse_datetime_at(s: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use RFC 3339 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

pub fn parse_optional(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    s.map(parse_datetime).transpose()
}

/// Validates the metadata flags of a create command.
pub fn entry_details(args: &DetailsArgs) -> Result<EntryDetails> {
    Ok(EntryDetails {
        project_ref: args.project.clone().map(ProjectRef::new).transpose()?,
        category_ref: args.category.clone().map(CategoryRef::new).transpose()?,
        description: args.description.clone(),
    })
}

/// Validates the flags of an update command. `--clear-*` flags become
/// explicit removals.
pub fn entry_changes(args: &ChangesArgs) -> Result<EntryChanges> {
    let project_ref = if args.clear_project {
        Some(None)
    } else {
        args.project
            .clone()
            .map(ProjectRef::new)
            .transpose()?
            .map(Some)
    };
    let category_ref = if args.clear_category {
        Some(None)
    } else {
        args.category
            .clone()
            .map(CategoryRef::new)
            .transpose()?
            .map(Some)
    };
    let description = if args.clear_description {
        Some(None)
    } else {
        args.description.clone().map(Some)
    };

    Ok(EntryChanges {
        start_time: parse_optional(args.start.as_deref())?,
        end_time: parse_optional(args.end.as_deref())?,
        project_ref,
        category_ref,
        description,
    })
}

/// Formats whole minutes as "Xh Ym", or "Xm" under an hour.
pub fn format_minutes(minutes: i64) -> String {
    let minutes = minutes.max(0);
    let hours = minutes / 60;
    let rest = minutes % 60;
    if hours >= 1 {
        format!("{hours}h {rest}m")
    } else {
        format!("{rest}m")
    }
}

pub fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

/// One-line summary of an entry.
pub fn describe(entry: &Entry) -> String {
    let end = entry
        .end_time
        .map_or_else(|| "running".to_string(), format_time);
    let mut line = format!(
        "{} {:<6} {} -> {}",
        entry.id,
        entry.mode().as_str(),
        format_time(entry.start_time),
        end
    );
    if let Some(minutes) = entry.duration_minutes {
        let _ = write!(line, " ({})", format_minutes(minutes));
    }
    if let Some(project) = &entry.project_ref {
        let _ = write!(line, " project={project}");
    }
    if let Some(category) = &entry.category_ref {
        let _ = write!(line, " category={category}");
    }
    if let Some(description) = &entry.description {
        let _ = write!(line, " \"{description}\"");
    }
    line
}
