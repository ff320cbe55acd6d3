//! Plain entry commands.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Days, Utc};
use serde_json::json;
use ts_core::{EntryId, NewEntry, week_start};

use super::Shell;
use super::util::{
    describe, entry_changes, entry_details, format_minutes, parse_datetime, parse_optional,
};
use crate::cli::EntryAction;

pub fn run<W: Write>(writer: &mut W, shell: &Shell<'_>, action: &EntryAction) -> Result<()> {
    let lifecycle = shell.lifecycle();
    match action {
        EntryAction::Add {
            start,
            end,
            details,
        } => {
            let request = NewEntry {
                start_time: parse_datetime(start)?,
                end_time: parse_optional(end.as_deref())?,
                details: entry_details(details)?,
            };
            let entry = lifecycle.create_entry(&shell.owner, request)?;
            shell.emit(writer, &entry, |w| {
                writeln!(w, "Entry added")?;
                writeln!(w, "{}", describe(&entry))
            })
        }
        EntryAction::Show { id } => {
            let entry = lifecycle.get_entry(&shell.owner, &EntryId::new(id.as_str())?)?;
            shell.emit(writer, &entry, |w| writeln!(w, "{}", describe(&entry)))
        }
        EntryAction::Update { id, changes } => {
            let id = EntryId::new(id.as_str())?;
            let entry = lifecycle.update_entry(&shell.owner, &id, entry_changes(changes)?)?;
            shell.emit(writer, &entry, |w| {
                writeln!(w, "Entry updated")?;
                writeln!(w, "{}", describe(&entry))
            })
        }
        EntryAction::Delete { id } => {
            let id = EntryId::new(id.as_str())?;
            lifecycle.delete_entry(&shell.owner, &id)?;
            shell.emit(writer, &json!({ "deleted": id }), |w| {
                writeln!(w, "Deleted entry {id}")
            })
        }
        EntryAction::List { from, to } => {
            let (from, to) = list_range(from.as_deref(), to.as_deref(), Utc::now())?;
            let entries = lifecycle.list(&shell.owner, from, to)?;
            shell.emit(writer, &entries, |w| {
                if entries.is_empty() {
                    return writeln!(w, "No entries.");
                }
                for entry in &entries {
                    writeln!(w, "{}", describe(entry))?;
                }
                let total: i64 = entries.iter().filter_map(|e| e.duration_minutes).sum();
                writeln!(w, "Total: {}", format_minutes(total))
            })
        }
    }
}

/// Resolves the listing range. Without `--from` the range starts on the
/// Monday of the current week; without `--to` it spans one week.
fn list_range(
    from: Option<&str>,
    to: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let from = match from {
        Some(from) => parse_datetime(from)?,
        None => week_start(now.date_naive())
            .and_time(chrono::NaiveTime::MIN)
            .and_utc(),
    };
    let to = match to {
        Some(to) => parse_datetime(to)?,
        None => from
            .checked_add_days(Days::new(7))
            .ok_or_else(|| anyhow::anyhow!("range start is too late: {from}"))?,
    };
    Ok((from, to))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use insta::assert_snapshot;
    use ts_core::{ApprovalStatus, EntryError, EntryRepository};
    use ts_db::Database;

    use super::*;
    use crate::cli::{ChangesArgs, DetailsArgs};
    use crate::commands::test_support::{output, shell};

    fn add(start: &str, end: Option<&str>) -> EntryAction {
        EntryAction::Add {
            start: start.to_string(),
            end: end.map(str::to_string),
            details: DetailsArgs::default(),
        }
    }

    fn only_entry(db: &Database, shell: &Shell<'_>) -> EntryId {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap();
        let entries = db.list_between(&shell.owner, from, to).unwrap();
        assert_eq!(entries.len(), 1);
        entries[0].id.clone()
    }

    #[test]
    fn add_closed_entry() {
        let db = Database::open_in_memory().unwrap();
        let shell = shell(&db, false);
        let mut buffer = Vec::new();

        run(
            &mut buffer,
            &shell,
            &add("2026-03-04T09:00:00Z", Some("2026-03-04T09:45:00Z")),
        )
        .unwrap();

        assert_snapshot!(output(buffer), @r"
        Entry added
        [ID] simple 2026-03-04 09:00 -> 2026-03-04 09:45 (45m)
        ");
    }

    #[test]
    fn end_before_start_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let shell = shell(&db, false);
        let err = run(
            &mut Vec::new(),
            &shell,
            &add("2026-03-04T10:00:00Z", Some("2026-03-04T09:00:00Z")),
        )
        .unwrap_err();
        let err = err.downcast_ref::<EntryError>().unwrap();
        assert_eq!(err.code(), "INVALID_TIME_RANGE");
    }

    #[test]
    fn unknown_project_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let shell = shell(&db, false);
        let action = EntryAction::Add {
            start: "2026-03-04T09:00:00Z".to_string(),
            end: Some("2026-03-04T10:00:00Z".to_string()),
            details: DetailsArgs {
                project: Some("ghost".to_string()),
                ..DetailsArgs::default()
            },
        };
        let err = run(&mut Vec::new(), &shell, &action).unwrap_err();
        let err = err.downcast_ref::<EntryError>().unwrap();
        assert_eq!(err.code(), "INVALID_PROJECT_REF");
    }

    #[test]
    fn update_respects_weekly_lock() {
        let db = Database::open_in_memory().unwrap();
        let shell = shell(&db, false);
        run(
            &mut Vec::new(),
            &shell,
            &add("2026-03-04T09:00:00Z", Some("2026-03-04T10:00:00Z")),
        )
        .unwrap();
        let id = only_entry(&db, &shell);
        let monday = chrono::NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let update = EntryAction::Update {
            id: id.to_string(),
            changes: ChangesArgs {
                end: Some("2026-03-04T10:30:00Z".to_string()),
                ..ChangesArgs::default()
            },
        };

        db.set_approval_status(&shell.owner, monday, ApprovalStatus::Validated)
            .unwrap();
        let err = run(&mut Vec::new(), &shell, &update).unwrap_err();
        let report = err.downcast_ref::<EntryError>().unwrap().report();
        assert_eq!(report.code, "TIMESHEET_LOCKED");
        assert_eq!(report.data.unwrap()["status"], "validated");

        db.set_approval_status(&shell.owner, monday, ApprovalStatus::Draft)
            .unwrap();
        let mut buffer = Vec::new();
        run(&mut buffer, &shell, &update).unwrap();
        assert_snapshot!(output(buffer), @r"
        Entry updated
        [ID] simple 2026-03-04 09:00 -> 2026-03-04 10:30 (1h 30m)
        ");
    }

    #[test]
    fn delete_respects_weekly_lock() {
        let db = Database::open_in_memory().unwrap();
        let shell = shell(&db, false);
        run(
            &mut Vec::new(),
            &shell,
            &add("2026-03-04T09:00:00Z", Some("2026-03-04T10:00:00Z")),
        )
        .unwrap();
        let id = only_entry(&db, &shell);
        let monday = chrono::NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        db.set_approval_status(&shell.owner, monday, ApprovalStatus::Submitted)
            .unwrap();

        let delete = EntryAction::Delete { id: id.to_string() };
        let err = run(&mut Vec::new(), &shell, &delete).unwrap_err();
        let err = err.downcast_ref::<EntryError>().unwrap();
        assert_eq!(err.code(), "TIMESHEET_LOCKED");
        assert!(db.get(&id).unwrap().is_some());
    }

    #[test]
    fn show_missing_entry_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let shell = shell(&db, false);
        let action = EntryAction::Show {
            id: "missing".to_string(),
        };
        let err = run(&mut Vec::new(), &shell, &action).unwrap_err();
        let err = err.downcast_ref::<EntryError>().unwrap();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn list_prints_entries_and_total() {
        let db = Database::open_in_memory().unwrap();
        let shell = shell(&db, false);
        run(
            &mut Vec::new(),
            &shell,
            &add("2026-03-04T09:00:00Z", Some("2026-03-04T10:00:00Z")),
        )
        .unwrap();
        run(
            &mut Vec::new(),
            &shell,
            &add("2026-03-05T13:00:00Z", Some("2026-03-05T13:20:00Z")),
        )
        .unwrap();
        run(
            &mut Vec::new(),
            &shell,
            &add("2026-03-12T09:00:00Z", Some("2026-03-12T10:00:00Z")),
        )
        .unwrap();

        let mut buffer = Vec::new();
        let action = EntryAction::List {
            from: Some("2026-03-02T00:00:00Z".to_string()),
            to: None,
        };
        run(&mut buffer, &shell, &action).unwrap();

        assert_snapshot!(output(buffer), @r"
        [ID] simple 2026-03-04 09:00 -> 2026-03-04 10:00 (1h 0m)
        [ID] simple 2026-03-05 13:00 -> 2026-03-05 13:20 (20m)
        Total: 1h 20m
        ");
    }

    #[test]
    fn list_with_reversed_range_fails() {
        let db = Database::open_in_memory().unwrap();
        let shell = shell(&db, false);
        let action = EntryAction::List {
            from: Some("2026-03-09T00:00:00Z".to_string()),
            to: Some("2026-03-02T00:00:00Z".to_string()),
        };
        let err = run(&mut Vec::new(), &shell, &action).unwrap_err();
        let err = err.downcast_ref::<EntryError>().unwrap();
        assert_eq!(err.code(), "INVALID_TIME_RANGE");
    }

    #[test]
    fn default_list_range_is_current_week() {
        let now = Utc.with_ymd_and_hms(2026, 3, 5, 15, 30, 0).unwrap();
        let (from, to) = list_range(None, None, now).unwrap();
        assert_eq!(from, Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).unwrap());
    }
}
