//! Working day commands.

use std::io::Write;

use anyhow::Result;
use ts_core::{DaySummary, StartDay};

use super::Shell;
use super::util::{describe, entry_details, format_minutes, parse_optional};
use crate::cli::DayAction;

pub fn run<W: Write>(writer: &mut W, shell: &Shell<'_>, action: &DayAction) -> Result<()> {
    let lifecycle = shell.lifecycle();
    match action {
        DayAction::Start { at, details } => {
            let request = StartDay {
                start_time: parse_optional(at.as_deref())?,
                details: entry_details(details)?,
            };
            let day = lifecycle.start_day(&shell.owner, request)?;
            shell.emit(writer, &day, |w| {
                writeln!(w, "Day started")?;
                writeln!(w, "{}", describe(&day))
            })
        }
        DayAction::End => {
            let summary = lifecycle.end_day(&shell.owner)?;
            shell.emit(writer, &summary, |w| write_summary(w, &summary))
        }
    }
}

/// Day line followed by its blocks and the time they cover.
pub fn write_summary<W: Write>(writer: &mut W, summary: &DaySummary) -> std::io::Result<()> {
    writeln!(writer, "{}", describe(&summary.day))?;
    if summary.blocks.is_empty() {
        return writeln!(writer, "  No blocks.");
    }
    for block in &summary.blocks {
        writeln!(writer, "  {}", describe(block))?;
    }
    let booked: i64 = summary
        .blocks
        .iter()
        .filter_map(|block| block.duration_minutes)
        .sum();
    writeln!(writer, "  Blocks total: {}", format_minutes(booked))
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use ts_core::{EntryError, EntryRepository};
    use ts_db::Database;

    use super::*;
    use crate::cli::{BlockAction, DetailsArgs};
    use crate::commands::block;
    use crate::commands::test_support::{output, shell};

    fn start_at(at: &str) -> DayAction {
        DayAction::Start {
            at: Some(at.to_string()),
            details: DetailsArgs::default(),
        }
    }

    #[test]
    fn start_back_dated_day() {
        let db = Database::open_in_memory().unwrap();
        let shell = shell(&db, false);
        let mut buffer = Vec::new();

        run(&mut buffer, &shell, &start_at("2026-03-04T08:00:00Z")).unwrap();

        assert_snapshot!(output(buffer), @r"
        Day started
        [ID] day    2026-03-04 08:00 -> running
        ");
    }

    #[test]
    fn second_day_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let shell = shell(&db, false);
        run(&mut Vec::new(), &shell, &start_at("2026-03-04T08:00:00Z")).unwrap();

        let err = run(&mut Vec::new(), &shell, &start_at("2026-03-04T09:00:00Z")).unwrap_err();
        let err = err.downcast_ref::<EntryError>().unwrap();
        assert_eq!(err.code(), "DAY_ALREADY_ACTIVE");
    }

    #[test]
    fn future_start_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let shell = shell(&db, false);
        let err = run(&mut Vec::new(), &shell, &start_at("2999-01-01T08:00:00Z")).unwrap_err();
        let err = err.downcast_ref::<EntryError>().unwrap();
        assert_eq!(err.code(), "INVALID_TIME_RANGE");
    }

    #[test]
    fn end_lists_blocks() {
        let db = Database::open_in_memory().unwrap();
        let shell = shell(&db, false);
        run(&mut Vec::new(), &shell, &start_at("2026-03-04T08:00:00Z")).unwrap();
        block::run(
            &mut Vec::new(),
            &shell,
            &BlockAction::Add {
                start: "2026-03-04T09:00:00Z".to_string(),
                end: "2026-03-04T12:00:00Z".to_string(),
                details: DetailsArgs::default(),
            },
        )
        .unwrap();

        let mut buffer = Vec::new();
        run(&mut buffer, &shell, &DayAction::End).unwrap();

        assert!(db.active_day(&shell.owner).unwrap().is_none());
        let output = output(buffer);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("[ID] day    2026-03-04 08:00 -> "));
        assert_eq!(
            lines[1],
            "  [ID] block  2026-03-04 09:00 -> 2026-03-04 12:00 (3h 0m)"
        );
        assert_eq!(lines[2], "  Blocks total: 3h 0m");
    }

    #[test]
    fn end_without_day_fails() {
        let db = Database::open_in_memory().unwrap();
        let shell = shell(&db, false);
        let err = run(&mut Vec::new(), &shell, &DayAction::End).unwrap_err();
        let err = err.downcast_ref::<EntryError>().unwrap();
        assert_eq!(err.code(), "NO_ACTIVE_DAY");
    }
}
