//! Timer commands.

use std::io::Write;

use anyhow::Result;

use super::Shell;
use super::util::{describe, entry_details, format_minutes};
use crate::cli::TimerAction;

pub fn run<W: Write>(writer: &mut W, shell: &Shell<'_>, action: &TimerAction) -> Result<()> {
    let lifecycle = shell.lifecycle();
    match action {
        TimerAction::Start { details } => {
            let entry = lifecycle.start_timer(&shell.owner, entry_details(details)?)?;
            shell.emit(writer, &entry, |w| {
                writeln!(w, "Timer started")?;
                writeln!(w, "{}", describe(&entry))
            })
        }
        TimerAction::Stop => {
            let entry = lifecycle.stop_timer(&shell.owner)?;
            shell.emit(writer, &entry, |w| {
                let minutes = entry.duration_minutes.unwrap_or_default();
                writeln!(w, "Timer stopped after {}", format_minutes(minutes))?;
                writeln!(w, "{}", describe(&entry))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use ts_core::{EntryError, EntryRepository};
    use ts_db::Database;

    use super::*;
    use crate::cli::DetailsArgs;
    use crate::commands::test_support::{output, shell};

    #[test]
    fn start_records_running_timer() {
        let db = Database::open_in_memory().unwrap();
        let shell = shell(&db, false);
        let mut buffer = Vec::new();
        let action = TimerAction::Start {
            details: DetailsArgs {
                description: Some("inbox".to_string()),
                ..DetailsArgs::default()
            },
        };

        run(&mut buffer, &shell, &action).unwrap();

        let running = db.active_simple(&shell.owner).unwrap().unwrap();
        assert_eq!(running.description.as_deref(), Some("inbox"));
        let output = output(buffer);
        assert!(output.starts_with("Timer started\n[ID] simple"));
        assert!(output.contains("-> running"));
    }

    #[test]
    fn second_start_reports_running_timer() {
        let db = Database::open_in_memory().unwrap();
        let shell = shell(&db, false);
        let action = TimerAction::Start {
            details: DetailsArgs::default(),
        };
        run(&mut Vec::new(), &shell, &action).unwrap();

        let err = run(&mut Vec::new(), &shell, &action).unwrap_err();
        let err = err.downcast_ref::<EntryError>().unwrap();
        assert_eq!(err.code(), "TIMER_ALREADY_RUNNING");
    }

    #[test]
    fn stop_without_timer_fails() {
        let db = Database::open_in_memory().unwrap();
        let shell = shell(&db, false);
        let err = run(&mut Vec::new(), &shell, &TimerAction::Stop).unwrap_err();
        let err = err.downcast_ref::<EntryError>().unwrap();
        assert_eq!(err.code(), "NO_ACTIVE_TIMER");
    }

    #[test]
    fn stop_closes_timer_with_minimum_minute() {
        let db = Database::open_in_memory().unwrap();
        let shell = shell(&db, true);
        run(
            &mut Vec::new(),
            &shell,
            &TimerAction::Start {
                details: DetailsArgs::default(),
            },
        )
        .unwrap();

        let mut buffer = Vec::new();
        run(&mut buffer, &shell, &TimerAction::Stop).unwrap();

        let stopped: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(stopped["mode"], "simple");
        assert_eq!(stopped["duration_minutes"], 1);
        assert!(stopped["end_time"].is_string());
        assert!(db.active_simple(&shell.owner).unwrap().is_none());
    }
}
