//! Timesheet CLI library.
//!
//! This crate provides the CLI interface for the timesheet.

mod cli;
pub mod commands;
mod config;

use std::io::{self, Write};

use anyhow::Result;
use ts_core::EntryError;

pub use cli::{
    ApprovalAction, BlockAction, ChangesArgs, Cli, Commands, DayAction, DetailsArgs, EntryAction,
    ReferenceAction, TimerAction,
};
pub use commands::Shell;
pub use config::Config;

use commands::reference::ReferenceKind;
use commands::{approval, block, day, entry, reference, status, timer};

/// Runs one subcommand, writing its output to `writer`.
pub fn execute<W: Write>(writer: &mut W, shell: &Shell<'_>, command: &Commands) -> Result<()> {
    match command {
        Commands::Status => status::run(writer, shell),
        Commands::Timer(action) => timer::run(writer, shell, action),
        Commands::Day(action) => day::run(writer, shell, action),
        Commands::Block(action) => block::run(writer, shell, action),
        Commands::Entry(action) => entry::run(writer, shell, action),
        Commands::Project(action) => reference::run(writer, shell, ReferenceKind::Project, action),
        Commands::Category(action) => reference::run(writer, shell, ReferenceKind::Category, action),
        Commands::Approval(action) => approval::run(writer, shell, action),
    }
}

/// Reports a failed command.
///
/// Lifecycle errors become their client report: JSON on `out` when `json` is
/// set, otherwise a message with the error code on `err_out`. Anything else
/// is printed with its context chain.
pub fn write_failure<O: Write, E: Write>(
    out: &mut O,
    err_out: &mut E,
    error: &anyhow::Error,
    json: bool,
) -> io::Result<()> {
    match error.downcast_ref::<EntryError>() {
        Some(entry_error) if json => {
            serde_json::to_writer_pretty(&mut *out, &entry_error.report())?;
            writeln!(out)
        }
        Some(entry_error) => writeln!(err_out, "error: {entry_error} [{}]", entry_error.code()),
        None => writeln!(err_out, "error: {error:#}"),
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use ts_core::EntryError;

    use super::*;

    #[test]
    fn lifecycle_error_as_json_goes_to_stdout() {
        let error = anyhow::Error::new(EntryError::NoActiveTimer);
        let mut out = Vec::new();
        let mut err_out = Vec::new();

        write_failure(&mut out, &mut err_out, &error, true).unwrap();

        assert!(err_out.is_empty());
        assert_snapshot!(String::from_utf8(out).unwrap(), @r#"
        {
          "message": "no timer is running",
          "classification": "validation",
          "code": "NO_ACTIVE_TIMER"
        }
        "#);
    }

    #[test]
    fn lifecycle_error_as_text_carries_code() {
        let error = anyhow::Error::new(EntryError::NoActiveDay);
        let mut out = Vec::new();
        let mut err_out = Vec::new();

        write_failure(&mut out, &mut err_out, &error, false).unwrap();

        assert!(out.is_empty());
        assert_eq!(
            String::from_utf8(err_out).unwrap(),
            "error: no day is active [NO_ACTIVE_DAY]\n"
        );
    }

    #[test]
    fn other_errors_keep_context() {
        let error = anyhow::anyhow!("disk full").context("failed to open database");
        let mut out = Vec::new();
        let mut err_out = Vec::new();

        write_failure(&mut out, &mut err_out, &error, true).unwrap();

        assert!(out.is_empty());
        assert_eq!(
            String::from_utf8(err_out).unwrap(),
            "error: failed to open database: disk full\n"
        );
    }
}
