//! Weekly approval commands.
//!
//! Approval records normally belong to the review workflow. These commands
//! let a single-user installation lock and unlock its own weeks.

use std::io::Write;

use anyhow::Result;
use chrono::NaiveDate;
use serde_json::json;
use ts_core::{ApprovalLookup, ApprovalStatus, week_start};

use super::Shell;
use crate::cli::ApprovalAction;

pub fn run<W: Write>(writer: &mut W, shell: &Shell<'_>, action: &ApprovalAction) -> Result<()> {
    match action {
        ApprovalAction::Set { week, status } => {
            let monday = week_start(*week);
            shell.db.set_approval_status(&shell.owner, monday, *status)?;
            tracing::debug!(week_start = %monday, %status, "approval status set");
            shell.emit(writer, &record(monday, Some(status.as_str())), |w| {
                writeln!(w, "Week of {monday} is now {status}")
            })
        }
        ApprovalAction::Show { week } => {
            let monday = week_start(*week);
            let status = shell.db.approval_status(&shell.owner, monday)?;
            shell.emit(
                writer,
                &record(monday, status.as_ref().map(ApprovalStatus::as_str)),
                |w| match status {
                    Some(status) if status.is_locked() => {
                        writeln!(w, "Week of {monday}: {status} (locked)")
                    }
                    Some(status) => writeln!(w, "Week of {monday}: {status}"),
                    None => writeln!(w, "Week of {monday}: no approval record"),
                },
            )
        }
    }
}

fn record(monday: NaiveDate, status: Option<&str>) -> serde_json::Value {
    json!({ "week_start": monday, "status": status })
}
