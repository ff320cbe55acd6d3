//! Project and category commands.

use std::io::Write;

use anyhow::Result;
use serde_json::json;
use ts_core::{CategoryRef, ProjectRef};
use ts_db::ReferenceRecord;

use super::Shell;
use crate::cli::ReferenceAction;

/// Which reference table a command manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Project,
    Category,
}

impl ReferenceKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Category => "category",
        }
    }
}

pub fn run<W: Write>(
    writer: &mut W,
    shell: &Shell<'_>,
    kind: ReferenceKind,
    action: &ReferenceAction,
) -> Result<()> {
    match action {
        ReferenceAction::Add { id, name } => {
            match kind {
                ReferenceKind::Project => {
                    shell.db.add_project(&ProjectRef::new(id.as_str())?, name.as_deref())?;
                }
                ReferenceKind::Category => {
                    shell.db.add_category(&CategoryRef::new(id.as_str())?, name.as_deref())?;
                }
            }
            tracing::debug!(kind = kind.label(), id = %id, "reference saved");
            shell.emit(writer, &json!({ "id": id, "name": name }), |w| {
                writeln!(w, "Saved {} {id}", kind.label())
            })
        }
        ReferenceAction::List => {
            let records = match kind {
                ReferenceKind::Project => shell.db.list_projects()?,
                ReferenceKind::Category => shell.db.list_categories()?,
            };
            let values: Vec<_> = records
                .iter()
                .map(|record| json!({ "id": record.id, "name": record.name }))
                .collect();
            shell.emit(writer, &values, |w| write_records(w, kind, &records))
        }
    }
}

fn write_records<W: Write>(
    writer: &mut W,
    kind: ReferenceKind,
    records: &[ReferenceRecord],
) -> std::io::Result<()> {
    if records.is_empty() {
        return writeln!(writer, "No {} records.", kind.label());
    }
    for record in records {
        match &record.name {
            Some(name) => writeln!(writer, "{} - {name}", record.id)?,
            None => writeln!(writer, "{}", record.id)?,
        }
    }
    Ok(())
}
