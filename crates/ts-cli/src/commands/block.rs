//! Block commands.

use std::io::Write;

use anyhow::Result;
use serde_json::json;
use ts_core::{EntryId, NewBlock};

use super::Shell;
use super::util::{describe, entry_changes, entry_details, parse_datetime};
use crate::cli::BlockAction;

pub fn run<W: Write>(writer: &mut W, shell: &Shell<'_>, action: &BlockAction) -> Result<()> {
    let lifecycle = shell.lifecycle();
    match action {
        BlockAction::Add {
            start,
            end,
            details,
        } => {
            let request = NewBlock {
                start_time: parse_datetime(start)?,
                end_time: parse_datetime(end)?,
                details: entry_details(details)?,
            };
            let block = lifecycle.create_block(&shell.owner, request)?;
            shell.emit(writer, &block, |w| {
                writeln!(w, "Block added")?;
                writeln!(w, "{}", describe(&block))
            })
        }
        BlockAction::Update { id, changes } => {
            let id = EntryId::new(id.as_str())?;
            let block = lifecycle.update_block(&shell.owner, &id, entry_changes(changes)?)?;
            shell.emit(writer, &block, |w| {
                writeln!(w, "Block updated")?;
                writeln!(w, "{}", describe(&block))
            })
        }
        BlockAction::Delete { id } => {
            let id = EntryId::new(id.as_str())?;
            lifecycle.delete_block(&shell.owner, &id)?;
            shell.emit(writer, &json!({ "deleted": id }), |w| {
                writeln!(w, "Deleted block {id}")
            })
        }
    }
}
