//! CLI subcommand implementations.

use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;
use ts_core::{EntryLifecycle, OwnerId};
use ts_db::Database;

use crate::Config;

pub mod approval;
pub mod block;
pub mod day;
pub mod entry;
pub mod reference;
pub mod status;
pub mod timer;
pub mod util;

/// What every command runs against: the store, the acting owner and the
/// output format.
pub struct Shell<'a> {
    pub db: &'a Database,
    pub owner: OwnerId,
    pub json: bool,
}

impl<'a> Shell<'a> {
    pub fn new(db: &'a Database, config: &Config, json: bool) -> Result<Self> {
        let owner = OwnerId::new(config.owner.clone()).context("invalid owner in configuration")?;
        Ok(Self { db, owner, json })
    }

    pub const fn lifecycle(&self) -> EntryLifecycle<'a, Database, Database> {
        self.db.lifecycle()
    }

    /// Writes `value` as pretty JSON, or runs `text` for human-readable
    /// output.
    pub fn emit<W, T, F>(&self, writer: &mut W, value: &T, text: F) -> Result<()>
    where
        W: Write,
        T: Serialize + ?Sized,
        F: FnOnce(&mut W) -> io::Result<()>,
    {
        if self.json {
            serde_json::to_writer_pretty(&mut *writer, value)?;
            writeln!(writer)?;
        } else {
            text(writer)?;
        }
        Ok(())
    }
}
