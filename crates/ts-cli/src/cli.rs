//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use ts_core::ApprovalStatus;

/// Timesheet tracker.
///
/// Records working time as running timers, working days split into blocks,
/// or manually entered entries.
#[derive(Debug, Parser)]
#[command(name = "ts", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print results and errors as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the running timer and the active day.
    Status,

    /// Start or stop the timer.
    #[command(subcommand)]
    Timer(TimerAction),

    /// Open or close a working day.
    #[command(subcommand)]
    Day(DayAction),

    /// Manage blocks inside the active day.
    #[command(subcommand)]
    Block(BlockAction),

    /// Record and edit entries directly.
    #[command(subcommand)]
    Entry(EntryAction),

    /// Manage projects entries can reference.
    #[command(subcommand)]
    Project(ReferenceAction),

    /// Manage categories entries can reference.
    #[command(subcommand)]
    Category(ReferenceAction),

    /// Record weekly approval status.
    #[command(subcommand)]
    Approval(ApprovalAction),
}

/// Optional metadata for a new entry.
#[derive(Debug, Clone, Default, Args)]
pub struct DetailsArgs {
    /// Project to book the time against.
    #[arg(long)]
    pub project: Option<String>,

    /// Category of work.
    #[arg(long)]
    pub category: Option<String>,

    /// Free-text description.
    #[arg(long)]
    pub description: Option<String>,
}

/// Changes to an existing entry. Omitted fields are left as they are.
#[derive(Debug, Clone, Default, Args)]
pub struct ChangesArgs {
    /// New start time.
    #[arg(long)]
    pub start: Option<String>,

    /// New end time.
    #[arg(long)]
    pub end: Option<String>,

    /// New project.
    #[arg(long, conflicts_with = "clear_project")]
    pub project: Option<String>,

    /// Remove the project.
    #[arg(long)]
    pub clear_project: bool,

    /// New category.
    #[arg(long, conflicts_with = "clear_category")]
    pub category: Option<String>,

    /// Remove the category.
    #[arg(long)]
    pub clear_category: bool,

    /// New description.
    #[arg(long, conflicts_with = "clear_description")]
    pub description: Option<String>,

    /// Remove the description.
    #[arg(long)]
    pub clear_description: bool,
}

#[derive(Debug, Subcommand)]
pub enum TimerAction {
    /// Start a timer now.
    Start {
        #[command(flatten)]
        details: DetailsArgs,
    },
    /// Stop the running timer.
    Stop,
}

#[derive(Debug, Subcommand)]
pub enum DayAction {
    /// Open a working day.
    Start {
        /// When the day started (RFC 3339 or e.g. "2 hours ago"). Defaults to now.
        #[arg(long)]
        at: Option<String>,

        #[command(flatten)]
        details: DetailsArgs,
    },
    /// Close the active day.
    End,
}

#[derive(Debug, Subcommand)]
pub enum BlockAction {
    /// Add a block to the active day.
    Add {
        /// Block start.
        #[arg(long)]
        start: String,

        /// Block end.
        #[arg(long)]
        end: String,

        #[command(flatten)]
        details: DetailsArgs,
    },
    /// Move or edit a block.
    Update {
        /// Block ID.
        id: String,

        #[command(flatten)]
        changes: ChangesArgs,
    },
    /// Delete a block.
    Delete {
        /// Block ID.
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum EntryAction {
    /// Record an entry. Without an end it runs like a timer.
    Add {
        /// Entry start.
        #[arg(long)]
        start: String,

        /// Entry end.
        #[arg(long)]
        end: Option<String>,

        #[command(flatten)]
        details: DetailsArgs,
    },
    /// Show one entry.
    Show {
        /// Entry ID.
        id: String,
    },
    /// Edit an entry.
    Update {
        /// Entry ID.
        id: String,

        #[command(flatten)]
        changes: ChangesArgs,
    },
    /// Delete an entry.
    Delete {
        /// Entry ID.
        id: String,
    },
    /// List entries starting in a range.
    List {
        /// Range start. Defaults to the start of the current week.
        #[arg(long)]
        from: Option<String>,

        /// Range end (exclusive). Defaults to one week after the start.
        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ReferenceAction {
    /// Add a reference, or rename an existing one.
    Add {
        /// Identifier entries use to refer to it.
        id: String,

        /// Display name.
        #[arg(long)]
        name: Option<String>,
    },
    /// List all references.
    List,
}

#[derive(Debug, Subcommand)]
pub enum ApprovalAction {
    /// Set the approval status of the week containing a date.
    Set {
        /// Any date in the week (YYYY-MM-DD).
        week: NaiveDate,

        /// One of: draft, submitted, validated.
        status: ApprovalStatus,
    },
    /// Show the approval status of the week containing a date.
    Show {
        /// Any date in the week (YYYY-MM-DD).
        week: NaiveDate,
    },
}
