use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use ts_cli::{Cli, Config, Shell};
use ts_db::Database;

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path).context("failed to open database")?;
    db.set_busy_timeout(config.busy_timeout())
        .context("failed to configure database")?;
    Ok(db)
}

fn run<W: Write>(writer: &mut W, cli: &Cli) -> Result<()> {
    let Some(command) = &cli.command else {
        // No subcommand, show help
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let db = open_database(&config)?;
    let shell = Shell::new(&db, &config, cli.json)?;
    ts_cli::execute(writer, &shell, command)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut stdout = std::io::stdout().lock();
    match run(&mut stdout, &cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = ts_cli::write_failure(&mut stdout, &mut std::io::stderr(), &error, cli.json);
            ExitCode::FAILURE
        }
    }
}
