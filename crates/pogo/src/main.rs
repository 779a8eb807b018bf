//! Pogo - Main entry point

use anyhow::Context;
use clap::Parser;
use pogo::{commands, Cli, Commands, LocalDb, Settings};
use pogo_common::logging::init_logging;
use std::process;
use tracing::{error, info_span};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %e, "Pogo failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;

    let log_config = settings.log_config(cli.verbose)?.merge_env()?;
    // Held until exit so buffered file output is flushed
    let _guard = init_logging(&log_config)?;

    let command = cli.command.unwrap_or(Commands::Run);
    if command == Commands::ShowConfig {
        commands::show_config(&settings)?;
        return Ok(());
    }

    let db = LocalDb::open(&settings.db_connection.name).with_context(|| {
        format!(
            "Failed to open local store '{}'",
            settings.db_connection.name.display()
        )
    })?;
    std::fs::create_dir_all(&settings.locations.arc_dir).with_context(|| {
        format!(
            "Failed to create archive directory '{}'",
            settings.locations.arc_dir.display()
        )
    })?;

    let span = info_span!("pogo", origin_host = %settings.main.origin_host);
    commands::execute(&command, &settings, &db, span).await?;
    Ok(())
}
