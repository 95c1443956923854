//! dbmig CLI - Command-line interface for the dbmig engine.

use clap::Parser;

use dbmig_cli::cli::{Cli, Command};
use dbmig_cli::commands;
use dbmig_cli::config::Project;
use dbmig_cli::error::CliResult;
use dbmig_cli::{logging, output};
use dbmig_migrate::MigrationType;

#[tokio::main]
async fn main() {
    // Run the CLI and handle errors
    if let Err(e) = run().await {
        output::newline();
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let project = Project::locate(cli.config.as_deref())?;

    // Run the appropriate command
    match cli.command {
        Command::Schema(args) => commands::schema::run(args, &project).await,
        Command::Structure(args) => commands::migrate::run(MigrationType::Structure, args, &project).await,
        Command::Data(args) => commands::migrate::run(MigrationType::Data, args, &project).await,
    }
}
