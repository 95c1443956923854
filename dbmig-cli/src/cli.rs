//! CLI argument definitions using clap.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// dbmig - Schema reconciliation and versioned migrations for MySQL
#[derive(Parser, Debug)]
#[command(name = "dbmig")]
#[command(version)]
#[command(about = "dbmig - Schema reconciliation and versioned migrations for MySQL", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file (defaults to ./dbmig.toml)
    #[arg(long, global = true, env = "DBMIG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconcile declared table schemas with live databases
    Schema(SchemaArgs),

    /// Structure migrations
    Structure(MigrateArgs),

    /// Data migrations
    Data(MigrateArgs),
}

// =============================================================================
// Shared Arguments
// =============================================================================

/// Database and table filter
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Database name (all declared databases when omitted)
    pub database: Option<String>,

    /// Table name (all tables when omitted)
    pub table: Option<String>,
}

/// Forced answers for confirmation prompts
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct ConfirmArgs {
    /// Answer yes to every confirmation
    #[arg(short, long, conflicts_with = "no")]
    pub yes: bool,

    /// Answer no to every confirmation
    #[arg(short, long)]
    pub no: bool,
}

impl ConfirmArgs {
    /// The forced answer, if any.
    pub fn answer(&self) -> Option<bool> {
        match (self.yes, self.no) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

// =============================================================================
// Schema Command
// =============================================================================

/// Arguments for the `schema` command
#[derive(Args, Debug)]
pub struct SchemaArgs {
    #[command(subcommand)]
    pub command: SchemaSubcommand,
}

/// Schema subcommands
#[derive(Subcommand, Debug)]
pub enum SchemaSubcommand {
    /// Show differences between schema files and live databases
    Status(TargetArgs),

    /// Create, recreate or drop live objects to match the schema files
    Init(SchemaInitArgs),

    /// Write live table definitions back into the schema files
    Dump(SchemaDumpArgs),
}

/// Arguments for `schema init`
#[derive(Args, Debug)]
pub struct SchemaInitArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Skip initial data scripts
    #[arg(long)]
    pub without_data: bool,

    #[command(flatten)]
    pub confirm: ConfirmArgs,
}

/// Arguments for `schema dump`
#[derive(Args, Debug)]
pub struct SchemaDumpArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub confirm: ConfirmArgs,
}

// =============================================================================
// Migration Commands
// =============================================================================

/// Arguments for the `structure` and `data` commands
#[derive(Args, Debug)]
pub struct MigrateArgs {
    #[command(subcommand)]
    pub command: MigrateSubcommand,
}

/// Migration subcommands
#[derive(Subcommand, Debug)]
pub enum MigrateSubcommand {
    /// Show applied and pending migrations
    Status(MigrateStatusArgs),

    /// Apply pending migrations
    Up(MigrateUpArgs),

    /// Revert applied migrations
    Down(MigrateDownArgs),

    /// Create a new migration script
    Create(MigrateCreateArgs),
}

/// Arguments for `status`
#[derive(Args, Debug)]
pub struct MigrateStatusArgs {
    /// Database name (every database with migrations when omitted)
    pub database: Option<String>,
}

/// Arguments for `up`
#[derive(Args, Debug)]
pub struct MigrateUpArgs {
    /// Database name (every database with migrations when omitted)
    pub database: Option<String>,

    /// Apply up to and including this migration
    pub migration_id: Option<String>,

    /// Apply only the given migration
    #[arg(short = 's', long, requires = "migration_id")]
    pub only_single: bool,
}

/// Arguments for `down`
#[derive(Args, Debug)]
pub struct MigrateDownArgs {
    /// Database name
    pub database: String,

    /// Revert down to and including this migration
    pub migration_id: String,

    /// Revert only the given migration
    #[arg(short = 's', long)]
    pub only_single: bool,
}

/// Arguments for `create`
#[derive(Args, Debug)]
pub struct MigrateCreateArgs {
    /// Database name
    pub database: String,

    /// Migration name (letters and digits, at least three)
    pub name: String,

    /// Flag the migration as heavy
    #[arg(short = 'p', long = "is-heavy-migration")]
    pub heavy: bool,
}
