//! `dbmig structure` / `dbmig data` commands - Versioned migrations.

use chrono::DateTime;
use dbmig_migrate::{
    MigrationDescriptor, MigrationEngine, MigrationRegistry, MigrationResult, MigrationStatus, MigrationType,
};

use crate::cli::{MigrateArgs, MigrateSubcommand};
use crate::config::Project;
use crate::error::CliResult;
use crate::output;

/// Run a migration command for one migration type
pub async fn run(kind: MigrationType, args: MigrateArgs, project: &Project) -> CliResult<()> {
    let paths = project.paths();
    let factory = MigrationRegistry::new();
    let mut registry = project.connect().await?;
    let mut engine = MigrationEngine::new(&mut registry, paths, &factory);

    match args.command {
        MigrateSubcommand::Status(status) => {
            let statuses = engine.status(kind, status.database.as_deref()).await?;
            render_status(kind, &statuses);
        }
        MigrateSubcommand::Up(up) => {
            output::header(&format!("Migrate {} up", kind));
            let result = engine
                .up(kind, up.database.as_deref(), up.migration_id.as_deref(), up.only_single)
                .await?;
            render_result(&result);
        }
        MigrateSubcommand::Down(down) => {
            output::header(&format!("Migrate {} down", kind));
            let result = engine
                .down(kind, &down.database, &down.migration_id, down.only_single)
                .await?;
            render_result(&result);
        }
        MigrateSubcommand::Create(create) => {
            let file = engine
                .create(kind, &create.database, &create.name, create.heavy)
                .await?;
            output::success(&format!("Created {}", file.path.display()));
        }
    }
    Ok(())
}

fn render_status(kind: MigrationType, statuses: &[MigrationStatus]) {
    if statuses.is_empty() {
        output::info(&format!("No {} migrations found", kind));
        return;
    }

    for status in statuses {
        output::section(&status.database);
        if status.migrations.is_empty() {
            output::dim("  no migrations");
            continue;
        }
        for migration in &status.migrations {
            output::list_item(&describe(migration));
        }
        output::kv(
            "Applied/Pending",
            &format!("{}/{}", status.applied().count(), status.pending().count()),
        );
        output::newline();
    }
}

fn describe(migration: &MigrationDescriptor) -> String {
    if !migration.is_applied() {
        return format!("{} {}", output::style_pending("[new]    "), migration.filename);
    }

    let applied_at = migration
        .applied_at
        .and_then(format_timestamp)
        .unwrap_or_default();
    let missing = if migration.path.is_none() {
        output::style_error(" (file missing)")
    } else {
        String::new()
    };
    format!(
        "{} {} {}{}",
        output::style_success("[applied]"),
        migration.filename,
        applied_at,
        missing
    )
}

fn format_timestamp(seconds: f64) -> Option<String> {
    let micros = (seconds * 1_000_000.0).round() as i64;
    DateTime::from_timestamp_micros(micros).map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
}

fn render_result(result: &MigrationResult) {
    for migration in &result.executed {
        let heavy = if migration.heavy { " (heavy)" } else { "" };
        output::list_item(&format!(
            "{}: Migration_{}_{}{}",
            migration.database, migration.migration_id, migration.name, heavy
        ));
    }
    if result.has_changes() {
        output::newline();
        output::success(&result.summary());
    } else {
        output::info(&result.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp(1_704_449_472.5).as_deref(),
            Some("2024-01-05 10:11:12")
        );
    }
}
