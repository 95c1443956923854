//! `dbmig schema` commands - Schema reconciliation.

use dbmig_migrate::{
    DatabaseOutcome, DatabaseStatus, ReconcileReport, SchemaLoader, SchemaReconciler, TableOutcome,
};

use crate::cli::{SchemaArgs, SchemaSubcommand, TargetArgs};
use crate::config::Project;
use crate::error::{CliError, CliResult};
use crate::output;
use crate::prompt::prompt;

/// Run the schema command
pub async fn run(args: SchemaArgs, project: &Project) -> CliResult<()> {
    let paths = project.paths();
    let loader = SchemaLoader::new(paths.schema_root());
    let mut registry = project.connect().await?;

    match args.command {
        SchemaSubcommand::Status(target) => {
            let prompt = prompt(Some(false));
            let mut reconciler = SchemaReconciler::new(&mut registry, loader, &prompt);
            let statuses = reconciler.status(target_db(&target), target_table(&target)).await?;
            render_status(&statuses);
            Ok(())
        }
        SchemaSubcommand::Init(init) => {
            output::header("Schema Init");
            output::kv("Schema", &paths.schema_root().display().to_string());
            output::newline();

            let prompt = prompt(init.confirm.answer());
            let mut reconciler = SchemaReconciler::new(&mut registry, loader, &prompt);
            let report = reconciler
                .reconcile(target_db(&init.target), target_table(&init.target), init.without_data)
                .await?;
            finish(&report)
        }
        SchemaSubcommand::Dump(dump) => {
            output::header("Schema Dump");
            output::kv("Schema", &paths.schema_root().display().to_string());
            output::newline();

            let prompt = prompt(dump.confirm.answer());
            let mut reconciler = SchemaReconciler::new(&mut registry, loader, &prompt);
            let report = reconciler
                .dump(target_db(&dump.target), target_table(&dump.target))
                .await?;
            finish(&report)
        }
    }
}

fn target_db(target: &TargetArgs) -> Option<&str> {
    target.database.as_deref()
}

fn target_table(target: &TargetArgs) -> Option<&str> {
    target.table.as_deref()
}

fn render_status(statuses: &[DatabaseStatus]) {
    if statuses.is_empty() {
        output::info("No databases declared");
        return;
    }

    for database in statuses {
        output::section(&output::status_label(database.status(), database.name()));
        if database.is_table_not_found() {
            output::warn("  Table not found");
            continue;
        }
        for table in database.tables() {
            output::list_item(&output::status_label(table.status(), table.name()));
            for change in table.changes() {
                output::nested_item(&output::change_label(change.action, &change.field));
            }
        }
    }
}

fn finish(report: &ReconcileReport) -> CliResult<()> {
    render_report(report);
    output::newline();

    let failures: Vec<_> = report.failures().collect();
    if failures.is_empty() {
        output::success(&report.summary());
        return Ok(());
    }

    output::warn(&report.summary());
    Err(CliError::Database(format!(
        "{} table(s) failed: {}",
        failures.len(),
        failures
            .iter()
            .map(|(db, table)| format!("{}.{}", db, table.name))
            .collect::<Vec<_>>()
            .join(", ")
    )))
}

fn render_report(report: &ReconcileReport) {
    for database in &report.databases {
        let outcome = match database.outcome {
            DatabaseOutcome::Unchanged => "up to date",
            DatabaseOutcome::Created => "created",
            DatabaseOutcome::Dropped => "dropped",
            DatabaseOutcome::Updated => "updated",
            DatabaseOutcome::Declined => "skipped",
            DatabaseOutcome::NotFound => "not found",
        };
        output::section(&format!(
            "{} ({})",
            output::status_label(database.status, &database.name),
            outcome
        ));

        for table in &database.tables {
            let outcome = match &table.outcome {
                TableOutcome::Unchanged => output::style_success("up to date"),
                TableOutcome::Created { with_data: true } => output::style_success("created with data"),
                TableOutcome::Created { with_data: false } => output::style_success("created"),
                TableOutcome::Recreated { with_data: true } => output::style_success("recreated with data"),
                TableOutcome::Recreated { with_data: false } => output::style_success("recreated"),
                TableOutcome::Dropped => output::style_success("dropped"),
                TableOutcome::SchemaWritten => output::style_success("schema written"),
                TableOutcome::SchemaDeleted => output::style_success("schema deleted"),
                TableOutcome::Declined => output::style_pending("skipped"),
                TableOutcome::Failed(message) => output::style_error(&format!("failed: {}", message)),
            };
            output::list_item(&format!("{} {}", table.name, outcome));
        }
    }
}
