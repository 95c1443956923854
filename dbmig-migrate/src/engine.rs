//! Migration engine: applies and reverts migrations in id order.
//!
//! ```text
//!          up()                down()
//!   NEW ──────────▶ APPLIED ──────────▶ (no ledger row)
//! ```
//!
//! Every migration runs inside a transaction. On success the ledger row is
//! inserted (up) or deleted (down); on failure the transaction is rolled back
//! and the remaining migrations of that database are not attempted.

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{MigrationType, ProjectPaths};
use crate::connection::Connection;
use crate::discovery::{MigrationDescriptor, MigrationDiscovery};
use crate::error::{MigrateResult, MigrationError};
use crate::file::MigrationFile;
use crate::history::{LedgerManager, NewMigrationRecord, epoch_seconds};
use crate::migration::{Migration, MigrationFactory};
use crate::registry::ConnectionRegistry;

/// Direction of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Apply.
    Up,
    /// Revert.
    Down,
}

/// Whether a migration falls outside the selection of a run.
///
/// Without a selection nothing is skipped. With `only_single` only the
/// selected id runs. Otherwise an apply runs up to and including the selected
/// id and a rollback runs down to and including it.
pub fn should_skip_migration(current: &str, selected: Option<&str>, only_single: bool, is_rollback: bool) -> bool {
    let Some(selected) = selected else {
        return false;
    };

    if only_single {
        return current != selected;
    }
    if is_rollback {
        current < selected
    } else {
        current > selected
    }
}

/// One migration that ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedMigration {
    /// Database it ran against.
    pub database: String,
    /// Migration identifier.
    pub migration_id: String,
    /// Migration name.
    pub name: String,
    /// Whether it is flagged heavy.
    pub heavy: bool,
}

/// Result of an up or down run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationResult {
    /// Direction of the run.
    pub direction: Direction,
    /// Migrations that ran, in order.
    pub executed: Vec<ExecutedMigration>,
    /// Total duration in milliseconds.
    pub duration_ms: u128,
}

impl MigrationResult {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            executed: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Check if anything ran.
    pub fn has_changes(&self) -> bool {
        !self.executed.is_empty()
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        let verb = match self.direction {
            Direction::Up => "applied",
            Direction::Down => "reverted",
        };
        if self.executed.is_empty() {
            return format!("Nothing {verb}");
        }
        format!("{} {verb} in {}ms", self.executed.len(), self.duration_ms)
    }
}

/// Descriptor list of one database.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationStatus {
    /// Database name.
    pub database: String,
    /// Migrations, ascending by id.
    pub migrations: Vec<MigrationDescriptor>,
}

impl MigrationStatus {
    /// Applied migrations.
    pub fn applied(&self) -> impl Iterator<Item = &MigrationDescriptor> {
        self.migrations.iter().filter(|m| m.is_applied())
    }

    /// Pending migrations.
    pub fn pending(&self) -> impl Iterator<Item = &MigrationDescriptor> {
        self.migrations.iter().filter(|m| !m.is_applied())
    }
}

/// Run a migration in a transaction: begin unless one is open, commit on
/// success, roll back and return the error on failure.
pub async fn run_in_transaction<C: Connection>(conn: &mut C, migration: &dyn Migration, direction: Direction) -> MigrateResult<()> {
    if !conn.in_transaction() {
        conn.begin().await?;
    }

    let result = match direction {
        Direction::Up => migration.up(conn).await,
        Direction::Down => migration.down(conn).await,
    };

    match result {
        Ok(()) => {
            if conn.in_transaction() {
                conn.commit().await?;
            }
            Ok(())
        }
        Err(err) => {
            if conn.in_transaction() {
                if let Err(rollback_err) = conn.rollback().await {
                    warn!(migration = %migration.id(), error = %rollback_err, "Rollback failed");
                }
            }
            Err(err)
        }
    }
}

/// Applies, reverts and scaffolds migrations across databases.
pub struct MigrationEngine<'a, C: Connection> {
    registry: &'a mut ConnectionRegistry<C>,
    discovery: MigrationDiscovery,
    factory: &'a dyn MigrationFactory,
    ledgers: LedgerManager,
}

impl<'a, C: Connection> MigrationEngine<'a, C> {
    /// Create an engine for a project.
    pub fn new(registry: &'a mut ConnectionRegistry<C>, paths: ProjectPaths, factory: &'a dyn MigrationFactory) -> Self {
        Self {
            registry,
            discovery: MigrationDiscovery::new(paths),
            factory,
            ledgers: LedgerManager::new(),
        }
    }

    /// Descriptor lists of one database, or of every database with a
    /// migration folder.
    pub async fn status(&mut self, kind: MigrationType, db: Option<&str>) -> MigrateResult<Vec<MigrationStatus>> {
        let databases = self.target_databases(kind, db).await?;

        let mut statuses = Vec::with_capacity(databases.len());
        for database in databases {
            let migrations = self.descriptors(kind, &database).await?;
            statuses.push(MigrationStatus { database, migrations });
        }
        Ok(statuses)
    }

    /// Apply pending migrations in ascending id order.
    ///
    /// With `migration_id`, applies up to and including it, or only it when
    /// `only_single` is set. The id must be known to the targeted database,
    /// or to at least one database when none is given. Every database is
    /// listed before anything is applied.
    pub async fn up(&mut self, kind: MigrationType, db: Option<&str>, migration_id: Option<&str>, only_single: bool) -> MigrateResult<MigrationResult> {
        let start = Instant::now();
        let mut result = MigrationResult::new(Direction::Up);

        let mut plan = Vec::new();
        for database in self.target_databases(kind, db).await? {
            let descriptors = self.descriptors(kind, &database).await?;
            if db.is_some() {
                ensure_selected(&descriptors, migration_id, &database)?;
            }
            plan.push((database, descriptors));
        }
        if let (None, Some(id)) = (db, migration_id) {
            if !plan.iter().any(|(_, descriptors)| descriptors.iter().any(|d| d.migration_id == id)) {
                return Err(MigrationError::not_found(format!("migration '{id}' in any database")));
            }
        }

        for (database, descriptors) in plan {
            for descriptor in descriptors {
                if descriptor.is_applied() || should_skip_migration(&descriptor.migration_id, migration_id, only_single, false) {
                    continue;
                }
                result.executed.push(self.apply(kind, &database, &descriptor).await?);
            }
        }

        result.duration_ms = start.elapsed().as_millis();
        info!("Migrate up finished: {}", result.summary());
        Ok(result)
    }

    /// Revert applied migrations of a database in descending id order, down
    /// to and including `migration_id`, or only it when `only_single` is set.
    pub async fn down(&mut self, kind: MigrationType, db: &str, migration_id: &str, only_single: bool) -> MigrateResult<MigrationResult> {
        let start = Instant::now();
        let mut result = MigrationResult::new(Direction::Down);

        let descriptors = self.descriptors(kind, db).await?;
        ensure_selected(&descriptors, Some(migration_id), db)?;

        for descriptor in descriptors.iter().rev() {
            if !descriptor.is_applied() || should_skip_migration(&descriptor.migration_id, Some(migration_id), only_single, true) {
                continue;
            }
            result.executed.push(self.revert(kind, db, descriptor).await?);
        }

        result.duration_ms = start.elapsed().as_millis();
        info!("Migrate down finished: {}", result.summary());
        Ok(result)
    }

    /// Scaffold a new migration script for a configured database.
    pub async fn create(&mut self, kind: MigrationType, db: &str, name: &str, heavy: bool) -> MigrateResult<MigrationFile> {
        if db.trim().is_empty() {
            return Err(MigrationError::validation("database name must not be empty"));
        }
        if !self.registry.resolves(db) {
            return Err(MigrationError::not_found(format!("connection for database '{db}'")));
        }
        self.discovery.files(kind, db).write_migration(name, heavy).await
    }

    /// Path of the migration folder of a database.
    pub fn migrations_dir(&self, kind: MigrationType, db: &str) -> PathBuf {
        self.discovery.paths().migrations_dir(kind, db)
    }

    async fn target_databases(&self, kind: MigrationType, db: Option<&str>) -> MigrateResult<Vec<String>> {
        match db {
            Some(name) if name.trim().is_empty() => Err(MigrationError::validation("database name must not be empty")),
            Some(name) => Ok(vec![name.to_string()]),
            None => self.discovery.databases(kind).await,
        }
    }

    async fn descriptors(&mut self, kind: MigrationType, db: &str) -> MigrateResult<Vec<MigrationDescriptor>> {
        let conn = self.registry.get(db).await?;
        let ledger = self.ledgers.ledger(db, kind);
        self.discovery.status_list(conn, ledger, kind, db).await
    }

    async fn apply(&mut self, kind: MigrationType, db: &str, descriptor: &MigrationDescriptor) -> MigrateResult<ExecutedMigration> {
        let migration = self.factory.build(kind, db, descriptor).await?;
        if migration.is_heavy() {
            debug!(migration = %descriptor.migration_id, "Heavy migration, running inline");
        }

        let conn = self.registry.get(db).await?;
        let started_at = epoch_seconds(Utc::now());
        run_in_transaction(&mut *conn, migration.as_ref(), Direction::Up).await?;

        let record = NewMigrationRecord {
            migration_id: descriptor.migration_id.clone(),
            name: descriptor.name.clone(),
            started_at,
            applied_at: epoch_seconds(Utc::now()),
        };
        self.ledgers.ledger(db, kind).insert(conn, record).await?;

        info!(database = %db, migration = %descriptor.migration_id, name = %descriptor.name, "Migration applied");
        Ok(executed(db, descriptor, migration.as_ref()))
    }

    async fn revert(&mut self, kind: MigrationType, db: &str, descriptor: &MigrationDescriptor) -> MigrateResult<ExecutedMigration> {
        let migration = self.factory.build(kind, db, descriptor).await?;

        let conn = self.registry.get(db).await?;
        run_in_transaction(&mut *conn, migration.as_ref(), Direction::Down).await?;
        self.ledgers
            .ledger(db, kind)
            .delete(conn, &descriptor.migration_id)
            .await?;

        info!(database = %db, migration = %descriptor.migration_id, name = %descriptor.name, "Migration reverted");
        Ok(executed(db, descriptor, migration.as_ref()))
    }
}

fn executed(db: &str, descriptor: &MigrationDescriptor, migration: &dyn Migration) -> ExecutedMigration {
    ExecutedMigration {
        database: db.to_string(),
        migration_id: descriptor.migration_id.clone(),
        name: descriptor.name.clone(),
        heavy: migration.is_heavy(),
    }
}

fn ensure_selected(descriptors: &[MigrationDescriptor], selected: Option<&str>, db: &str) -> MigrateResult<()> {
    match selected {
        Some(id) if !descriptors.iter().any(|d| d.migration_id == id) => Err(MigrationError::not_found(format!(
            "migration '{id}' in database '{db}'"
        ))),
        _ => Ok(()),
    }
}
