//! Schema reconciliation between the declared tree and live databases.
//!
//! [`SchemaReconciler::status`] joins the [`SchemaLoader`] output with live
//! catalog reads and produces one [`DatabaseStatus`] per database.
//! [`SchemaReconciler::reconcile`] pushes the declared schema to the server
//! and [`SchemaReconciler::dump`] pulls live DDL back into the tree. Both ask
//! the [`Prompt`] before anything destructive and return a report instead of
//! printing.

use tracing::{info, warn};

use crate::catalog::SchemaCatalog;
use crate::connection::Connection;
use crate::error::{MigrateResult, MigrationError};
use crate::loader::{LocalDatabase, SchemaLoader};
use crate::prompt::Prompt;
use crate::registry::ConnectionRegistry;
use crate::status::{DatabaseStatus, SchemaStatus, TableStatus};

/// What happened to one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOutcome {
    /// Nothing to do.
    Unchanged,
    /// Table created. `with_data` when an initial data script ran.
    Created {
        /// Initial data loaded.
        with_data: bool,
    },
    /// Table dropped and created again from its schema.
    Recreated {
        /// Initial data loaded.
        with_data: bool,
    },
    /// Live table dropped.
    Dropped,
    /// Schema file written from live DDL.
    SchemaWritten,
    /// Schema file deleted.
    SchemaDeleted,
    /// The operator declined the change.
    Declined,
    /// A statement failed; the rest of the batch went on.
    Failed(String),
}

/// What happened to one database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseOutcome {
    /// Nothing to do.
    Unchanged,
    /// Database created.
    Created,
    /// Database dropped.
    Dropped,
    /// Table-level work was carried out.
    Updated,
    /// The operator declined the change.
    Declined,
    /// The database, or the requested table, does not exist.
    NotFound,
}

/// Outcome for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    /// Table name.
    pub name: String,
    /// Status before the run.
    pub status: SchemaStatus,
    /// What was done.
    pub outcome: TableOutcome,
}

/// Outcome for one database and its tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseReport {
    /// Database name.
    pub name: String,
    /// Status before the run.
    pub status: SchemaStatus,
    /// What was done at database level.
    pub outcome: DatabaseOutcome,
    /// Per-table outcomes.
    pub tables: Vec<TableReport>,
}

impl DatabaseReport {
    fn new(status: &DatabaseStatus, outcome: DatabaseOutcome) -> Self {
        Self {
            name: status.name().to_string(),
            status: status.status(),
            outcome,
            tables: Vec::new(),
        }
    }

    fn push(&mut self, table: &TableStatus, outcome: TableOutcome) {
        self.tables.push(TableReport {
            name: table.name().to_string(),
            status: table.status(),
            outcome,
        });
    }
}

/// Result of a reconcile or dump run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// One entry per database, in processing order.
    pub databases: Vec<DatabaseReport>,
}

impl ReconcileReport {
    /// Tables whose statements failed.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &TableReport)> {
        self.databases.iter().flat_map(|db| {
            db.tables
                .iter()
                .filter(|t| matches!(t.outcome, TableOutcome::Failed(_)))
                .map(move |t| (db.name.as_str(), t))
        })
    }

    /// Check if any table failed.
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Get a human-readable summary.
    pub fn summary(&self) -> String {
        let mut changed = 0;
        let mut declined = 0;
        let mut failed = 0;
        for table in self.databases.iter().flat_map(|db| db.tables.iter()) {
            match table.outcome {
                TableOutcome::Unchanged => {}
                TableOutcome::Declined => declined += 1,
                TableOutcome::Failed(_) => failed += 1,
                _ => changed += 1,
            }
        }
        format!(
            "{} databases, {changed} tables changed, {declined} declined, {failed} failed",
            self.databases.len()
        )
    }
}

/// Reconciles declared schemas with live databases.
pub struct SchemaReconciler<'a, C: Connection> {
    registry: &'a mut ConnectionRegistry<C>,
    loader: SchemaLoader,
    prompt: &'a dyn Prompt,
}

impl<'a, C: Connection> SchemaReconciler<'a, C> {
    /// Create a reconciler over a schema root.
    pub fn new(registry: &'a mut ConnectionRegistry<C>, loader: SchemaLoader, prompt: &'a dyn Prompt) -> Self {
        Self {
            registry,
            loader,
            prompt,
        }
    }

    /// Status of every declared database, or of one database and optionally
    /// one table.
    ///
    /// A requested database that is not declared is reported `REMOVED` with
    /// its live tables. A requested table found nowhere yields an entry with
    /// no tables and `MODIFIED` status.
    pub async fn status(&mut self, db: Option<&str>, table: Option<&str>) -> MigrateResult<Vec<DatabaseStatus>> {
        validate_filter(db, table)?;

        let declared = self.loader.load().await?;
        let mut statuses = Vec::new();
        for database in &declared {
            if db.is_some_and(|name| name != database.name) {
                continue;
            }
            statuses.push(self.declared_status(database, table).await?);
        }

        if let Some(name) = db {
            if statuses.is_empty() {
                statuses.push(self.undeclared_status(name, table).await?);
            }
        }

        Ok(statuses)
    }

    async fn declared_status(&mut self, database: &LocalDatabase, table: Option<&str>) -> MigrateResult<DatabaseStatus> {
        let name = database.name.as_str();
        let conn = self.registry.get(name).await?;
        let mut catalog = SchemaCatalog::new(conn);

        let exists = catalog.database_exists(name).await?;
        let live_tables = catalog.list_tables(name).await?;

        let mut tables = Vec::new();
        for schema in &database.tables {
            if !matches_table(table, &schema.name) {
                continue;
            }
            let live = if exists {
                catalog.create_table_syntax(name, &schema.name).await?
            } else {
                None
            };
            tables.push(TableStatus::new(&schema.name, Some(schema.ddl.clone()), live).with_source(&schema.path));
        }

        for live_name in live_tables {
            if !matches_table(table, &live_name) || database.table(&live_name).is_some() {
                continue;
            }
            let live = catalog.create_table_syntax(name, &live_name).await?;
            tables.push(TableStatus::new(live_name, None, live));
        }

        if table.is_some() && tables.is_empty() {
            return Ok(DatabaseStatus::table_not_found(name));
        }
        Ok(DatabaseStatus::declared(name, exists, tables))
    }

    async fn undeclared_status(&mut self, name: &str, table: Option<&str>) -> MigrateResult<DatabaseStatus> {
        let conn = self.registry.get(name).await?;
        let mut catalog = SchemaCatalog::new(conn);

        let mut tables = Vec::new();
        for live_name in catalog.list_tables(name).await? {
            if !matches_table(table, &live_name) {
                continue;
            }
            let live = catalog.create_table_syntax(name, &live_name).await?;
            tables.push(TableStatus::new(live_name, None, live));
        }

        if table.is_some() && tables.is_empty() {
            return Ok(DatabaseStatus::table_not_found(name));
        }
        Ok(DatabaseStatus::undeclared(name, tables))
    }

    /// Bring live databases to the declared schema.
    ///
    /// Missing databases and tables are created, differing tables are
    /// recreated and undeclared ones dropped after confirmation. Unless
    /// `without_data` is set, created tables are filled from their initial
    /// data script. A failing statement marks that table failed and the run
    /// continues with the next one.
    pub async fn reconcile(&mut self, db: Option<&str>, table: Option<&str>, without_data: bool) -> MigrateResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for status in self.status(db, table).await? {
            let name = status.name().to_string();

            if status.is_table_not_found() {
                report.databases.push(DatabaseReport::new(&status, DatabaseOutcome::NotFound));
                continue;
            }

            let outcome = match status.status() {
                SchemaStatus::Actual => DatabaseOutcome::Unchanged,
                SchemaStatus::Modified => DatabaseOutcome::Updated,
                SchemaStatus::Created => {
                    let conn = self.registry.raw(&name)?;
                    SchemaCatalog::new(conn).create_database(&name, false).await?;
                    DatabaseOutcome::Created
                }
                SchemaStatus::Removed => {
                    let outcome = self.drop_undeclared_database(&name).await?;
                    report.databases.push(DatabaseReport::new(&status, outcome));
                    continue;
                }
            };

            let mut db_report = DatabaseReport::new(&status, outcome);
            for table_status in status.tables() {
                let outcome = self.reconcile_table(&name, table_status, without_data).await?;
                db_report.push(table_status, outcome);
            }
            report.databases.push(db_report);
        }

        info!("Reconcile finished: {}", report.summary());
        Ok(report)
    }

    async fn drop_undeclared_database(&mut self, name: &str) -> MigrateResult<DatabaseOutcome> {
        let conn = self.registry.raw(name)?;
        let mut catalog = SchemaCatalog::new(conn);
        if !catalog.database_exists(name).await? {
            return Ok(DatabaseOutcome::NotFound);
        }

        let message = format!("Database '{name}' is not declared in the schema, drop it?");
        if !self.prompt.confirm(&message, false) {
            return Ok(DatabaseOutcome::Declined);
        }
        catalog.drop_database(name).await?;
        Ok(DatabaseOutcome::Dropped)
    }

    async fn reconcile_table(&mut self, db: &str, table: &TableStatus, without_data: bool) -> MigrateResult<TableOutcome> {
        let result = match table.status() {
            SchemaStatus::Actual => return Ok(TableOutcome::Unchanged),
            SchemaStatus::Created => self
                .create_table(db, table, false, without_data)
                .await
                .map(|with_data| TableOutcome::Created { with_data }),
            SchemaStatus::Modified => {
                let message = format!("Table '{db}.{}' differs from its schema, recreate it?", table.name());
                if !self.prompt.confirm(&message, false) {
                    return Ok(TableOutcome::Declined);
                }
                self.create_table(db, table, true, without_data)
                    .await
                    .map(|with_data| TableOutcome::Recreated { with_data })
            }
            SchemaStatus::Removed => {
                let message = format!("Table '{db}.{}' is not declared in the schema, drop it?", table.name());
                if !self.prompt.confirm(&message, false) {
                    return Ok(TableOutcome::Declined);
                }
                let conn = self.registry.raw(db)?;
                SchemaCatalog::new(conn)
                    .drop_table(db, table.name())
                    .await
                    .map(|()| TableOutcome::Dropped)
            }
        };

        match result {
            Err(err) if err.is_sql() => {
                warn!(database = %db, table = %table.name(), error = %err, "Table reconcile failed");
                Ok(TableOutcome::Failed(err.to_string()))
            }
            other => other,
        }
    }

    /// Create or recreate a table and load its initial data. Returns whether
    /// data was loaded.
    async fn create_table(&mut self, db: &str, table: &TableStatus, force: bool, without_data: bool) -> MigrateResult<bool> {
        let schema = table
            .local()
            .ok_or_else(|| MigrationError::not_found(format!("schema for table '{db}.{}'", table.name())))?;

        let data = if without_data {
            None
        } else {
            self.loader.read_init_data(db, table.name()).await?
        };

        let conn = self.registry.get(db).await?;
        let mut catalog = SchemaCatalog::new(conn);
        catalog.create_table(db, schema, force).await?;

        match data {
            Some(script) => {
                catalog.execute_script(&script).await?;
                info!(database = %db, table = %table.name(), "Initial data loaded");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Bring the declared tree to the live databases.
    ///
    /// Live tables missing on disk get a schema file, differing schema files
    /// are overwritten and files of tables missing live are deleted after
    /// confirmation. Without `db`, every registered connection name is dumped.
    pub async fn dump(&mut self, db: Option<&str>, table: Option<&str>) -> MigrateResult<ReconcileReport> {
        let names = match db {
            Some(name) => vec![name.to_string()],
            None => self.registry.names(),
        };
        if names.is_empty() {
            return Err(MigrationError::validation("no databases to dump"));
        }

        let mut report = ReconcileReport::default();
        for name in &names {
            for status in self.status(Some(name), table).await? {
                let conn = self.registry.raw(status.name())?;
                if status.is_table_not_found() || !SchemaCatalog::new(conn).database_exists(status.name()).await? {
                    report.databases.push(DatabaseReport::new(&status, DatabaseOutcome::NotFound));
                    continue;
                }
                if status.status() == SchemaStatus::Actual {
                    let mut db_report = DatabaseReport::new(&status, DatabaseOutcome::Unchanged);
                    for table_status in status.tables() {
                        db_report.push(table_status, TableOutcome::Unchanged);
                    }
                    report.databases.push(db_report);
                    continue;
                }

                let mut db_report = DatabaseReport::new(&status, DatabaseOutcome::Updated);
                for table_status in status.tables() {
                    let outcome = self.dump_table(status.name(), table_status).await?;
                    db_report.push(table_status, outcome);
                }
                report.databases.push(db_report);
            }
        }

        info!("Dump finished: {}", report.summary());
        Ok(report)
    }

    async fn dump_table(&mut self, db: &str, table: &TableStatus) -> MigrateResult<TableOutcome> {
        match (table.status(), table.live()) {
            (SchemaStatus::Actual, _) => Ok(TableOutcome::Unchanged),
            (SchemaStatus::Modified, Some(live)) => {
                let message = format!("Schema of '{db}.{}' differs from the live table, overwrite it?", table.name());
                if !self.prompt.confirm(&message, false) {
                    return Ok(TableOutcome::Declined);
                }
                match table.source() {
                    Some(path) => self.loader.write_schema_file(path, live).await?,
                    None => {
                        self.loader.write_schema(db, table.name(), live).await?;
                    }
                }
                Ok(TableOutcome::SchemaWritten)
            }
            (SchemaStatus::Removed, Some(live)) => {
                self.loader.write_schema(db, table.name(), live).await?;
                Ok(TableOutcome::SchemaWritten)
            }
            (SchemaStatus::Created, _) => {
                let message = format!("Table '{db}.{}' does not exist, delete its schema file?", table.name());
                if !self.prompt.confirm(&message, false) {
                    return Ok(TableOutcome::Declined);
                }
                match table.source() {
                    Some(path) => self.loader.delete_schema_file(path).await?,
                    None => self.loader.delete_schema(db, table.name()).await?,
                }
                Ok(TableOutcome::SchemaDeleted)
            }
            (_, None) => Err(MigrationError::not_found(format!("live table '{db}.{}'", table.name()))),
        }
    }
}

fn validate_filter(db: Option<&str>, table: Option<&str>) -> MigrateResult<()> {
    if db.is_some_and(|name| name.trim().is_empty()) {
        return Err(MigrationError::validation("database name must not be empty"));
    }
    if table.is_some_and(|name| name.trim().is_empty()) {
        return Err(MigrationError::validation("table name must not be empty"));
    }
    Ok(())
}

fn matches_table(filter: Option<&str>, name: &str) -> bool {
    filter.is_none_or(|wanted| wanted.eq_ignore_ascii_case(name))
}
