//! Merged view of ledger rows and script files.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::{MigrationType, ProjectPaths};
use crate::connection::Connection;
use crate::error::MigrateResult;
use crate::file::{MigrationFileManager, list_databases};
use crate::history::{MigrationLedger, MigrationRecord};
use crate::identity::make_filename;

/// Whether a migration has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationState {
    /// Known only from its script.
    New,
    /// Recorded in the ledger.
    Applied,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str("new"),
            Self::Applied => f.write_str("applied"),
        }
    }
}

/// One migration as known from the ledger and/or its script file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationDescriptor {
    /// Migration identifier.
    pub migration_id: String,
    /// Migration name.
    pub name: String,
    /// Script file name.
    pub filename: String,
    /// Script path, when the file exists.
    pub path: Option<PathBuf>,
    /// Applied or not.
    pub state: MigrationState,
    /// When `up` started, epoch seconds.
    pub started_at: Option<f64>,
    /// When the migration was recorded, epoch seconds.
    pub applied_at: Option<f64>,
}

impl MigrationDescriptor {
    /// Descriptor of a ledger row.
    pub fn applied(record: &MigrationRecord) -> Self {
        Self {
            migration_id: record.migration_id.clone(),
            name: record.name.clone(),
            filename: make_filename(&record.migration_id, &record.name),
            path: None,
            state: MigrationState::Applied,
            started_at: Some(record.started_at),
            applied_at: Some(record.applied_at),
        }
    }

    /// Descriptor of a script not in the ledger.
    pub fn new_file(id: impl Into<String>, name: impl Into<String>, path: PathBuf) -> Self {
        let id = id.into();
        let name = name.into();
        Self {
            filename: make_filename(&id, &name),
            migration_id: id,
            name,
            path: Some(path),
            state: MigrationState::New,
            started_at: None,
            applied_at: None,
        }
    }

    /// Check if the migration is applied.
    pub fn is_applied(&self) -> bool {
        self.state == MigrationState::Applied
    }
}

/// Builds descriptor lists for a project.
#[derive(Debug, Clone)]
pub struct MigrationDiscovery {
    paths: ProjectPaths,
}

impl MigrationDiscovery {
    /// Create discovery over a project.
    pub fn new(paths: ProjectPaths) -> Self {
        Self { paths }
    }

    /// Project paths.
    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// Script manager of one database and type.
    pub fn files(&self, kind: MigrationType, db: &str) -> MigrationFileManager {
        MigrationFileManager::new(self.paths.migrations_dir(kind, db))
    }

    /// Databases that have a migration folder for a type.
    pub async fn databases(&self, kind: MigrationType) -> MigrateResult<Vec<String>> {
        list_databases(&self.paths.migrations_root(kind)).await
    }

    /// Every migration of a database and type, ascending by id.
    ///
    /// Ledger rows come first as applied; scripts whose id is not recorded
    /// are added as new.
    pub async fn status_list(
        &self,
        conn: &mut dyn Connection,
        ledger: &mut MigrationLedger,
        kind: MigrationType,
        db: &str,
    ) -> MigrateResult<Vec<MigrationDescriptor>> {
        let mut merged: BTreeMap<String, MigrationDescriptor> = BTreeMap::new();

        for record in ledger.find_migrations(conn, None).await? {
            merged.insert(record.migration_id.clone(), MigrationDescriptor::applied(&record));
        }

        for file in self.files(kind, db).list_migrations().await? {
            match merged.get_mut(&file.id) {
                Some(descriptor) => descriptor.path = Some(file.path),
                None => {
                    merged.insert(file.id.clone(), MigrationDescriptor::new_file(file.id, file.name, file.path));
                }
            }
        }

        Ok(merged.into_values().collect())
    }
}
