//! Project paths and migration types.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MigrationError;

/// Folder holding declared table schemas, relative to the db folder.
pub const SCHEMA_DIR: &str = "schema";

/// Folder holding per-table initial data, relative to a database schema folder.
pub const INIT_DATA_DIR: &str = "init";

/// Prefix shared by every ledger table.
pub const LEDGER_TABLE_PREFIX: &str = "_db_";

/// Namespacing axis for migrations. Each type has its own folder tree and
/// ledger table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationType {
    /// DDL-oriented migrations.
    Structure,
    /// Content-oriented migrations.
    Data,
}

impl MigrationType {
    /// All migration types.
    pub const ALL: [MigrationType; 2] = [MigrationType::Structure, MigrationType::Data];

    /// Folder and ledger suffix for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::Data => "data",
        }
    }

    /// Name of the ledger table for this type.
    pub fn ledger_table(&self) -> String {
        format!("{}{}", LEDGER_TABLE_PREFIX, self.as_str())
    }
}

impl fmt::Display for MigrationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MigrationType {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "structure" => Ok(Self::Structure),
            "data" => Ok(Self::Data),
            other => Err(MigrationError::validation(format!(
                "unknown migration type '{other}', expected 'structure' or 'data'"
            ))),
        }
    }
}

/// Filesystem anchor for a project.
///
/// ```text
/// <db_root>/
/// ├── schema/<db>/<table>.sql
/// ├── schema/<db>/init/<table>.sql
/// ├── structure/<db>/Migration_<id>_<Name>.sql
/// └── data/<db>/Migration_<id>_<Name>.sql
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    db_root: PathBuf,
}

impl ProjectPaths {
    /// Anchor the project at a db folder.
    pub fn new(db_root: impl Into<PathBuf>) -> Self {
        Self {
            db_root: db_root.into(),
        }
    }

    /// The db folder itself.
    pub fn db_root(&self) -> &Path {
        &self.db_root
    }

    /// Root of the declared schemas.
    pub fn schema_root(&self) -> PathBuf {
        self.db_root.join(SCHEMA_DIR)
    }

    /// Schema folder of one database.
    pub fn schema_dir(&self, db: &str) -> PathBuf {
        self.schema_root().join(db)
    }

    /// Declared schema file of one table.
    pub fn schema_file(&self, db: &str, table: &str) -> PathBuf {
        self.schema_dir(db).join(format!("{table}.sql"))
    }

    /// Initial data script of one table.
    pub fn init_data_file(&self, db: &str, table: &str) -> PathBuf {
        self.schema_dir(db)
            .join(INIT_DATA_DIR)
            .join(format!("{table}.sql"))
    }

    /// Root of the migrations of one type.
    pub fn migrations_root(&self, kind: MigrationType) -> PathBuf {
        self.db_root.join(kind.as_str())
    }

    /// Migration folder of one database.
    pub fn migrations_dir(&self, kind: MigrationType, db: &str) -> PathBuf {
        self.migrations_root(kind).join(db)
    }
}
