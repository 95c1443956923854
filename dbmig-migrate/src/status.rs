//! Table and database status read models.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::diff::{TableChange, TableDiff};

/// Reconciliation state of a table or database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaStatus {
    /// Declared and live definitions agree.
    Actual,
    /// Declared but missing live.
    Created,
    /// Live but not declared.
    Removed,
    /// Declared and live definitions differ.
    Modified,
}

impl SchemaStatus {
    /// Display symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Actual => "",
            Self::Created => "+",
            Self::Removed => "-",
            Self::Modified => "?",
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Actual => "actual",
            Self::Created => "created",
            Self::Removed => "removed",
            Self::Modified => "modified",
        }
    }
}

impl fmt::Display for SchemaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One table as declared on disk and as seen live.
///
/// The status is derived once, at construction, from which definitions are
/// present and whether the diff found changes.
#[derive(Debug, Clone, PartialEq)]
pub struct TableStatus {
    name: String,
    local: Option<String>,
    live: Option<String>,
    source: Option<PathBuf>,
    changes: Vec<TableChange>,
    status: SchemaStatus,
}

impl TableStatus {
    /// Build a table status, diffing the two definitions when both exist.
    pub fn new(name: impl Into<String>, local: Option<String>, live: Option<String>) -> Self {
        let changes = match &local {
            Some(local) => TableDiff::compare(local, live.as_deref()).into_changes(),
            None => Vec::new(),
        };
        let status = derive_table_status(local.is_some(), live.is_some(), &changes);

        Self {
            name: name.into(),
            local,
            live,
            source: None,
            changes,
            status,
        }
    }

    /// Attach the file the declared DDL was read from.
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared DDL.
    pub fn local(&self) -> Option<&str> {
        self.local.as_deref()
    }

    /// Live DDL.
    pub fn live(&self) -> Option<&str> {
        self.live.as_deref()
    }

    /// File the declared DDL was read from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Row changes, empty unless both definitions exist.
    pub fn changes(&self) -> &[TableChange] {
        &self.changes
    }

    /// Derived status.
    pub fn status(&self) -> SchemaStatus {
        self.status
    }
}

/// Status of a table from the presence of its definitions and its changes.
pub fn derive_table_status(has_local: bool, has_live: bool, changes: &[TableChange]) -> SchemaStatus {
    if !has_local {
        SchemaStatus::Removed
    } else if !has_live {
        SchemaStatus::Created
    } else if !changes.is_empty() {
        SchemaStatus::Modified
    } else {
        SchemaStatus::Actual
    }
}

/// One database and the status of its tables.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseStatus {
    name: String,
    tables: Vec<TableStatus>,
    status: SchemaStatus,
}

impl DatabaseStatus {
    /// A database with a local schema folder. Tables are sorted by name.
    pub fn declared(name: impl Into<String>, exists: bool, mut tables: Vec<TableStatus>) -> Self {
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        let status = if !exists {
            SchemaStatus::Created
        } else if tables.iter().any(|t| t.status != SchemaStatus::Actual) {
            SchemaStatus::Modified
        } else {
            SchemaStatus::Actual
        };

        Self {
            name: name.into(),
            tables,
            status,
        }
    }

    /// A live database with no local schema folder.
    pub fn undeclared(name: impl Into<String>, mut tables: Vec<TableStatus>) -> Self {
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            name: name.into(),
            tables,
            status: SchemaStatus::Removed,
        }
    }

    /// The requested table exists neither on disk nor live.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            status: SchemaStatus::Modified,
        }
    }

    /// Database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tables, sorted by name.
    pub fn tables(&self) -> &[TableStatus] {
        &self.tables
    }

    /// Derived status.
    pub fn status(&self) -> SchemaStatus {
        self.status
    }

    /// Whether this entry signals a requested table that was not found.
    pub fn is_table_not_found(&self) -> bool {
        self.status == SchemaStatus::Modified && self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::ChangeAction;

    const USERS: &str = "CREATE TABLE `users` (\n  `id` int\n);";

    #[test]
    fn test_table_status_rules() {
        assert_eq!(TableStatus::new("users", None, Some(USERS.into())).status(), SchemaStatus::Removed);
        assert_eq!(TableStatus::new("users", Some(USERS.into()), None).status(), SchemaStatus::Created);
        assert_eq!(
            TableStatus::new("users", Some(USERS.into()), Some(USERS.into())).status(),
            SchemaStatus::Actual
        );

        let modified = TableStatus::new(
            "users",
            Some("CREATE TABLE `users` (\n  `id` bigint\n);".into()),
            Some(USERS.into()),
        );
        assert_eq!(modified.status(), SchemaStatus::Modified);
        assert_eq!(modified.changes()[0].action, ChangeAction::Modified);
    }

    #[test]
    fn test_derive_table_status_is_pure() {
        assert_eq!(derive_table_status(false, false, &[]), SchemaStatus::Removed);
        assert_eq!(derive_table_status(true, true, &[]), SchemaStatus::Actual);
    }

    #[test]
    fn test_database_status() {
        let actual = TableStatus::new("b", Some(USERS.into()), Some(USERS.into()));
        let created = TableStatus::new("a", Some(USERS.into()), None);

        let db = DatabaseStatus::declared("shop", true, vec![actual.clone(), created]);
        assert_eq!(db.status(), SchemaStatus::Modified);
        assert_eq!(db.tables()[0].name(), "a");

        assert_eq!(DatabaseStatus::declared("shop", true, vec![actual.clone()]).status(), SchemaStatus::Actual);
        assert_eq!(DatabaseStatus::declared("shop", false, vec![]).status(), SchemaStatus::Created);
        assert_eq!(DatabaseStatus::undeclared("old", vec![actual]).status(), SchemaStatus::Removed);

        let missing = DatabaseStatus::table_not_found("shop");
        assert_eq!(missing.status(), SchemaStatus::Modified);
        assert!(missing.is_table_not_found());
    }

    #[test]
    fn test_symbols() {
        assert_eq!(SchemaStatus::Actual.symbol(), "");
        assert_eq!(SchemaStatus::Created.symbol(), "+");
        assert_eq!(SchemaStatus::Removed.symbol(), "-");
        assert_eq!(SchemaStatus::Modified.symbol(), "?");
    }
}
