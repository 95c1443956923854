//! Declared schemas on disk.
//!
//! Each first-level folder of the schema root is a database; each `*.sql` file
//! inside it is one table, named by its `CREATE TABLE` header.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex_lite::{NoExpand, Regex};
use tracing::{debug, info};

use crate::config::INIT_DATA_DIR;
use crate::connection::quote_qualified;
use crate::error::{MigrateResult, MigrationError};

static TABLE_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^CREATE\s+TABLE\s+`([a-zA-Z0-9_.\-]+)`\s+\($").expect("header pattern is valid")
});

static TABLE_HEADER_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)CREATE\s+TABLE\s+`[^`]+`\s+\(").expect("header prefix pattern is valid")
});

/// One declared table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaFile {
    /// Table name from the DDL header.
    pub name: String,
    /// Normalized DDL.
    pub ddl: String,
    /// Source file.
    pub path: PathBuf,
    /// Owning database.
    pub database: String,
}

/// One database folder and its declared tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDatabase {
    /// Database name (the folder name).
    pub name: String,
    /// Tables, by file name.
    pub tables: Vec<SchemaFile>,
}

impl LocalDatabase {
    /// Find a table, ignoring case.
    pub fn table(&self, name: &str) -> Option<&SchemaFile> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

/// Table name from the first non-empty line of a `CREATE TABLE` statement.
pub fn table_name_from_schema(ddl: &str) -> MigrateResult<String> {
    let header = ddl
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| MigrationError::format("schema is empty"))?;

    TABLE_HEADER_RE
        .captures(header)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| {
            MigrationError::format(format!(
                "first line must be \"CREATE TABLE `name` (\", found \"{header}\""
            ))
        })
}

/// Rewrite the table header so the statement targets `db`.`table`.
pub fn qualify_schema(db: &str, table: &str, ddl: &str) -> String {
    let header = format!("CREATE TABLE {} (", quote_qualified(db, table));
    TABLE_HEADER_PREFIX_RE
        .replacen(ddl, 1, NoExpand(&header))
        .into_owned()
}

/// Trim a statement and end it with exactly one `;`.
pub fn normalize_ddl(ddl: &str) -> String {
    format!("{};", ddl.trim().trim_end_matches(';').trim_end())
}

/// Reads and writes the declared schema tree.
#[derive(Debug, Clone)]
pub struct SchemaLoader {
    root: PathBuf,
}

impl SchemaLoader {
    /// Create a loader for a schema root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The schema root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load every declared database, sorted by name. Creates the root when it
    /// is missing.
    pub async fn load(&self) -> MigrateResult<Vec<LocalDatabase>> {
        if !self.root.exists() {
            tokio::fs::create_dir_all(&self.root).await?;
            debug!("Created schema root: {:?}", self.root);
            return Ok(Vec::new());
        }

        let mut databases = Vec::new();
        for dir in sorted_entries(&self.root, true).await? {
            let Some(name) = file_name(&dir) else {
                continue;
            };
            databases.push(self.load_database(&name).await?);
        }

        debug!("Loaded {} declared databases", databases.len());
        Ok(databases)
    }

    /// Load one database folder. A missing folder yields no tables.
    pub async fn load_database(&self, db: &str) -> MigrateResult<LocalDatabase> {
        let dir = self.root.join(db);
        let mut tables = Vec::new();

        if dir.is_dir() {
            for path in sorted_entries(&dir, false).await? {
                if path.extension().and_then(|e| e.to_str()) != Some("sql") {
                    continue;
                }
                tables.push(self.load_file(&path, db).await?);
            }
        }

        Ok(LocalDatabase {
            name: db.to_string(),
            tables,
        })
    }

    /// Read one schema file.
    pub async fn load_file(&self, path: &Path, db: &str) -> MigrateResult<SchemaFile> {
        let content = tokio::fs::read_to_string(path).await?;
        let name = table_name_from_schema(&content)
            .map_err(|e| MigrationError::format(format!("{}: {e}", path.display())))?;

        Ok(SchemaFile {
            name,
            ddl: normalize_ddl(&content),
            path: path.to_path_buf(),
            database: db.to_string(),
        })
    }

    /// Path of a table's schema file.
    pub fn schema_path(&self, db: &str, table: &str) -> PathBuf {
        self.root.join(db).join(format!("{table}.sql"))
    }

    /// Write a table's schema file, creating folders as needed.
    pub async fn write_schema(&self, db: &str, table: &str, ddl: &str) -> MigrateResult<PathBuf> {
        let path = self.schema_path(db, table);
        self.write_schema_file(&path, ddl).await?;
        Ok(path)
    }

    /// Overwrite the schema file at `path`, creating folders as needed.
    pub async fn write_schema_file(&self, path: &Path, ddl: &str) -> MigrateResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, format!("{}\n", normalize_ddl(ddl))).await?;
        info!(path = %path.display(), "Schema file written");
        Ok(())
    }

    /// Delete a table's schema file.
    pub async fn delete_schema(&self, db: &str, table: &str) -> MigrateResult<()> {
        self.delete_schema_file(&self.schema_path(db, table)).await
    }

    /// Delete the schema file at `path`.
    pub async fn delete_schema_file(&self, path: &Path) -> MigrateResult<()> {
        if !path.exists() {
            return Err(MigrationError::not_found(format!(
                "schema file {}",
                path.display()
            )));
        }
        tokio::fs::remove_file(path).await?;
        info!(path = %path.display(), "Schema file deleted");
        Ok(())
    }

    /// Initial data script of a table, if one exists.
    pub async fn read_init_data(&self, db: &str, table: &str) -> MigrateResult<Option<String>> {
        let path = self
            .root
            .join(db)
            .join(INIT_DATA_DIR)
            .join(format!("{table}.sql"));
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(tokio::fs::read_to_string(&path).await?))
    }
}

/// Directory entries sorted by path, either only folders or only files.
/// Dot-entries are skipped.
pub(crate) async fn sorted_entries(dir: &Path, dirs: bool) -> MigrateResult<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if file_name(&path).is_none_or(|n| n.starts_with('.')) {
            continue;
        }
        let is_dir = entry.file_type().await?.is_dir();
        if is_dir == dirs {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const USERS: &str = "CREATE TABLE `users` (\n  `id` int NOT NULL\n) ENGINE=InnoDB";

    #[test]
    fn test_table_name_from_schema() {
        assert_eq!(table_name_from_schema(USERS).unwrap(), "users");
        assert_eq!(table_name_from_schema("\n\ncreate table `a-b_c.d` (\n);").unwrap(), "a-b_c.d");
    }

    #[test]
    fn test_table_name_bad_header() {
        assert!(matches!(
            table_name_from_schema("CREATE TABLE users (\n);"),
            Err(MigrationError::Format(_))
        ));
        assert!(matches!(table_name_from_schema("  \n"), Err(MigrationError::Format(_))));
    }

    #[test]
    fn test_qualify_schema() {
        assert_eq!(
            qualify_schema("shop", "users", USERS),
            "CREATE TABLE `shop`.`users` (\n  `id` int NOT NULL\n) ENGINE=InnoDB"
        );
    }

    #[test]
    fn test_normalize_ddl() {
        assert_eq!(normalize_ddl("  CREATE TABLE x;;\n\n"), "CREATE TABLE x;");
        assert_eq!(normalize_ddl("CREATE TABLE x"), "CREATE TABLE x;");
    }

    #[tokio::test]
    async fn test_load_creates_missing_root() {
        let tmp = TempDir::new().unwrap();
        let loader = SchemaLoader::new(tmp.path().join("schema"));

        assert!(loader.load().await.unwrap().is_empty());
        assert!(tmp.path().join("schema").is_dir());
    }

    #[tokio::test]
    async fn test_load_databases() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("schema");
        std::fs::create_dir_all(root.join("shop/init")).unwrap();
        std::fs::create_dir_all(root.join("blog")).unwrap();
        std::fs::write(root.join("shop/users.sql"), USERS).unwrap();
        std::fs::write(root.join("shop/notes.txt"), "ignored").unwrap();
        std::fs::write(root.join("shop/init/users.sql"), "INSERT INTO users VALUES (1);").unwrap();

        let loader = SchemaLoader::new(&root);
        let databases = loader.load().await.unwrap();

        assert_eq!(databases.len(), 2);
        assert_eq!(databases[0].name, "blog");
        assert!(databases[0].tables.is_empty());
        assert_eq!(databases[1].tables.len(), 1);

        let users = databases[1].table("USERS").unwrap();
        assert_eq!(users.database, "shop");
        assert!(users.ddl.ends_with("ENGINE=InnoDB;"));

        let init = loader.read_init_data("shop", "users").await.unwrap();
        assert!(init.unwrap().starts_with("INSERT"));
        assert!(loader.read_init_data("shop", "orders").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_rejects_bad_header() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("shop")).unwrap();
        std::fs::write(tmp.path().join("shop/users.sql"), "DROP TABLE users;").unwrap();

        let err = SchemaLoader::new(tmp.path()).load().await.unwrap_err();
        assert!(matches!(err, MigrationError::Format(_)));
    }

    #[tokio::test]
    async fn test_write_and_delete_schema() {
        let tmp = TempDir::new().unwrap();
        let loader = SchemaLoader::new(tmp.path());

        let path = loader.write_schema("shop", "users", USERS).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.ends_with("ENGINE=InnoDB;\n"));

        loader.delete_schema("shop", "users").await.unwrap();
        assert!(!path.exists());
        assert!(matches!(
            loader.delete_schema("shop", "users").await,
            Err(MigrationError::NotFound(_))
        ));
    }
}
