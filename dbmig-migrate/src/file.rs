//! Migration script files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MigrateResult, MigrationError};
use crate::identity::{class_name, generate_id, make_filename, normalize_name, parse_filename};
use crate::loader::sorted_entries;

/// A migration script on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFile {
    /// Path to the script.
    pub path: PathBuf,
    /// Migration ID (from the file name).
    pub id: String,
    /// Migration name (from the file name).
    pub name: String,
}

/// Render the script a new migration starts from.
pub fn render_template(id: &str, name: &str, heavy: bool) -> String {
    format!(
        "-- {}\n\
         -- heavy: {heavy}\n\
         \n\
         -- up\n\
         \n\
         -- down\n",
        class_name(id, name)
    )
}

/// Reader/writer for the scripts of one database and migration type.
pub struct MigrationFileManager {
    /// Directory where the scripts are stored.
    migrations_dir: PathBuf,
}

impl MigrationFileManager {
    /// Create a new file manager.
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
        }
    }

    /// Get the migrations directory.
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Ensure the migrations directory exists.
    pub async fn ensure_dir(&self) -> MigrateResult<()> {
        tokio::fs::create_dir_all(&self.migrations_dir).await?;
        Ok(())
    }

    /// All scripts, ascending by id. A missing directory has none; a file
    /// that is not named like a migration is a format error.
    pub async fn list_migrations(&self) -> MigrateResult<Vec<MigrationFile>> {
        if !self.migrations_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut migrations = Vec::new();
        for path in sorted_entries(&self.migrations_dir, false).await? {
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| MigrationError::format(format!("invalid path {}", path.display())))?;
            let (id, name) = parse_filename(file_name)?;
            migrations.push(MigrationFile { path, id, name });
        }

        migrations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(migrations)
    }

    /// Find the script of a migration id.
    pub async fn find(&self, id: &str) -> MigrateResult<Option<MigrationFile>> {
        Ok(self
            .list_migrations()
            .await?
            .into_iter()
            .find(|file| file.id == id))
    }

    /// Scaffold a new migration script with a fresh id.
    pub async fn write_migration(&self, name: &str, heavy: bool) -> MigrateResult<MigrationFile> {
        let name = normalize_name(name)?;
        let id = generate_id();
        self.ensure_dir().await?;

        let path = self.migrations_dir.join(make_filename(&id, &name));
        if path.exists() {
            return Err(MigrationError::already_exists(format!("migration file {}", path.display())));
        }
        tokio::fs::write(&path, render_template(&id, &name, heavy)).await?;

        info!("Generated migration: {}", class_name(&id, &name));
        Ok(MigrationFile { path, id, name })
    }
}

/// Databases that have a migration folder under a type root, by name.
pub async fn list_databases(root: &Path) -> MigrateResult<Vec<String>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    Ok(sorted_entries(root, true)
        .await?
        .iter()
        .filter_map(|path| path.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .collect())
}
