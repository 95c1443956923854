//! Migration instances and the factory that builds them.
//!
//! Migrations are either compiled into the binary and registered by id, or
//! loaded from their script file:
//!
//! ```text
//! -- Migration_20240105101112000123_AddUsers
//! -- heavy: false
//!
//! -- up
//! CREATE TABLE `users` (`id` INT NOT NULL);
//!
//! -- down
//! DROP TABLE `users`;
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::MigrationType;
use crate::connection::{Connection, split_statements};
use crate::discovery::MigrationDescriptor;
use crate::error::{MigrateResult, MigrationError};
use crate::identity::parse_filename;

/// A single reversible migration.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Migration identifier.
    fn id(&self) -> &str;

    /// Migration name.
    fn name(&self) -> &str;

    /// Whether the migration is flagged as heavy.
    fn is_heavy(&self) -> bool {
        false
    }

    /// Apply the migration.
    async fn up(&self, conn: &mut dyn Connection) -> MigrateResult<()>;

    /// Revert the migration.
    async fn down(&self, conn: &mut dyn Connection) -> MigrateResult<()>;
}

/// Builds the migration instance for a discovered descriptor.
#[async_trait]
pub trait MigrationFactory: Send + Sync {
    /// Build the migration of `descriptor` for a database.
    async fn build(&self, kind: MigrationType, db: &str, descriptor: &MigrationDescriptor) -> MigrateResult<Box<dyn Migration>>;
}

/// A migration read from a script file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptMigration {
    id: String,
    name: String,
    heavy: bool,
    up: Vec<String>,
    down: Vec<String>,
}

impl ScriptMigration {
    /// Parse script content.
    ///
    /// `-- up` and `-- down` lines open the two sections. Without markers the
    /// whole script is the up section. `-- heavy: true` before the first
    /// marker flags the migration as heavy.
    pub fn parse(id: impl Into<String>, name: impl Into<String>, content: &str) -> Self {
        #[derive(PartialEq)]
        enum Section {
            Header,
            Up,
            Down,
        }

        let mut section = Section::Header;
        let mut heavy = false;
        let (mut header, mut up, mut down) = (String::new(), String::new(), String::new());

        for line in content.lines() {
            let marker = line.trim().to_ascii_lowercase();
            match marker.as_str() {
                "-- up" => {
                    section = Section::Up;
                    continue;
                }
                "-- down" => {
                    section = Section::Down;
                    continue;
                }
                _ => {}
            }

            let buffer = match section {
                Section::Header => {
                    if let Some(flag) = marker.strip_prefix("-- heavy:") {
                        heavy = flag.trim() == "true";
                        continue;
                    }
                    &mut header
                }
                Section::Up => &mut up,
                Section::Down => &mut down,
            };
            buffer.push_str(line);
            buffer.push('\n');
        }

        if section == Section::Header {
            up = header;
        }

        Self {
            id: id.into(),
            name: name.into(),
            heavy,
            up: split_statements(&up),
            down: split_statements(&down),
        }
    }

    /// Load a script file; id and name come from the file name.
    pub async fn load(path: &Path) -> MigrateResult<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MigrationError::format(format!("invalid path {}", path.display())))?;
        let (id, name) = parse_filename(file_name)?;
        let content = tokio::fs::read_to_string(path).await?;
        Ok(Self::parse(id, name, &content))
    }

    /// Statements of the up section.
    pub fn up_statements(&self) -> &[String] {
        &self.up
    }

    /// Statements of the down section.
    pub fn down_statements(&self) -> &[String] {
        &self.down
    }
}

#[async_trait]
impl Migration for ScriptMigration {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_heavy(&self) -> bool {
        self.heavy
    }

    async fn up(&self, conn: &mut dyn Connection) -> MigrateResult<()> {
        for statement in &self.up {
            conn.execute(statement, &[]).await?;
        }
        Ok(())
    }

    async fn down(&self, conn: &mut dyn Connection) -> MigrateResult<()> {
        for statement in &self.down {
            conn.execute(statement, &[]).await?;
        }
        Ok(())
    }
}

type Constructor = Arc<dyn Fn() -> Box<dyn Migration> + Send + Sync>;

/// Default factory: registered constructors first, script files otherwise.
#[derive(Default, Clone)]
pub struct MigrationRegistry {
    constructors: HashMap<(MigrationType, String, String), Constructor>,
}

impl MigrationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a compiled migration for a database.
    pub fn register<F>(&mut self, kind: MigrationType, db: impl Into<String>, id: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn Migration> + Send + Sync + 'static,
    {
        self.constructors
            .insert((kind, db.into(), id.into()), Arc::new(constructor));
    }

    /// Check if a compiled migration is registered.
    pub fn contains(&self, kind: MigrationType, db: &str, id: &str) -> bool {
        self.constructors
            .contains_key(&(kind, db.to_string(), id.to_string()))
    }
}

#[async_trait]
impl MigrationFactory for MigrationRegistry {
    async fn build(&self, kind: MigrationType, db: &str, descriptor: &MigrationDescriptor) -> MigrateResult<Box<dyn Migration>> {
        let key = (kind, db.to_string(), descriptor.migration_id.clone());
        if let Some(constructor) = self.constructors.get(&key) {
            debug!(migration = %descriptor.migration_id, "Using registered migration");
            return Ok(constructor());
        }

        match &descriptor.path {
            Some(path) => Ok(Box::new(ScriptMigration::load(path).await?)),
            None => Err(MigrationError::not_found(format!(
                "migration file {} for database '{db}'",
                descriptor.filename
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_script() {
        let script = "-- Migration_001_AddUsers\n-- heavy: true\n\n-- up\nCREATE TABLE a (id INT);\nCREATE TABLE b (id INT);\n\n-- DOWN\nDROP TABLE b;\nDROP TABLE a;\n";
        let migration = ScriptMigration::parse("001", "AddUsers", script);

        assert!(migration.is_heavy());
        assert_eq!(
            migration.up_statements(),
            &["CREATE TABLE a (id INT)", "CREATE TABLE b (id INT)"]
        );
        assert_eq!(migration.down_statements(), &["DROP TABLE b", "DROP TABLE a"]);
    }

    #[test]
    fn test_parse_script_without_markers() {
        let migration = ScriptMigration::parse("001", "Seed", "INSERT INTO t VALUES (1);");
        assert!(!migration.is_heavy());
        assert_eq!(migration.up_statements(), &["INSERT INTO t VALUES (1)"]);
        assert!(migration.down_statements().is_empty());
    }

    #[test]
    fn test_template_parses_empty() {
        let content = crate::file::render_template("001", "Empty", false);
        let migration = ScriptMigration::parse("001", "Empty", &content);
        assert!(migration.up_statements().is_empty());
        assert!(migration.down_statements().is_empty());
    }
}
