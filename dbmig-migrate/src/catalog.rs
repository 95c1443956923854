//! Live catalog access: existence checks, canonical table DDL and the DDL
//! mutations reconciliation needs.

use std::sync::LazyLock;

use regex_lite::Regex;
use tracing::{debug, info};

use crate::config::LEDGER_TABLE_PREFIX;
use crate::connection::{Connection, SqlValue, quote_ident, quote_qualified, split_statements};
use crate::error::{MigrateResult, MigrationError};
use crate::loader::{qualify_schema, table_name_from_schema};

/// Does a database exist.
pub const DATABASE_EXISTS_SQL: &str =
    "SELECT SCHEMA_NAME FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = ?";

/// Does a table exist in a database.
pub const TABLE_EXISTS_SQL: &str =
    "SELECT TABLE_NAME FROM information_schema.TABLES WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?";

/// Base tables of a database, by name.
pub const LIST_TABLES_SQL: &str = "SELECT TABLE_NAME FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME";

static AUTO_INCREMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)AUTO_INCREMENT=\d+\s*").expect("auto increment pattern is valid"));

/// Check if a table name is reserved for a migration ledger.
pub fn is_ledger_table(name: &str) -> bool {
    name.strip_prefix(LEDGER_TABLE_PREFIX)
        .is_some_and(|rest| !rest.is_empty())
}

/// Remove the first auto-increment counter clause from table DDL.
pub fn strip_auto_increment(ddl: &str) -> String {
    AUTO_INCREMENT_RE.replacen(ddl, 1, "").trim().to_string()
}

/// Catalog reader and DDL executor bound to one connection.
pub struct SchemaCatalog<'c> {
    conn: &'c mut dyn Connection,
}

impl<'c> SchemaCatalog<'c> {
    /// Wrap a connection.
    pub fn new(conn: &'c mut dyn Connection) -> Self {
        Self { conn }
    }

    /// Check if a database exists.
    pub async fn database_exists(&mut self, db: &str) -> MigrateResult<bool> {
        let rows = self.conn.query(DATABASE_EXISTS_SQL, &[SqlValue::from(db)]).await?;
        Ok(!rows.is_empty())
    }

    /// Check if a table exists.
    pub async fn table_exists(&mut self, db: &str, table: &str) -> MigrateResult<bool> {
        let rows = self
            .conn
            .query(TABLE_EXISTS_SQL, &[SqlValue::from(db), SqlValue::from(table)])
            .await?;
        Ok(!rows.is_empty())
    }

    /// Tables of a database, ledger tables excluded. Empty if the database is
    /// missing.
    pub async fn list_tables(&mut self, db: &str) -> MigrateResult<Vec<String>> {
        if !self.database_exists(db).await? {
            return Ok(Vec::new());
        }

        let rows = self.conn.query(LIST_TABLES_SQL, &[SqlValue::from(db)]).await?;
        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let name = row.require_text(0)?;
            if !is_ledger_table(&name) {
                tables.push(name);
            }
        }
        Ok(tables)
    }

    /// Canonical DDL of a live table, with its auto-increment counter removed
    /// and a trailing `;`.
    pub async fn create_table_syntax(&mut self, db: &str, table: &str) -> MigrateResult<Option<String>> {
        if !self.database_exists(db).await? || !self.table_exists(db, table).await? {
            return Ok(None);
        }

        let sql = format!("SHOW CREATE TABLE {}", quote_qualified(db, table));
        let rows = self.conn.query(&sql, &[]).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let ddl = row.require_text(1)?;
        Ok(Some(strip_auto_increment(&format!("{ddl};"))))
    }

    /// Create a database. With `force` an existing one is dropped first.
    pub async fn create_database(&mut self, db: &str, force: bool) -> MigrateResult<()> {
        if self.database_exists(db).await? {
            if !force {
                return Err(MigrationError::already_exists(format!("database '{db}'")));
            }
            self.drop_database(db).await?;
        }

        let sql = format!("CREATE DATABASE {}", quote_ident(db));
        self.conn.execute(&sql, &[]).await?;
        info!(database = %db, "Database created");
        Ok(())
    }

    /// Drop a database.
    pub async fn drop_database(&mut self, db: &str) -> MigrateResult<()> {
        if !self.database_exists(db).await? {
            return Err(MigrationError::not_found(format!("database '{db}'")));
        }

        let sql = format!("DROP DATABASE {}", quote_ident(db));
        self.conn.execute(&sql, &[]).await?;
        info!(database = %db, "Database dropped");
        Ok(())
    }

    /// Create a table from declared DDL, qualified with its database. With
    /// `force` an existing table is dropped first. Returns the table name.
    pub async fn create_table(&mut self, db: &str, schema: &str, force: bool) -> MigrateResult<String> {
        let table = table_name_from_schema(schema)?;

        if self.table_exists(db, &table).await? {
            if !force {
                return Err(MigrationError::already_exists(format!("table '{db}.{table}'")));
            }
            self.drop_table(db, &table).await?;
        }

        let sql = qualify_schema(db, &table, schema);
        self.conn.execute(&sql, &[]).await?;
        info!(database = %db, table = %table, "Table created");
        Ok(table)
    }

    /// Drop a table.
    pub async fn drop_table(&mut self, db: &str, table: &str) -> MigrateResult<()> {
        if !self.table_exists(db, table).await? {
            return Err(MigrationError::not_found(format!("table '{db}.{table}'")));
        }

        let sql = format!("DROP TABLE {}", quote_qualified(db, table));
        self.conn.execute(&sql, &[]).await?;
        info!(database = %db, table = %table, "Table dropped");
        Ok(())
    }

    /// Run each statement of a script. Returns the number of statements.
    pub async fn execute_script(&mut self, script: &str) -> MigrateResult<usize> {
        let statements = split_statements(script);
        for statement in &statements {
            self.conn.execute(statement, &[]).await?;
        }
        debug!(statements = statements.len(), "Script executed");
        Ok(statements.len())
    }
}
