//! Migration ledger: the `_db_<type>` table inside each managed database.
//!
//! Rows are only ever inserted (apply) or deleted (revert). There is no
//! update path.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MigrationType;
use crate::connection::{Connection, SqlRow, SqlValue, quote_ident};
use crate::error::{MigrateResult, MigrationError};

/// Name of the selected database.
pub const CURRENT_DATABASE_SQL: &str = "SELECT DATABASE()";

const RECORD_COLUMNS: &str = "`id`, `migrationId`, `name`, `startedAt`, `appliedAt`";

/// DDL of a ledger table.
pub fn create_ledger_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  \
         `id` INT UNSIGNED NOT NULL AUTO_INCREMENT,\n  \
         `migrationId` VARCHAR(32) NOT NULL,\n  \
         `name` VARCHAR(255) NOT NULL,\n  \
         `startedAt` DOUBLE NOT NULL,\n  \
         `appliedAt` DOUBLE NOT NULL,\n  \
         PRIMARY KEY (`id`),\n  \
         UNIQUE KEY `migrationId` (`migrationId`)\n\
         ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
        quote_ident(table)
    )
}

/// Every ledger row, newest id first.
pub fn select_all_sql(table: &str) -> String {
    format!(
        "SELECT {RECORD_COLUMNS} FROM {} ORDER BY `migrationId` DESC",
        quote_ident(table)
    )
}

/// Ledger rows of one migration id.
pub fn select_by_migration_id_sql(table: &str) -> String {
    format!(
        "SELECT {RECORD_COLUMNS} FROM {} WHERE `migrationId` = ? ORDER BY `migrationId` DESC",
        quote_ident(table)
    )
}

/// Ledger row by row id.
pub fn select_by_row_id_sql(table: &str) -> String {
    format!("SELECT {RECORD_COLUMNS} FROM {} WHERE `id` = ?", quote_ident(table))
}

/// Insert a ledger row.
pub fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (`migrationId`, `name`, `startedAt`, `appliedAt`) VALUES (?, ?, ?, ?)",
        quote_ident(table)
    )
}

/// Delete the ledger row of a migration.
pub fn delete_sql(table: &str) -> String {
    format!(
        "DELETE FROM {} WHERE `migrationId` = ? LIMIT 1",
        quote_ident(table)
    )
}

/// Seconds since the Unix epoch, with microsecond precision.
pub fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

/// A persisted ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Auto-increment row id.
    pub id: u64,
    /// Migration identifier.
    pub migration_id: String,
    /// Migration name.
    pub name: String,
    /// When `up` started, epoch seconds.
    pub started_at: f64,
    /// When the migration was recorded, epoch seconds.
    pub applied_at: f64,
}

impl MigrationRecord {
    fn from_row(row: &SqlRow) -> MigrateResult<Self> {
        Ok(Self {
            id: row.require_u64(0)?,
            migration_id: row.require_text(1)?,
            name: row.require_text(2)?,
            started_at: row.require_f64(3)?,
            applied_at: row.require_f64(4)?,
        })
    }
}

/// A ledger row yet to be inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMigrationRecord {
    /// Migration identifier.
    pub migration_id: String,
    /// Migration name.
    pub name: String,
    /// When `up` started, epoch seconds.
    pub started_at: f64,
    /// When `up` finished, epoch seconds.
    pub applied_at: f64,
}

/// Ledger of one migration type in one database.
#[derive(Debug, Clone)]
pub struct MigrationLedger {
    database: String,
    table: String,
    database_checked: bool,
    table_checked: bool,
}

impl MigrationLedger {
    /// Ledger for a migration type in a database.
    pub fn new(database: impl Into<String>, kind: MigrationType) -> Self {
        Self {
            database: database.into(),
            table: kind.ledger_table(),
            database_checked: false,
            table_checked: false,
        }
    }

    /// Ledger table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Database the ledger lives in.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Fail unless the connection has the ledger's database selected.
    pub async fn check_database(&mut self, conn: &mut dyn Connection) -> MigrateResult<()> {
        if self.database_checked {
            return Ok(());
        }

        let rows = conn.query(CURRENT_DATABASE_SQL, &[]).await?;
        let selected = rows.first().and_then(|row| row.text(0));
        if selected.as_deref() != Some(self.database.as_str()) {
            debug!(expected = %self.database, selected = ?selected, "Wrong database selected");
            return Err(MigrationError::logic(
                "Migration can be ran only for existed database, try to init it first",
            ));
        }

        self.database_checked = true;
        Ok(())
    }

    /// Verify the database and create the ledger table when it is missing.
    pub async fn ensure(&mut self, conn: &mut dyn Connection) -> MigrateResult<()> {
        self.check_database(conn).await?;
        if self.table_checked {
            return Ok(());
        }

        conn.execute(&create_ledger_sql(&self.table), &[]).await?;
        debug!(table = %self.table, "Ledger table ready");
        self.table_checked = true;
        Ok(())
    }

    /// All records, or the records of one migration id. Newest first.
    pub async fn find_migrations(&mut self, conn: &mut dyn Connection, migration_id: Option<&str>) -> MigrateResult<Vec<MigrationRecord>> {
        self.ensure(conn).await?;

        let rows = match migration_id {
            Some(id) => {
                conn.query(&select_by_migration_id_sql(&self.table), &[SqlValue::from(id)])
                    .await?
            }
            None => conn.query(&select_all_sql(&self.table), &[]).await?,
        };
        rows.iter().map(MigrationRecord::from_row).collect()
    }

    /// Record by row id.
    pub async fn find_by_id(&mut self, conn: &mut dyn Connection, id: u64) -> MigrateResult<Option<MigrationRecord>> {
        self.ensure(conn).await?;

        let rows = conn
            .query(&select_by_row_id_sql(&self.table), &[SqlValue::UInt(id)])
            .await?;
        rows.first().map(MigrationRecord::from_row).transpose()
    }

    /// Insert a record. A migration id that is already recorded is a logic
    /// error: rows are never updated.
    pub async fn insert(&mut self, conn: &mut dyn Connection, record: NewMigrationRecord) -> MigrateResult<MigrationRecord> {
        if !self.find_migrations(conn, Some(&record.migration_id)).await?.is_empty() {
            return Err(MigrationError::logic(format!(
                "migration '{}' is already recorded, updating ledger rows is not supported",
                record.migration_id
            )));
        }

        conn.execute(
            &insert_sql(&self.table),
            &[
                SqlValue::from(record.migration_id.as_str()),
                SqlValue::from(record.name.as_str()),
                SqlValue::Float(record.started_at),
                SqlValue::Float(record.applied_at),
            ],
        )
        .await?;

        let id = conn
            .last_insert_id()
            .ok_or_else(|| MigrationError::logic("ledger insert returned no id"))?;
        self.find_by_id(conn, id)
            .await?
            .ok_or_else(|| MigrationError::logic(format!("ledger row {id} vanished after insert")))
    }

    /// Delete the record of a migration. Returns whether a row was removed.
    pub async fn delete(&mut self, conn: &mut dyn Connection, migration_id: &str) -> MigrateResult<bool> {
        self.ensure(conn).await?;

        let affected = conn
            .execute(&delete_sql(&self.table), &[SqlValue::from(migration_id)])
            .await?;
        Ok(affected > 0)
    }
}

/// One ledger per `(database, type)`, created on first use.
#[derive(Debug, Default)]
pub struct LedgerManager {
    ledgers: HashMap<(String, MigrationType), MigrationLedger>,
}

impl LedgerManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger of a database and type.
    pub fn ledger(&mut self, db: &str, kind: MigrationType) -> &mut MigrationLedger {
        self.ledgers
            .entry((db.to_string(), kind))
            .or_insert_with(|| MigrationLedger::new(db, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryServer;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn record(id: &str, name: &str) -> NewMigrationRecord {
        NewMigrationRecord {
            migration_id: id.to_string(),
            name: name.to_string(),
            started_at: 1_704_067_200.5,
            applied_at: 1_704_067_201.25,
        }
    }

    #[test]
    fn test_ledger_sql_targets_table() {
        let ddl = create_ledger_sql("_db_structure");
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS `_db_structure` ("));
        assert!(ddl.contains("`migrationId` VARCHAR(32) NOT NULL"));
        assert!(delete_sql("_db_data").ends_with("LIMIT 1"));
    }

    #[test]
    fn test_epoch_seconds() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(epoch_seconds(at), 1_704_067_200.0);
    }

    #[test]
    fn test_ledger_manager_caches_per_key() {
        let mut manager = LedgerManager::new();
        assert_eq!(manager.ledger("shop", MigrationType::Data).table(), "_db_data");
        manager.ledger("shop", MigrationType::Structure).table_checked = true;
        assert!(manager.ledger("shop", MigrationType::Structure).table_checked);
        assert!(!manager.ledger("blog", MigrationType::Structure).table_checked);
    }

    #[tokio::test]
    async fn test_insert_reads_back_stored_row() {
        let server = MemoryServer::new().with_database("shop");
        let mut conn = server.connect();
        conn.execute("USE `shop`", &[]).await.unwrap();
        let mut ledger = MigrationLedger::new("shop", MigrationType::Structure);

        let stored = ledger.insert(&mut conn, record("001", "CreateUsers")).await.unwrap();
        assert_eq!(stored.migration_id, "001");
        assert_eq!(stored.name, "CreateUsers");
        assert_eq!(stored.started_at, 1_704_067_200.5);
        assert_eq!(stored.applied_at, 1_704_067_201.25);

        let found = ledger.find_migrations(&mut conn, Some("001")).await.unwrap();
        assert_eq!(found, vec![stored.clone()]);
        assert_eq!(ledger.find_by_id(&mut conn, stored.id).await.unwrap(), Some(stored));
        assert_eq!(server.ledger_ids("shop", "_db_structure"), vec!["001".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let server = MemoryServer::new().with_database("shop");
        let mut conn = server.connect();
        conn.execute("USE `shop`", &[]).await.unwrap();
        let mut ledger = MigrationLedger::new("shop", MigrationType::Data);

        ledger.insert(&mut conn, record("001", "SeedUsers")).await.unwrap();
        let err = ledger.insert(&mut conn, record("001", "SeedUsersAgain")).await.unwrap_err();

        assert!(matches!(err, MigrationError::Logic(_)));
        assert_eq!(server.ledger_ids("shop", "_db_data"), vec!["001".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_reports_removed_rows() {
        let server = MemoryServer::new().with_database("shop");
        let mut conn = server.connect();
        conn.execute("USE `shop`", &[]).await.unwrap();
        let mut ledger = MigrationLedger::new("shop", MigrationType::Structure);
        ledger.insert(&mut conn, record("001", "CreateUsers")).await.unwrap();

        assert!(!ledger.delete(&mut conn, "999").await.unwrap());
        assert!(ledger.delete(&mut conn, "001").await.unwrap());
        assert!(ledger.find_migrations(&mut conn, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_selected_database_is_rejected() {
        let server = MemoryServer::new().with_database("shop").with_database("blog");
        let mut conn = server.connect();
        conn.execute("USE `shop`", &[]).await.unwrap();
        let mut ledger = MigrationLedger::new("blog", MigrationType::Structure);

        let err = ledger.find_migrations(&mut conn, None).await.unwrap_err();
        assert!(matches!(err, MigrationError::Logic(_)));
        assert!(server.tables("shop").is_empty());

        let mut unselected = server.connect();
        let err = ledger.find_migrations(&mut unselected, None).await.unwrap_err();
        assert!(matches!(err, MigrationError::Logic(_)));
    }
}
