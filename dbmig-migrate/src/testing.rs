//! In-memory database server for tests.
//!
//! [`MemoryServer`] understands exactly the statements this crate emits:
//! catalog lookups, `SHOW CREATE TABLE`, database and table DDL, `USE`,
//! `SELECT DATABASE()` and ledger reads and writes. Every other statement is
//! accepted and recorded in the journal. Statements containing a registered
//! failure pattern fail with a SQL error.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use regex_lite::Regex;

use crate::catalog::{DATABASE_EXISTS_SQL, LIST_TABLES_SQL, TABLE_EXISTS_SQL};
use crate::connection::{Connection, SqlRow, SqlValue};
use crate::error::{MigrateResult, MigrationError};
use crate::history::CURRENT_DATABASE_SQL;
use crate::loader::table_name_from_schema;

const TARGET: &str = r"`([^`]+)`(?:\.`([^`]+)`)?";

static CREATE_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?is)^CREATE\s+TABLE\s+(IF\s+NOT\s+EXISTS\s+)?{TARGET}\s*\("))
        .expect("create table pattern is valid")
});

static DROP_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?is)^DROP\s+TABLE\s+(IF\s+EXISTS\s+)?{TARGET}"))
        .expect("drop table pattern is valid")
});

static SHOW_CREATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^SHOW\s+CREATE\s+TABLE\s+{TARGET}")).expect("show create pattern is valid")
});

static DATABASE_DDL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(CREATE|DROP)\s+DATABASE\s+`([^`]+)`").expect("database ddl pattern is valid")
});

static USE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^USE\s+`([^`]+)`").expect("use pattern is valid"));

static LEDGER_SELECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^SELECT .+ FROM `(_db_[^`]+)`(?: WHERE `(migrationId|id)` = \?)?").expect("select pattern is valid")
});

static LEDGER_INSERT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^INSERT INTO `(_db_[^`]+)` \(`migrationId`").expect("insert pattern is valid"));

static LEDGER_DELETE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^DELETE FROM `(_db_[^`]+)` WHERE `migrationId` = \? LIMIT 1").expect("delete pattern is valid")
});

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    ddl: String,
    rows: Vec<Vec<SqlValue>>,
    next_id: u64,
}

#[derive(Debug, Default)]
struct ServerState {
    databases: BTreeMap<String, BTreeMap<String, MemoryTable>>,
    journal: Vec<String>,
    failures: Vec<String>,
}

/// Shared in-memory server. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    state: Arc<Mutex<ServerState>>,
}

impl MemoryServer {
    /// Create an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty database.
    pub fn with_database(self, db: &str) -> Self {
        self.state.lock().databases.entry(db.to_string()).or_default();
        self
    }

    /// Add a table exactly as `SHOW CREATE TABLE` should return it.
    pub fn with_table(self, db: &str, ddl: &str) -> Self {
        let name = table_name_from_schema(ddl).unwrap_or_else(|_| "unnamed".to_string());
        self.state
            .lock()
            .databases
            .entry(db.to_string())
            .or_default()
            .insert(
                name,
                MemoryTable {
                    ddl: ddl.trim().trim_end_matches(';').to_string(),
                    ..MemoryTable::default()
                },
            );
        self
    }

    /// Fail every statement containing `pattern`.
    pub fn fail_on(&self, pattern: &str) {
        self.state.lock().failures.push(pattern.to_string());
    }

    /// Stop failing statements.
    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Open a connection with no database selected.
    pub fn connect(&self) -> MemoryConnection {
        MemoryConnection {
            server: self.clone(),
            current: None,
            in_transaction: false,
            last_insert_id: None,
        }
    }

    /// Every statement received, in order, including `BEGIN`, `COMMIT` and
    /// `ROLLBACK`.
    pub fn journal(&self) -> Vec<String> {
        self.state.lock().journal.clone()
    }

    /// Check if a database exists.
    pub fn has_database(&self, db: &str) -> bool {
        self.state.lock().databases.contains_key(db)
    }

    /// Table names of a database.
    pub fn tables(&self, db: &str) -> Vec<String> {
        self.state
            .lock()
            .databases
            .get(db)
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Stored DDL of a table.
    pub fn table_ddl(&self, db: &str, table: &str) -> Option<String> {
        self.state
            .lock()
            .databases
            .get(db)
            .and_then(|tables| tables.get(table))
            .map(|t| t.ddl.clone())
    }

    /// Migration ids recorded in a ledger table, in insertion order.
    pub fn ledger_ids(&self, db: &str, table: &str) -> Vec<String> {
        self.state
            .lock()
            .databases
            .get(db)
            .and_then(|tables| tables.get(table))
            .map(|t| t.rows.iter().filter_map(|row| row[1].as_text()).collect())
            .unwrap_or_default()
    }
}

/// One connection to a [`MemoryServer`].
#[derive(Debug)]
pub struct MemoryConnection {
    server: MemoryServer,
    current: Option<String>,
    in_transaction: bool,
    last_insert_id: Option<u64>,
}

impl MemoryConnection {
    /// The server behind this connection.
    pub fn server(&self) -> &MemoryServer {
        &self.server
    }

    /// Selected database.
    pub fn current_database(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn run(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<(u64, Vec<SqlRow>)> {
        let sql = sql.trim();
        let server = self.server.clone();
        let mut state = server.state.lock();
        state.journal.push(sql.to_string());

        if state.failures.iter().any(|pattern| sql.contains(pattern.as_str())) {
            return Err(failure(sql, "scripted failure"));
        }

        if sql == DATABASE_EXISTS_SQL {
            let db = text_param(params, 0)?;
            let rows = if state.databases.contains_key(&db) {
                vec![SqlRow::new(vec![SqlValue::Text(db)])]
            } else {
                Vec::new()
            };
            return Ok((0, rows));
        }
        if sql == TABLE_EXISTS_SQL {
            let db = text_param(params, 0)?;
            let table = text_param(params, 1)?;
            let exists = state.databases.get(&db).is_some_and(|t| t.contains_key(&table));
            let rows = if exists {
                vec![SqlRow::new(vec![SqlValue::Text(table)])]
            } else {
                Vec::new()
            };
            return Ok((0, rows));
        }
        if sql == LIST_TABLES_SQL {
            let db = text_param(params, 0)?;
            let rows = state
                .databases
                .get(&db)
                .map(|tables| {
                    tables
                        .keys()
                        .map(|name| SqlRow::new(vec![SqlValue::Text(name.clone())]))
                        .collect()
                })
                .unwrap_or_default();
            return Ok((0, rows));
        }
        if sql == CURRENT_DATABASE_SQL {
            let value = self
                .current
                .clone()
                .filter(|db| state.databases.contains_key(db))
                .map_or(SqlValue::Null, SqlValue::Text);
            return Ok((0, vec![SqlRow::new(vec![value])]));
        }

        if let Some(caps) = SHOW_CREATE_RE.captures(sql) {
            let (db, table) = self.target(&caps, 1, sql)?;
            let ddl = state
                .databases
                .get(&db)
                .and_then(|tables| tables.get(&table))
                .map(|t| t.ddl.clone())
                .ok_or_else(|| failure(sql, format!("Table '{db}.{table}' doesn't exist")))?;
            return Ok((0, vec![SqlRow::new(vec![SqlValue::Text(table), SqlValue::Text(ddl)])]));
        }

        if let Some(caps) = DATABASE_DDL_RE.captures(sql) {
            let db = caps[2].to_string();
            if caps[1].eq_ignore_ascii_case("CREATE") {
                if state.databases.contains_key(&db) {
                    return Err(failure(sql, format!("Can't create database '{db}'; database exists")));
                }
                state.databases.insert(db, BTreeMap::new());
            } else {
                if state.databases.remove(&db).is_none() {
                    return Err(failure(sql, format!("Can't drop database '{db}'; database doesn't exist")));
                }
                if self.current.as_deref() == Some(db.as_str()) {
                    self.current = None;
                }
            }
            return Ok((1, Vec::new()));
        }

        if let Some(caps) = USE_RE.captures(sql) {
            let db = caps[1].to_string();
            if !state.databases.contains_key(&db) {
                return Err(failure(sql, format!("Unknown database '{db}'")));
            }
            self.current = Some(db);
            return Ok((0, Vec::new()));
        }

        if let Some(caps) = CREATE_TABLE_RE.captures(sql) {
            let if_not_exists = caps.get(1).is_some();
            let (db, table) = self.target(&caps, 2, sql)?;
            let header_end = caps.get(0).map_or(0, |m| m.end());
            let ddl = format!("CREATE TABLE `{table}` ({}", &sql[header_end..]);

            let tables = state
                .databases
                .get_mut(&db)
                .ok_or_else(|| failure(sql, format!("Unknown database '{db}'")))?;
            if tables.contains_key(&table) {
                if if_not_exists {
                    return Ok((0, Vec::new()));
                }
                return Err(failure(sql, format!("Table '{table}' already exists")));
            }
            tables.insert(
                table,
                MemoryTable {
                    ddl: ddl.trim_end_matches(';').to_string(),
                    rows: Vec::new(),
                    next_id: 1,
                },
            );
            return Ok((0, Vec::new()));
        }

        if let Some(caps) = DROP_TABLE_RE.captures(sql) {
            let if_exists = caps.get(1).is_some();
            let (db, table) = self.target(&caps, 2, sql)?;
            let removed = state
                .databases
                .get_mut(&db)
                .and_then(|tables| tables.remove(&table));
            if removed.is_none() && !if_exists {
                return Err(failure(sql, format!("Unknown table '{db}.{table}'")));
            }
            return Ok((0, Vec::new()));
        }

        if let Some(caps) = LEDGER_SELECT_RE.captures(sql) {
            let ledger = self.current_table(&mut state, &caps[1], sql)?;
            let mut rows: Vec<Vec<SqlValue>> = match caps.get(2).map(|m| m.as_str()) {
                Some("migrationId") => {
                    let id = text_param(params, 0)?;
                    ledger
                        .rows
                        .iter()
                        .filter(|row| row[1].as_text().as_deref() == Some(id.as_str()))
                        .cloned()
                        .collect()
                }
                Some(_) => {
                    let id = params.first().and_then(SqlValue::as_u64);
                    ledger
                        .rows
                        .iter()
                        .filter(|row| row[0].as_u64() == id)
                        .cloned()
                        .collect()
                }
                None => ledger.rows.clone(),
            };
            if sql.contains("ORDER BY `migrationId` DESC") {
                rows.sort_by_key(|row| std::cmp::Reverse(row[1].as_text()));
            }
            return Ok((0, rows.into_iter().map(SqlRow::new).collect()));
        }

        if let Some(caps) = LEDGER_INSERT_RE.captures(sql) {
            let ledger = self.current_table(&mut state, &caps[1], sql)?;
            let migration_id = text_param(params, 0)?;
            if ledger
                .rows
                .iter()
                .any(|row| row[1].as_text().as_deref() == Some(migration_id.as_str()))
            {
                return Err(failure(sql, format!("Duplicate entry '{migration_id}' for key 'migrationId'")));
            }

            let id = ledger.next_id.max(1);
            ledger.next_id = id + 1;
            let mut row = vec![SqlValue::UInt(id)];
            row.extend(params.iter().cloned());
            ledger.rows.push(row);
            self.last_insert_id = Some(id);
            return Ok((1, Vec::new()));
        }

        if let Some(caps) = LEDGER_DELETE_RE.captures(sql) {
            let ledger = self.current_table(&mut state, &caps[1], sql)?;
            let migration_id = text_param(params, 0)?;
            let position = ledger
                .rows
                .iter()
                .position(|row| row[1].as_text().as_deref() == Some(migration_id.as_str()));
            return Ok(match position {
                Some(index) => {
                    ledger.rows.remove(index);
                    (1, Vec::new())
                }
                None => (0, Vec::new()),
            });
        }

        Ok((1, Vec::new()))
    }

    fn target(&self, caps: &regex_lite::Captures<'_>, first: usize, sql: &str) -> MigrateResult<(String, String)> {
        match (caps.get(first), caps.get(first + 1)) {
            (Some(db), Some(table)) => Ok((db.as_str().to_string(), table.as_str().to_string())),
            (Some(table), None) => {
                let db = self
                    .current
                    .clone()
                    .ok_or_else(|| failure(sql, "No database selected"))?;
                Ok((db, table.as_str().to_string()))
            }
            _ => Err(failure(sql, "malformed table reference")),
        }
    }

    fn current_table<'s>(&self, state: &'s mut ServerState, table: &str, sql: &str) -> MigrateResult<&'s mut MemoryTable> {
        let db = self
            .current
            .as_deref()
            .ok_or_else(|| failure(sql, "No database selected"))?;
        state
            .databases
            .get_mut(db)
            .and_then(|tables| tables.get_mut(table))
            .ok_or_else(|| failure(sql, format!("Table '{db}.{table}' doesn't exist")))
    }

    fn journal(&self, entry: &str) {
        self.server.state.lock().journal.push(entry.to_string());
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        self.run(sql, params).map(|(affected, _)| affected)
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<SqlRow>> {
        self.run(sql, params).map(|(_, rows)| rows)
    }

    fn last_insert_id(&self) -> Option<u64> {
        self.last_insert_id
    }

    async fn begin(&mut self) -> MigrateResult<()> {
        if self.in_transaction {
            return Err(failure("BEGIN", "transaction already open"));
        }
        self.journal("BEGIN");
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> MigrateResult<()> {
        self.journal("COMMIT");
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> MigrateResult<()> {
        self.journal("ROLLBACK");
        self.in_transaction = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

fn failure(sql: &str, message: impl Into<String>) -> MigrationError {
    MigrationError::sql(format!("executing `{sql}`"), message.into())
}

fn text_param(params: &[SqlValue], index: usize) -> MigrateResult<String> {
    params
        .get(index)
        .and_then(SqlValue::as_text)
        .ok_or_else(|| MigrationError::validation(format!("missing text parameter {index}")))
}
