//! MySQL connection wrapper.

use async_trait::async_trait;
use dbmig_migrate::{Connection, MigrateResult, MigrationError, SqlRow, SqlValue};
use mysql_async::prelude::*;
use mysql_async::{Conn, Row};
use tracing::{debug, info};

use crate::config::MysqlConfig;
use crate::error::{MysqlError, MysqlResult};
use crate::types::{from_mysql_row, to_params};

/// A single MySQL connection driven by the engine.
pub struct MysqlConnection {
    conn: Conn,
    in_transaction: bool,
    last_insert_id: Option<u64>,
}

impl MysqlConnection {
    /// Create a new connection wrapper.
    pub fn new(conn: Conn) -> Self {
        Self {
            conn,
            in_transaction: false,
            last_insert_id: None,
        }
    }

    /// Open a connection, honouring the configured timeout.
    pub async fn connect(config: &MysqlConfig) -> MysqlResult<Self> {
        let opts = config.to_opts_builder();
        let conn = match config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, Conn::new(opts))
                .await
                .map_err(|_| MysqlError::Timeout {
                    address: config.address(),
                    after: limit,
                })??,
            None => Conn::new(opts).await?,
        };

        info!(address = %config.address(), database = ?config.database, "Connected to MySQL");
        Ok(Self::new(conn))
    }

    /// Close the connection.
    pub async fn disconnect(self) -> MysqlResult<()> {
        self.conn.disconnect().await?;
        Ok(())
    }

    /// Get the inner connection mutably.
    pub fn inner_mut(&mut self) -> &mut Conn {
        &mut self.conn
    }

    async fn control(&mut self, statement: &str) -> MigrateResult<()> {
        debug!(query = %statement, "Executing statement");
        self.conn
            .query_drop(statement)
            .await
            .map_err(|e| statement_error(statement, e))
    }
}

#[async_trait]
impl Connection for MysqlConnection {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<u64> {
        let result = if params.is_empty() {
            debug!(query = %sql, "Executing statement");
            self.conn.query_drop(sql).await
        } else {
            debug!(query = %sql, "Executing parameterized statement");
            self.conn.exec_drop(sql, to_params(params)).await
        };
        result.map_err(|e| statement_error(sql, e))?;

        self.last_insert_id = self.conn.last_insert_id();
        Ok(self.conn.affected_rows())
    }

    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> MigrateResult<Vec<SqlRow>> {
        let result: Result<Vec<Row>, _> = if params.is_empty() {
            debug!(query = %sql, "Executing query");
            self.conn.query(sql).await
        } else {
            debug!(query = %sql, "Executing parameterized query");
            self.conn.exec(sql, to_params(params)).await
        };
        let rows = result.map_err(|e| statement_error(sql, e))?;

        Ok(rows.into_iter().map(from_mysql_row).collect())
    }

    fn last_insert_id(&self) -> Option<u64> {
        self.last_insert_id
    }

    async fn begin(&mut self) -> MigrateResult<()> {
        if self.in_transaction {
            return Err(MigrationError::logic("a transaction is already open on this connection"));
        }
        self.control("START TRANSACTION").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> MigrateResult<()> {
        self.in_transaction = false;
        self.control("COMMIT").await
    }

    async fn rollback(&mut self) -> MigrateResult<()> {
        self.in_transaction = false;
        self.control("ROLLBACK").await
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }
}

fn statement_error(sql: &str, err: mysql_async::Error) -> MigrationError {
    MigrationError::sql(format!("executing `{}`", sql), MysqlError::from(err))
}
