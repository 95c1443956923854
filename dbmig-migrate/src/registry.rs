//! Named connections, one per database.

use indexmap::IndexMap;
use tracing::debug;

use crate::catalog::SchemaCatalog;
use crate::connection::{Connection, quote_ident};
use crate::error::{MigrateResult, MigrationError};

/// Name of the fallback connection.
pub const DEFAULT_CONNECTION: &str = "default";

/// Connections keyed by database name, with an optional `default` fallback.
pub struct ConnectionRegistry<C: Connection> {
    connections: IndexMap<String, C>,
}

impl<C: Connection> Default for ConnectionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connection> ConnectionRegistry<C> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: IndexMap::new(),
        }
    }

    /// Register a connection. Names are unique.
    pub fn register(&mut self, name: impl Into<String>, conn: C) -> MigrateResult<()> {
        let name = name.into();
        if self.connections.contains_key(&name) {
            return Err(MigrationError::validation(format!(
                "connection '{name}' is already registered"
            )));
        }
        self.connections.insert(name, conn);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, name: impl Into<String>, conn: C) -> MigrateResult<Self> {
        self.register(name, conn)?;
        Ok(self)
    }

    /// Registered names except the default, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.connections
            .keys()
            .filter(|name| name.as_str() != DEFAULT_CONNECTION)
            .cloned()
            .collect()
    }

    /// Check if a connection is registered under this exact name.
    pub fn contains(&self, name: &str) -> bool {
        self.connections.contains_key(name)
    }

    /// Check if `db` resolves to a connection, directly or via the default.
    pub fn resolves(&self, db: &str) -> bool {
        self.contains(db) || self.contains(DEFAULT_CONNECTION)
    }

    /// Connection for a database.
    ///
    /// Falls back to the default connection. When the database exists it is
    /// selected with `USE`, so unqualified statements target it.
    pub async fn get(&mut self, db: &str) -> MigrateResult<&mut C> {
        let key = if self.connections.contains_key(db) {
            db
        } else {
            DEFAULT_CONNECTION
        };
        let conn = self
            .connections
            .get_mut(key)
            .ok_or_else(|| MigrationError::not_found(format!("connection for database '{db}'")))?;

        if SchemaCatalog::new(conn).database_exists(db).await? {
            conn.execute(&format!("USE {}", quote_ident(db)), &[]).await?;
            debug!(database = %db, connection = %key, "Database selected");
        }
        Ok(conn)
    }

    /// Connection for a database without selecting it.
    pub fn raw(&mut self, db: &str) -> MigrateResult<&mut C> {
        let key = if self.connections.contains_key(db) {
            db
        } else {
            DEFAULT_CONNECTION
        };
        self.connections
            .get_mut(key)
            .ok_or_else(|| MigrationError::not_found(format!("connection for database '{db}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryConnection, MemoryServer};

    fn registry(server: &MemoryServer) -> ConnectionRegistry<MemoryConnection> {
        ConnectionRegistry::new()
            .with(DEFAULT_CONNECTION, server.connect())
            .unwrap()
            .with("shop", server.connect())
            .unwrap()
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let server = MemoryServer::new();
        let mut registry = registry(&server);
        let err = registry.register("shop", server.connect()).unwrap_err();
        assert!(matches!(err, MigrationError::Validation(_)));
    }

    #[test]
    fn test_names_exclude_default() {
        let server = MemoryServer::new();
        let registry = registry(&server);
        assert_eq!(registry.names(), vec!["shop".to_string()]);
        assert!(registry.resolves("billing"));
        assert!(!ConnectionRegistry::<MemoryConnection>::new().resolves("billing"));
    }

    #[tokio::test]
    async fn test_get_selects_existing_database() {
        let server = MemoryServer::new().with_database("shop");
        let mut registry = registry(&server);

        let conn = registry.get("shop").await.unwrap();
        assert_eq!(conn.current_database(), Some("shop"));
        assert!(server.journal().contains(&"USE `shop`".to_string()));
    }

    #[tokio::test]
    async fn test_get_falls_back_to_default() {
        let server = MemoryServer::new();
        let mut registry = registry(&server);

        let conn = registry.get("billing").await.unwrap();
        assert_eq!(conn.current_database(), None);
    }

    #[tokio::test]
    async fn test_get_without_default_is_not_found() {
        let server = MemoryServer::new();
        let mut registry = ConnectionRegistry::new().with("shop", server.connect()).unwrap();

        let err = registry.get("billing").await.unwrap_err();
        assert!(matches!(err, MigrationError::NotFound(_)));
        assert!(registry.raw("billing").is_err());
    }
}
