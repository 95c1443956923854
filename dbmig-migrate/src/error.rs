//! Error types for the schema and migration engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Boxed driver error carried as the cause of [`MigrationError::Sql`].
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while reconciling schemas or running migrations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Empty or invalid argument.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing schema file, migration, connection or database object.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Table or database exists and no force flag was given.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Schema file or migration filename in an unexpected shape.
    #[error("Format error: {0}")]
    Format(String),

    /// Driver-level failure executing a statement.
    #[error("SQL error while {context}: {source}")]
    Sql {
        /// What the engine was doing.
        context: String,
        /// The original driver error.
        #[source]
        source: DriverError,
    },

    /// Operation that violates an engine contract.
    #[error("Logic error: {0}")]
    Logic(String),

    /// The user declined a confirmation that the operation required.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl MigrationError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an already exists error.
    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// Create a format error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create a logic error.
    pub fn logic(msg: impl Into<String>) -> Self {
        Self::Logic(msg.into())
    }

    /// Wrap a driver error with the statement or action that produced it.
    pub fn sql(context: impl Into<String>, source: impl Into<DriverError>) -> Self {
        Self::Sql {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Check if this is a driver-level execution failure.
    pub fn is_sql(&self) -> bool {
        matches!(self, Self::Sql { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MigrationError::not_found("connection 'shop'");
        assert!(err.to_string().contains("shop"));
    }

    #[test]
    fn test_sql_error_keeps_source() {
        use std::error::Error as _;

        let err = MigrationError::sql("executing `DROP TABLE t`", "table is locked");
        assert!(err.is_sql());
        assert!(err.to_string().contains("DROP TABLE t"));
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("table is locked"));
    }

    #[test]
    fn test_is_sql() {
        assert!(!MigrationError::logic("update not supported").is_sql());
        assert!(!MigrationError::validation("empty name").is_sql());
    }
}
