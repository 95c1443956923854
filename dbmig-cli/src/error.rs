//! CLI error types and result alias.

use dbmig_migrate::MigrationError;
use dbmig_mysql::MysqlError;
use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(dbmig::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(dbmig::config))]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    #[diagnostic(code(dbmig::validation))]
    Validation(String),

    /// Something the command needs does not exist
    #[error("Not found: {0}")]
    #[diagnostic(code(dbmig::not_found))]
    NotFound(String),

    /// Migration error
    #[error("Migration error: {0}")]
    #[diagnostic(code(dbmig::migration))]
    Migration(String),

    /// Database error
    #[error("Database error: {0}")]
    #[diagnostic(code(dbmig::database))]
    Database(String),
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {}", err))
    }
}

impl From<MysqlError> for CliError {
    fn from(err: MysqlError) -> Self {
        if err.is_config() {
            CliError::Config(err.to_string())
        } else {
            CliError::Database(err.to_string())
        }
    }
}

impl From<MigrationError> for CliError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::Io(e) => CliError::Io(e),
            MigrationError::Validation(msg) => CliError::Validation(msg),
            MigrationError::NotFound(msg) => CliError::NotFound(msg),
            err @ MigrationError::Sql { .. } => CliError::Database(err.to_string()),
            other => CliError::Migration(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_error_mapping() {
        let err: CliError = MigrationError::validation("empty database name").into();
        assert!(matches!(err, CliError::Validation(_)));

        let err: CliError = MigrationError::not_found("connection for database 'shop'").into();
        assert!(matches!(err, CliError::NotFound(_)));

        let err: CliError = MigrationError::sql("executing `USE x`", "Unknown database").into();
        assert!(matches!(err, CliError::Database(ref msg) if msg.contains("Unknown database")));

        let err: CliError = MigrationError::logic("already applied").into();
        assert!(matches!(err, CliError::Migration(_)));
    }
}
