//! Driver errors.

use std::fmt;
use std::time::Duration;

use dbmig_migrate::MigrationError;

/// Result type for driver operations.
pub type MysqlResult<T> = Result<T, MysqlError>;

/// Failure opening or using a MySQL connection.
#[derive(Debug)]
pub enum MysqlError {
    /// Error reported by `mysql_async`.
    Driver(mysql_async::Error),
    /// Connection URL that cannot be used.
    InvalidUrl(String),
    /// Unknown or malformed URL query option.
    InvalidOption {
        /// Option name.
        name: String,
        /// Offending value, empty for unknown options.
        value: String,
    },
    /// The server did not answer in time.
    Timeout {
        /// `host:port` that was dialed.
        address: String,
        /// Configured limit.
        after: Duration,
    },
}

impl MysqlError {
    pub(crate) fn invalid_url(msg: impl Into<String>) -> Self {
        Self::InvalidUrl(msg.into())
    }

    pub(crate) fn invalid_option(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidOption {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Check if the error comes from configuration rather than the server.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::InvalidUrl(_) | Self::InvalidOption { .. })
    }
}

impl fmt::Display for MysqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driver(e) => write!(f, "MySQL error: {}", e),
            Self::InvalidUrl(msg) => write!(f, "invalid MySQL URL: {}", msg),
            Self::InvalidOption { name, value } if value.is_empty() => {
                write!(f, "unknown connection option '{}'", name)
            }
            Self::InvalidOption { name, value } => {
                write!(f, "invalid value '{}' for connection option '{}'", value, name)
            }
            Self::Timeout { address, after } => {
                write!(f, "no answer from {} within {}s", address, after.as_secs())
            }
        }
    }
}

impl std::error::Error for MysqlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Driver(e) => Some(e),
            _ => None,
        }
    }
}

impl From<mysql_async::Error> for MysqlError {
    fn from(err: mysql_async::Error) -> Self {
        Self::Driver(err)
    }
}

impl From<MysqlError> for MigrationError {
    fn from(err: MysqlError) -> Self {
        if err.is_config() {
            return MigrationError::validation(err.to_string());
        }
        MigrationError::sql("talking to the server", err)
    }
}
