//! Error types for userbase-server
//!
//! `DbError` is shared by every database-facing layer: connectors,
//! the mock expectation engine, the init orchestrator and repositories.
//! Messages are kept as strings so the live and mock backends can raise
//! the same variants.

use std::time::Duration;

use thiserror::Error;

/// Postgres SQLSTATE for `unique_violation`
pub const UNIQUE_VIOLATION: &str = "23505";

/// Database operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Required configuration is missing or malformed
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// Could not open or reach the backend
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// A schema migration failed. Schema state is undefined afterwards.
    #[error("Migration error: {message}")]
    Migration { message: String },

    /// Any other backend failure while running a statement
    #[error("{message}")]
    Query {
        message: String,
        /// SQLSTATE reported by the backend, if any
        code: Option<String>,
    },

    /// Statement expected a row but none came back
    #[error("no rows returned")]
    RowNotFound,

    /// Row cell could not be read as the requested type
    #[error("cannot decode column {index}: {reason}")]
    Decode { index: usize, reason: String },

    /// Operation exceeded its deadline
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Handle was used after `close`
    #[error("database handle is closed")]
    Closed,
}

/// Result type alias for database operations
pub type DbResult<T> = std::result::Result<T, DbError>;

impl DbError {
    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a migration error
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration {
            message: message.into(),
        }
    }

    /// Create a query error without a SQLSTATE
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            code: None,
        }
    }

    /// Create a query error carrying a SQLSTATE code
    pub fn query_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// Create a decode error
    pub fn decode(index: usize, reason: impl Into<String>) -> Self {
        Self::Decode {
            index,
            reason: reason.into(),
        }
    }

    /// True when the backend rejected a write on a unique constraint
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Query { code: Some(code), .. } if code == UNIQUE_VIOLATION)
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    pub fn is_migration_error(&self) -> bool {
        matches!(self, Self::Migration { .. })
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::RowNotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::connection(err.to_string())
            }
            sqlx::Error::Database(db_err) => Self::Query {
                message: db_err.message().to_owned(),
                code: db_err.code().map(|c| c.into_owned()),
            },
            _ => Self::query(err.to_string()),
        }
    }
}

impl From<crate::db::sql::BuildError> for DbError {
    fn from(err: crate::db::sql::BuildError) -> Self {
        Self::query(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::migration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DbError::config("DATABASE_URL environment variable is not set");
        assert_eq!(
            err.to_string(),
            "Configuration error: DATABASE_URL environment variable is not set"
        );

        let err = DbError::Timeout {
            operation: "ping",
            after: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "ping timed out after 5s");
    }

    #[test]
    fn query_error_shows_raw_backend_message() {
        let err = DbError::query("relation \"users\" does not exist");
        assert_eq!(err.to_string(), "relation \"users\" does not exist");
    }

    #[test]
    fn unique_violation_detection() {
        assert!(DbError::query_with_code("duplicate key", UNIQUE_VIOLATION).is_unique_violation());
        assert!(!DbError::query_with_code("syntax error", "42601").is_unique_violation());
        assert!(!DbError::query("duplicate key").is_unique_violation());
    }

    #[test]
    fn sqlx_row_not_found_conversion() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::RowNotFound));
    }

    #[test]
    fn sqlx_pool_timeout_is_connection_error() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_connection_error());
    }
}
