//! Database configuration loading
//!
//! Configuration is loaded from environment variables:
//! - `DATABASE_URL`: backend connection string (required, never defaulted)

use crate::error::{DbError, DbResult};

/// Name of the variable holding the connection string
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

/// Database configuration
#[derive(Clone)]
pub struct DatabaseConfig {
    database_url: String,
}

impl DatabaseConfig {
    /// Create config from environment variables
    pub fn from_env() -> DbResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup (for testing)
    pub fn from_lookup<F>(lookup: F) -> DbResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(DATABASE_URL_VAR) {
            Some(url) if !url.trim().is_empty() => Ok(Self { database_url: url }),
            _ => Err(DbError::config(format!(
                "{DATABASE_URL_VAR} environment variable is not set"
            ))),
        }
    }

    /// Create config with an explicit connection string
    pub fn with_url(database_url: impl Into<String>) -> DbResult<Self> {
        let database_url = database_url.into();
        Self::from_lookup(move |_| Some(database_url.clone()))
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

// Connection strings usually carry a password.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("database_url", &"<redacted>")
            .finish()
    }
}
