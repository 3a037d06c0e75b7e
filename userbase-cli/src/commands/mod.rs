//! Command implementations for the userbase CLI

use std::path::PathBuf;

use clap::Args;
use userbase_server::db::pool::DEFAULT_MAX_CONNECTIONS;
use userbase_server::db::{PoolSettings, PostgresConnector, DEFAULT_MIGRATIONS_DIR};
use userbase_server::{DatabaseConfig, DbResult};

pub mod migrate;
pub mod serve;

pub use migrate::run_migrate;
pub use serve::run_serve;

/// Database options shared by every command that touches the store
#[derive(Args, Debug)]
pub struct DatabaseArgs {
    /// Database URL (required, never defaulted)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Directory of reversible `.up.sql` / `.down.sql` migrations
    #[arg(long, env = "MIGRATIONS_DIR", default_value = DEFAULT_MIGRATIONS_DIR)]
    pub migrations_dir: PathBuf,

    /// Maximum pooled connections
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,
}

impl DatabaseArgs {
    pub fn connector(&self) -> PostgresConnector {
        let settings = PoolSettings {
            max_connections: self.max_connections,
            ..PoolSettings::default()
        };
        PostgresConnector::new(&self.migrations_dir).with_pool_settings(settings)
    }

    /// Explicit URL if given, otherwise the process environment
    pub fn config(&self) -> DbResult<DatabaseConfig> {
        match &self.database_url {
            Some(url) => DatabaseConfig::with_url(url.as_str()),
            None => DatabaseConfig::from_env(),
        }
    }
}
