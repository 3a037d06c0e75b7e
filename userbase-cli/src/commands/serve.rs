//! HTTP server command
//!
//! Runs the startup sequence against Postgres, then serves the users API
//! until Ctrl+C/SIGTERM.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use super::DatabaseArgs;
use userbase_server::db::{InitOptions, Initializer};
use userbase_server::http::{run_server, ServerConfig};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(long, short = 'b', env = "BIND_ADDR", default_value = "0.0.0.0:1323")]
    pub bind: SocketAddr,

    /// Allowed CORS origin (repeat or comma-separate for several)
    #[arg(
        long = "cors-origin",
        env = "CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:4200"
    )]
    pub cors_origins: Vec<String>,

    /// Deadline for each startup step (open, ping, migrate)
    #[arg(long, default_value_t = 30)]
    pub step_timeout_secs: u64,

    /// Ping attempts before giving up; 1 disables retry
    #[arg(long, default_value_t = 1)]
    pub ping_attempts: u32,

    #[command(flatten)]
    pub db: DatabaseArgs,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let options = InitOptions {
        step_timeout: Duration::from_secs(args.step_timeout_secs),
        ping_attempts: args.ping_attempts,
        ..InitOptions::default()
    };

    tracing::info!(
        migrations_dir = %args.db.migrations_dir.display(),
        "Initializing database"
    );
    let db = Initializer::new(args.db.connector())
        .with_options(options)
        .run_with(|| args.db.config())
        .await
        .context("Database initialization failed")?;

    let config = ServerConfig {
        bind_addr: args.bind,
        cors_origins: args.cors_origins,
    };

    tracing::info!("Starting userbase server on {}", config.bind_addr);

    // Run server (blocks until shutdown)
    run_server(db, config).await.context("Server error")?;

    Ok(())
}
