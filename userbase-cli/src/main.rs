//! userbase CLI - user directory REST backend
//!
//! Entry point for:
//! - `serve`: reset the schema, then run the HTTP API
//! - `migrate up|down`: move the schema one direction only

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod tracing_setup;

use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "userbase",
    author,
    version,
    about = "REST backend for a users directory, backed by Postgres"
)]
struct Cli {
    /// Enable debug logging (when RUST_LOG is not set)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize the database and run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Apply or revert schema migrations without starting the server
    Migrate(commands::migrate::MigrateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Optional .env next to the binary's working directory
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    tracing_setup::init_tracing(&TracingConfig { debug: cli.debug }).ok();

    match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await?,
        Commands::Migrate(args) => commands::run_migrate(args).await?,
    }
    Ok(())
}
