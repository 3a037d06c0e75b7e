//! One-directional migration command
//!
//! Unlike `serve`, which always reverts then re-applies, this runs a
//! single direction and leaves the data alone when going up.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use super::DatabaseArgs;
use userbase_server::db::{Connector, Database};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Apply every pending migration
    Up,
    /// Revert every applied migration
    Down,
}

/// Arguments for the migrate command
#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Which way to migrate
    #[arg(value_enum)]
    pub direction: Direction,

    #[command(flatten)]
    pub db: DatabaseArgs,
}

pub async fn run_migrate(args: MigrateArgs) -> Result<()> {
    let config = args.db.config().context("Missing database configuration")?;
    let connector = args.db.connector();

    let handle = connector
        .open(config.database_url())
        .await
        .context("Failed to open database")?;

    let result: Result<()> = async {
        connector.ping(&handle).await.context("Database unreachable")?;
        match args.direction {
            Direction::Up => connector.migrate_up(&handle).await,
            Direction::Down => connector.migrate_down(&handle).await,
        }
        .with_context(|| {
            format!(
                "Migration {:?} failed using {}",
                args.direction,
                args.db.migrations_dir.display()
            )
        })
    }
    .await;

    handle.close().await;
    result
}
