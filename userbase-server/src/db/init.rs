//! Startup sequence for the database layer
//!
//! ```text
//! Unstarted -> ConfigLoaded -> Opened -> Pinged -> MigratedDown -> MigratedUp -> Ready
//! ```
//!
//! The sequence is linear. The first failing step aborts it and the error
//! is returned together with the last stage reached; whether that is fatal
//! is the caller's decision. [`Initializer::run`] consumes the initializer,
//! so one instance can only ever initialize once.
//!
//! Every run reverts *all* migrations before re-applying them. Against a
//! persistent database this wipes the `users` table on each boot. It gives
//! every run the same schema baseline and is kept on purpose, but it is
//! destructive and logged as such.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::sql::{Placeholder, StatementBuilder};
use super::{Connector, ConnectorStep, Database};
use crate::config::DatabaseConfig;
use crate::error::{DbError, DbResult};

/// Default deadline for each connector call
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default delay before the first ping retry
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Stages of the startup state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InitStage {
    Unstarted,
    ConfigLoaded,
    Opened,
    Pinged,
    MigratedDown,
    MigratedUp,
    Ready,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unstarted => "unstarted",
            Self::ConfigLoaded => "config_loaded",
            Self::Opened => "opened",
            Self::Pinged => "pinged",
            Self::MigratedDown => "migrated_down",
            Self::MigratedUp => "migrated_up",
            Self::Ready => "ready",
        })
    }
}

/// Deadlines and retry policy for the startup sequence
#[derive(Debug, Clone, Copy)]
pub struct InitOptions {
    /// Deadline applied to each of open, ping, migrate_down, migrate_up
    pub step_timeout: Duration,
    /// Total ping attempts; 1 means no retry
    pub ping_attempts: u32,
    /// Delay before the first retry, doubled after each failure
    pub retry_backoff: Duration,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            step_timeout: DEFAULT_STEP_TIMEOUT,
            ping_attempts: 1,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Startup failed; `stage` is the last stage successfully reached
#[derive(Debug, Error)]
#[error("database initialization failed at stage {stage}: {source}")]
pub struct InitError {
    pub stage: InitStage,
    pub source: DbError,
}

/// Live connection plus the shared statement builder
///
/// Built once at startup and injected into the HTTP state.
#[derive(Clone)]
pub struct DbContext {
    db: Arc<dyn Database>,
    sql: StatementBuilder,
}

impl DbContext {
    /// Wrap an open handle with a Postgres-style (`$n`) builder
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            sql: StatementBuilder::new(Placeholder::Dollar),
        }
    }

    pub fn db(&self) -> &dyn Database {
        self.db.as_ref()
    }

    pub fn sql(&self) -> &StatementBuilder {
        &self.sql
    }

    /// Release the underlying connection
    pub async fn close(&self) {
        self.db.close().await;
    }
}

impl fmt::Debug for DbContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbContext")
            .field("placeholder", &self.sql.placeholder())
            .finish_non_exhaustive()
    }
}

/// Run one connector call under a deadline
async fn bounded<T, F>(step: ConnectorStep, limit: Duration, fut: F) -> DbResult<T>
where
    F: Future<Output = DbResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(DbError::Timeout {
            operation: step.as_str(),
            after: limit,
        }),
    }
}

/// Drives a [`Connector`] through the startup sequence
pub struct Initializer<C: Connector> {
    connector: C,
    options: InitOptions,
    stage: InitStage,
}

impl<C: Connector> Initializer<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            options: InitOptions::default(),
            stage: InitStage::Unstarted,
        }
    }

    pub fn with_options(mut self, options: InitOptions) -> Self {
        self.options = options;
        self
    }

    /// Initialize using `DATABASE_URL` from the process environment
    pub async fn run(self) -> Result<DbContext, InitError> {
        self.run_with(DatabaseConfig::from_env).await
    }

    /// Initialize using configuration produced by `load`
    pub async fn run_with<L>(mut self, load: L) -> Result<DbContext, InitError>
    where
        L: FnOnce() -> DbResult<DatabaseConfig>,
    {
        let config = load().map_err(|e| self.fail(e))?;
        self.advance(InitStage::ConfigLoaded);

        let handle = bounded(
            ConnectorStep::Open,
            self.options.step_timeout,
            self.connector.open(config.database_url()),
        )
        .await
        .map_err(|e| self.fail(e))?;
        self.advance(InitStage::Opened);

        if let Err(err) = self.prepare(&handle).await {
            handle.close().await;
            return Err(self.fail(err));
        }

        self.advance(InitStage::Ready);
        Ok(DbContext::new(Arc::new(handle)))
    }

    async fn prepare(&mut self, handle: &C::Handle) -> DbResult<()> {
        let limit = self.options.step_timeout;

        self.ping_with_retry(handle).await?;
        self.advance(InitStage::Pinged);

        tracing::warn!(
            "reverting all migrations before re-applying them; existing data will be dropped"
        );
        bounded(
            ConnectorStep::MigrateDown,
            limit,
            self.connector.migrate_down(handle),
        )
        .await?;
        self.advance(InitStage::MigratedDown);

        bounded(
            ConnectorStep::MigrateUp,
            limit,
            self.connector.migrate_up(handle),
        )
        .await?;
        self.advance(InitStage::MigratedUp);

        Ok(())
    }

    async fn ping_with_retry(&self, handle: &C::Handle) -> DbResult<()> {
        let attempts = self.options.ping_attempts.max(1);
        let mut delay = self.options.retry_backoff;
        let mut attempt = 1;

        loop {
            let result = bounded(
                ConnectorStep::Ping,
                self.options.step_timeout,
                self.connector.ping(handle),
            )
            .await;

            match result {
                Ok(()) => return Ok(()),
                Err(err) if attempt < attempts => {
                    tracing::warn!(
                        attempt,
                        attempts,
                        error = %err,
                        "database ping failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn advance(&mut self, stage: InitStage) {
        tracing::info!(from = %self.stage, to = %stage, "database init");
        self.stage = stage;
    }

    fn fail(&self, source: DbError) -> InitError {
        tracing::error!(stage = %self.stage, error = %source, "database init aborted");
        InitError {
            stage: self.stage,
            source,
        }
    }
}
