//! Storage connector trait
//!
//! A connector knows how to open a session against one kind of backend,
//! health-check it, and move its schema up or down. Two implementations:
//! - [`PostgresConnector`](super::PostgresConnector) for the live database
//! - [`MockConnector`](super::MockConnector) backed by the expectation engine

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::Database;
use crate::error::DbResult;

/// Connector steps, in the order the orchestrator calls them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectorStep {
    Open,
    Ping,
    MigrateDown,
    MigrateUp,
}

impl ConnectorStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Ping => "ping",
            Self::MigrateDown => "migrate_down",
            Self::MigrateUp => "migrate_up",
        }
    }
}

impl fmt::Display for ConnectorStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability interface every storage backend implements.
///
/// Migrations are applied in strictly increasing version order and
/// reverted in the reverse order. A migration that fails half way leaves
/// the schema in whatever state the backend reached; nothing here tries
/// to repair it.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Concrete session type handed out by `open`
    type Handle: Database + Clone + 'static;

    /// Establish a session. Fails with `DbError::Connection` on a
    /// malformed connection string or unreachable backend.
    async fn open(&self, connection_string: &str) -> DbResult<Self::Handle>;

    /// Verify liveness. Fails with `DbError::Connection` when unreachable.
    async fn ping(&self, handle: &Self::Handle) -> DbResult<()>;

    /// Revert every applied migration. Nothing applied is not an error.
    async fn migrate_down(&self, handle: &Self::Handle) -> DbResult<()>;

    /// Apply every pending migration. Already current is not an error.
    async fn migrate_up(&self, handle: &Self::Handle) -> DbResult<()>;
}

#[async_trait]
impl<C: Connector + ?Sized> Connector for Arc<C> {
    type Handle = C::Handle;

    async fn open(&self, connection_string: &str) -> DbResult<Self::Handle> {
        (**self).open(connection_string).await
    }

    async fn ping(&self, handle: &Self::Handle) -> DbResult<()> {
        (**self).ping(handle).await
    }

    async fn migrate_down(&self, handle: &Self::Handle) -> DbResult<()> {
        (**self).migrate_down(handle).await
    }

    async fn migrate_up(&self, handle: &Self::Handle) -> DbResult<()> {
        (**self).migrate_up(handle).await
    }
}
