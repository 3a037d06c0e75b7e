//! Database layer - connectors, handles, startup and repositories
//!
//! # Design Principles
//!
//! - Backends plug in through the `Connector` trait (live Postgres, mock)
//! - Above the connector everything goes through `Arc<dyn Database>`
//! - SQL text comes from one shared `StatementBuilder`, never hand-formatted
//! - Concurrency is the pool's job; this layer holds no locks of its own

pub mod connector;
pub mod database;
pub mod init;
pub mod mock;
pub mod pool;
pub mod postgres;
pub mod repos;
pub mod sql;

pub use connector::{Connector, ConnectorStep};
pub use database::{Database, Row};
pub use init::{DbContext, InitError, InitOptions, InitStage, Initializer};
pub use mock::{MockConnector, MockDatabase};
pub use pool::{create_pool, PoolSettings};
pub use postgres::{PgDatabase, PostgresConnector, DEFAULT_MIGRATIONS_DIR};
pub use repos::UserRepo;
pub use sql::{Placeholder, Statement, StatementBuilder, Value};
