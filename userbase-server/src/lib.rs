//! userbase-server: user directory REST backend
//!
//! A pluggable [`db::Connector`] opens, health-checks and migrates the
//! store; [`db::Initializer`] drives it through the startup sequence and
//! hands back a [`db::DbContext`] that the HTTP layer is built around.

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;

pub use config::DatabaseConfig;
pub use error::{DbError, DbResult};
pub use http::{build_router, run_server, ServerConfig};
