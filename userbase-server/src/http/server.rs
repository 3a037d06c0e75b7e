//! Axum server setup
//!
//! Server skeleton with:
//! - CORS restricted to a configured origin list
//! - Tracing middleware
//! - Graceful shutdown on SIGTERM/Ctrl+C, then the database is closed

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::routes;
use crate::db::DbContext;

/// Origin of the bundled web frontend
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:4200";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:1323)
    pub bind_addr: SocketAddr,

    /// Origins allowed by CORS (default: http://localhost:4200)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 1323)),
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_owned()],
        }
    }
}

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: DbContext,
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer, ServerError> {
    let origins = origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|e| ServerError::InvalidOrigin {
                    origin: origin.clone(),
                    reason: e.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any))
}

/// Build the application router around an initialized database context
pub fn build_router(db: DbContext, config: &ServerConfig) -> Result<Router, ServerError> {
    let cors = cors_layer(&config.cors_origins)?;

    Ok(Router::new()
        .merge(routes::health::router())
        .merge(routes::users::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(AppState { db })))
}

/// Run the HTTP server.
///
/// The database context is closed once the server has stopped, whether
/// it stopped cleanly or not.
///
/// # Example
///
/// ```ignore
/// let db = Initializer::new(PostgresConnector::default()).run().await?;
/// run_server(db, ServerConfig::default()).await?;
/// ```
pub async fn run_server(db: DbContext, config: ServerConfig) -> Result<(), ServerError> {
    let app = build_router(db.clone(), &config)?;

    let result = serve(app, config.bind_addr).await;

    db.close().await;
    tracing::info!("Database connection closed");
    result
}

async fn serve(app: Router, bind_addr: SocketAddr) -> Result<(), ServerError> {
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid CORS origin '{origin}': {reason}")]
    InvalidOrigin { origin: String, reason: String },
}
