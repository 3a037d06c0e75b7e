//! Health check endpoint

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use crate::http::server::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

/// GET /health
async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    match state.db.db().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                version: env!("CARGO_PKG_VERSION"),
                database: "up",
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    version: env!("CARGO_PKG_VERSION"),
                    database: "down",
                }),
            )
        }
    }
}

/// Health routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbContext, MockDatabase};

    fn state(mock: &MockDatabase) -> State<Arc<AppState>> {
        State(Arc::new(AppState {
            db: DbContext::new(Arc::new(mock.clone())),
        }))
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let mock = MockDatabase::new();
        let (status, Json(body)) = health(state(&mock)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert_eq!(body.database, "up");
    }

    #[tokio::test]
    async fn closed_database_is_degraded() {
        let mock = MockDatabase::new();
        let s = state(&mock);
        s.0.db.close().await;

        let (status, Json(body)) = health(s).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.database, "down");
    }
}
