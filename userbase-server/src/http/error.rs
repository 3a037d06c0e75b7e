//! API error types with IntoResponse
//!
//! Errors are converted to JSON responses with appropriate status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::DbError;
use crate::models::{ValidationError, ValidationErrors};

/// Message returned when a user name is already taken
pub const USERNAME_TAKEN: &str = "username already exists";

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Payload failed field validation (400)
    Validation(ValidationErrors),

    /// Request could not be parsed (400)
    BadRequest { message: String },

    /// Unique user name already in use (409)
    Conflict { message: String },

    /// Backend failure (500, raw message returned)
    Query(DbError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn username_taken() -> Self {
        Self::Conflict {
            message: USERNAME_TAKEN.to_owned(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(errs) => {
                let fields: Vec<_> = errs
                    .errors()
                    .iter()
                    .map(|e| json!({ "field": e.field(), "message": e.to_string() }))
                    .collect();
                json!({
                    "error": "validation_error",
                    "message": errs.to_string(),
                    "fields": fields
                })
            }
            Self::BadRequest { message } => json!({
                "error": "bad_request",
                "message": message
            }),
            Self::Conflict { message } => json!({
                "error": "conflict",
                "message": message
            }),
            Self::Query(e) => {
                tracing::error!(error = %e, "database error");
                json!({
                    "error": "query_error",
                    "message": e.to_string()
                })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self {
        Self::Validation(e)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e.into())
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        if e.is_unique_violation() {
            tracing::debug!(error = %e, "unique violation mapped to conflict");
            return Self::username_taken();
        }
        Self::Query(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_error_is_400_with_fields() {
        let mut errs = ValidationErrors::new();
        errs.push(ValidationError::Empty { field: "user_name" });
        errs.push(ValidationError::TooLong {
            field: "department",
            max: 50,
        });

        let (status, body) = body_json(ApiError::Validation(errs)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["fields"][0]["field"], "user_name");
        assert_eq!(body["fields"][1]["field"], "department");
    }

    #[tokio::test]
    async fn conflict_is_409() {
        let (status, body) = body_json(ApiError::username_taken()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "username already exists");
    }

    #[tokio::test]
    async fn query_error_is_500_with_raw_message() {
        let err = ApiError::from(DbError::query("relation \"users\" does not exist"));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "relation \"users\" does not exist");
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let err = ApiError::from(DbError::query_with_code("duplicate key", "23505"));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn other_codes_stay_500() {
        let err = ApiError::from(DbError::query_with_code("null value", "23502"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
