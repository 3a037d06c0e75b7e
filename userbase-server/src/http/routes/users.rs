//! User endpoints
//!
//! The username pre-check before a write is not transactional; the
//! unique index on `users.user_name` catches the races it misses and
//! those surface as the same 409.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::db::UserRepo;
use crate::http::error::ApiError;
use crate::http::extractors::{JsonBody, UserId};
use crate::http::server::AppState;
use crate::models::User;

/// Confirmation body for DELETE
pub const USER_DELETED: &str = "User deleted";

/// GET /users - list all users
async fn list_users(State(state): State<Arc<AppState>>) -> Result<Json<Vec<User>>, ApiError> {
    let users = UserRepo::new(&state.db).list().await?;
    Ok(Json(users))
}

/// POST /users - create a user
async fn create_user(
    State(state): State<Arc<AppState>>,
    JsonBody(mut user): JsonBody<User>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    user.validate()?;

    let repo = UserRepo::new(&state.db);
    if repo.find_by_username(&user.user_name).await?.is_some() {
        return Err(ApiError::username_taken());
    }

    user.user_id = repo.insert(&user).await?;
    tracing::info!(user_id = user.user_id, user_name = %user.user_name, "user created");

    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT /users/{id} - replace a user
async fn update_user(
    State(state): State<Arc<AppState>>,
    UserId(id): UserId,
    JsonBody(mut user): JsonBody<User>,
) -> Result<Json<User>, ApiError> {
    user.validate()?;

    let repo = UserRepo::new(&state.db);
    if let Some(existing) = repo.find_by_username(&user.user_name).await? {
        if existing.user_id != id {
            return Err(ApiError::username_taken());
        }
    }

    let affected = repo.update(id, &user).await?;
    if affected == 0 {
        tracing::debug!(user_id = id, "update matched no rows");
    }

    user.user_id = id;
    Ok(Json(user))
}

/// DELETE /users/{id} - remove a user
async fn delete_user(
    State(state): State<Arc<AppState>>,
    UserId(id): UserId,
) -> Result<Json<&'static str>, ApiError> {
    let affected = UserRepo::new(&state.db).delete(id).await?;
    tracing::info!(user_id = id, affected, "user deleted");
    Ok(Json(USER_DELETED))
}

/// User routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", put(update_user).delete(delete_user))
}
