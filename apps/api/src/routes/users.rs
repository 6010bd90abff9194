//! User management. Every route requires Admin.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use medstore_core::input::{UserDraft, UserPatch};
use medstore_core::validation::validate_password;
use medstore_core::User;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{hash_password, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::routes::Deleted;
use crate::AppState;

/// Body of `PUT /api/users/{id}/password`.
#[derive(Debug, Deserialize)]
pub struct PasswordReset {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct PasswordChanged {
    pub message: &'static str,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/{id}/password", put(reset_password))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<Vec<User>>> {
    user.require_admin()?;
    Ok(Json(state.db.users().list().await?))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    ApiJson(draft): ApiJson<UserDraft>,
) -> ApiResult<(StatusCode, Json<User>)> {
    admin.require_admin()?;
    let draft = draft.normalize()?;
    let hash = hash_password(&draft.password)?;
    let created = state.db.users().create(draft, hash).await?;
    info!(user_id = %created.id, role = %created.role, by = %admin.username, "User created");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    admin.require_admin()?;
    Ok(Json(state.db.users().get(&id).await?))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<UserPatch>,
) -> ApiResult<Json<User>> {
    admin.require_admin()?;
    Ok(Json(state.db.users().update(&id, patch).await?))
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<PasswordReset>,
) -> ApiResult<Json<PasswordChanged>> {
    admin.require_admin()?;
    validate_password(&body.password)?;
    let hash = hash_password(&body.password)?;
    state.db.users().set_password(&id, &hash).await?;
    info!(user_id = %id, by = %admin.username, "Password reset");
    Ok(Json(PasswordChanged {
        message: "Password updated",
    }))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Deleted>> {
    admin.require_admin()?;
    if admin.id == id {
        return Err(ApiError::validation("You cannot delete your own account"));
    }
    state.db.users().delete(&id).await?;
    info!(user_id = %id, by = %admin.username, "User deleted");
    Ok(Json(Deleted::new("User")))
}
