//! Sign-in routes.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use medstore_core::User;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{verify_password, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: User,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
}

/// `POST /api/auth/login`
///
/// Unknown user, wrong password and disabled account all answer with the
/// same 401 message.
async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let invalid = || ApiError::unauthorized("Invalid username or password");

    let user = state
        .db
        .users()
        .find_by_username(request.username.trim())
        .await?
        .ok_or_else(invalid)?;

    if !user.is_active || !verify_password(&request.password, &user.password_hash) {
        warn!(username = %user.username, "Failed sign-in");
        return Err(invalid());
    }

    let token = state.jwt.generate_token(&user)?;
    info!(user_id = %user.id, role = %user.role, "Signed in");

    Ok(Json(LoginResponse {
        token,
        expires_in: state.jwt.lifetime_secs(),
        user,
    }))
}

/// `GET /api/auth/me`
async fn me(State(state): State<Arc<AppState>>, user: AuthUser) -> ApiResult<Json<User>> {
    Ok(Json(state.db.users().get(&user.id).await?))
}
