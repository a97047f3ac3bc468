//! Login endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user_id: i32,
    pub username: String,
    pub email: String,
}

/// POST /login: authenticate and announce the login.
///
/// The cart is provisioned asynchronously once the event is consumed.
#[tracing::instrument(skip(state, req), fields(username = %req.username))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user = state.login()?.login(&req.username, &req.password).await?;

    Ok(Json(LoginResponse {
        user_id: user.id.as_i32(),
        username: user.username,
        email: user.email,
    }))
}
