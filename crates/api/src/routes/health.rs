//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use messaging::ConsumerStatus;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub consumers: Vec<ConsumerStatus>,
}

/// GET /health: overall status plus the state of every consumer.
///
/// Reports `degraded` once a consumer has been disabled, and answers 503
/// with `faulted` once a consumer has stopped on a fatal broker error.
pub async fn check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let (code, status) = if state.statuses.any_faulted() {
        (StatusCode::SERVICE_UNAVAILABLE, "faulted")
    } else if state.statuses.all_healthy() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::OK, "degraded")
    };

    (
        code,
        Json(HealthResponse {
            status,
            consumers: state.statuses.snapshot(),
        }),
    )
}
