//! Health check endpoints.

use axum::{extract::State, http::StatusCode};

use crate::services::cart::LineItemStore;
use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Always returns 200 OK if the server is running.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
/// States without a pool are always ready.
pub async fn readiness<S: LineItemStore>(State(state): State<AppState<S>>) -> StatusCode {
    let Some(pool) = state.pool() else {
        return StatusCode::OK;
    };

    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
