//! Health check endpoints.

use axum::{extract::State, http::StatusCode};

use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies the backend is reachable before returning OK.
/// Returns 503 Service Unavailable otherwise.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.gateway().health().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Backend health check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
