//! Health probe backed by a storage ping.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tracing::{debug, warn};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/healthz", get(healthz))
}

/// GET /healthz: 200 when the database answers, 503 otherwise.
async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    debug!("Performing health checks");
    match state.repo.ping().await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "DB ping failed")
        }
    }
}
