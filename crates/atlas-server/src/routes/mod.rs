//! Monitoring HTTP surface: liveness and Prometheus exposition.

pub mod health;
pub mod metrics;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the monitoring router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(metrics::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
