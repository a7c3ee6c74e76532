//! Shared application state for the monitoring server.

use std::sync::Arc;

use atlas_store::TaskRepository;
use prometheus::Registry;

pub struct AppState {
    pub repo: Arc<dyn TaskRepository>,
    pub registry: Registry,
}

impl AppState {
    pub fn new(repo: Arc<dyn TaskRepository>, registry: Registry) -> Self {
        Self { repo, registry }
    }
}
