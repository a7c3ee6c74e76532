//! Atlas Runtime: polling scheduler, batch orchestration and worker pool.
//!
//! [`GeocodingService::run`] wakes up once per interval, fetches up to
//! [`BATCH_SIZE`] pending tasks and fans them out to a fixed number of workers.
//! Each worker resolves addresses through the configured provider and records
//! either coordinates or a failure for every task it takes.

pub mod metrics;
pub mod service;

pub use metrics::GeocodingMetrics;
pub use service::{GeocodingService, ServiceSettings, BATCH_SIZE};
