//! Prometheus metrics for the geocoding pipeline.

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, HistogramVec, IntCounter,
    IntCounterVec, IntGauge, Registry,
};

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_FAILURE: &str = "failure";

/// Counters, histogram and gauge shared by every worker.
///
/// Registered into a caller-owned [`Registry`] so the monitoring server and
/// tests can each use their own.
#[derive(Clone)]
pub struct GeocodingMetrics {
    pub tasks_processed: IntCounterVec,
    pub api_errors: IntCounter,
    pub request_seconds: HistogramVec,
    pub active_workers: IntGauge,
}

impl GeocodingMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let tasks_processed = register_int_counter_vec_with_registry!(
            "geocoding_tasks_processed_total",
            "Total number of processed geocoding tasks.",
            &["status"],
            registry
        )?;

        let api_errors = register_int_counter_with_registry!(
            "geocoding_provider_api_errors_total",
            "Total number of errors received from the geocoding provider API.",
            registry
        )?;

        let request_seconds = register_histogram_vec_with_registry!(
            "geocoding_provider_request_duration_seconds",
            "Duration of requests to the geocoding provider API.",
            &["provider"],
            registry
        )?;

        let active_workers = register_int_gauge_with_registry!(
            "geocoding_active_workers",
            "Current number of active workers processing tasks.",
            registry
        )?;

        Ok(Self {
            tasks_processed,
            api_errors,
            request_seconds,
            active_workers,
        })
    }

    pub fn record_success(&self) {
        self.tasks_processed.with_label_values(&[STATUS_SUCCESS]).inc();
    }

    pub fn record_failure(&self) {
        self.tasks_processed.with_label_values(&[STATUS_FAILURE]).inc();
        self.api_errors.inc();
    }

    pub fn observe_request(&self, provider: &str, seconds: f64) {
        self.request_seconds
            .with_label_values(&[provider])
            .observe(seconds);
    }

    pub fn processed(&self, status: &str) -> u64 {
        self.tasks_processed.with_label_values(&[status]).get()
    }

    pub fn request_count(&self, provider: &str) -> u64 {
        self.request_seconds
            .with_label_values(&[provider])
            .get_sample_count()
    }
}
