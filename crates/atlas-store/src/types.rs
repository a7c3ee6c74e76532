//! Row types for the task table.

use serde::{Deserialize, Serialize};

/// Full task row, including geocoding bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub is_closed: bool,
    pub geocoding_attempts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geocoding_error: Option<String>,
    pub created_at: i64,
}

/// Options for inserting a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub address: Option<String>,
    pub is_closed: bool,
    pub geocoding_attempts: i64,
    pub created_at: Option<i64>,
}
