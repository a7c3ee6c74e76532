//! Repository contract consumed by the geocoding runtime.

use async_trait::async_trait;

use atlas_core::{Coordinates, Result, Task, TaskId};

/// Tasks with this many failed attempts are no longer fetched.
pub const MAX_GEOCODING_ATTEMPTS: i64 = 5;

/// Storage operations the geocoder needs.
///
/// Implementations are shared by every worker of a batch, so they must be
/// safe to call concurrently.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Oldest-first tasks that have no coordinates, are open, have fewer than
    /// [`MAX_GEOCODING_ATTEMPTS`] failures and a non-empty address.
    async fn fetch_tasks_for_geocoding(&self, limit: usize) -> Result<Vec<Task>>;

    /// Store coordinates and clear any previous geocoding error.
    async fn update_task_coordinates(&self, task_id: TaskId, coords: Coordinates) -> Result<()>;

    /// Bump the attempt counter and remember the latest error text.
    async fn increment_failure_count(&self, task_id: TaskId, error: &str) -> Result<()>;

    /// Cheap reachability check used by the health probe.
    async fn ping(&self) -> Result<()>;
}
