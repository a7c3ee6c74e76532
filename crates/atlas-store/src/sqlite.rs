//! SQLite-backed task repository.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::repository::{TaskRepository, MAX_GEOCODING_ATTEMPTS};
use crate::schema::SCHEMA_SQL;
use crate::types::*;
use atlas_core::{Coordinates, Error, Result, Task, TaskId};

const FETCH_TASKS_SQL: &str = "
    SELECT task_id, address
    FROM tasks
    WHERE
        latitude IS NULL
        AND is_closed = 0
        AND geocoding_attempts < ?1
        AND address IS NOT NULL AND address <> ''
    ORDER BY created_at ASC, task_id ASC
    LIMIT ?2";

/// Task repository over a single SQLite connection.
///
/// Async trait calls run their statements on the blocking pool.
pub struct SqliteTaskRepository {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SqliteTaskRepository {
    /// Open or create the database file, creating parent directories if needed.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| Error::Storage(e.to_string()))?;
            }
        }

        let conn = Connection::open(&db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        let repo = Self::from_connection(conn, db_path)?;
        info!(
            "SqliteTaskRepository initialized: {} tasks, path={}",
            repo.count_tasks()?,
            repo.db_path.display()
        );
        Ok(repo)
    }

    /// In-memory database, mostly useful for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Database(e.to_string()))?;
        Self::from_connection(conn, PathBuf::from(":memory:"))
    }

    fn from_connection(conn: Connection, db_path: PathBuf) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Insert a task. Returns the new task ID.
    pub fn add_task(&self, task: NewTask) -> Result<TaskId> {
        let created_at = task
            .created_at
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
        let conn = self.conn.lock();
        let result = conn.prepare_cached(
            "INSERT INTO tasks (address, is_closed, geocoding_attempts, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .insert(params![
            task.address,
            task.is_closed,
            task.geocoding_attempts,
            created_at
        ])
        .map_err(|e| Error::Database(e.to_string()));
        result
    }

    /// Get a full task row by ID.
    pub fn get_task(&self, task_id: TaskId) -> Result<Option<TaskRecord>> {
        let conn = self.conn.lock();
        let result = conn.prepare_cached(
            "SELECT task_id, address, latitude, longitude, is_closed,
                    geocoding_attempts, geocoding_error, created_at
             FROM tasks WHERE task_id = ?1",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .query_row(params![task_id], |row| {
            Ok(TaskRecord {
                id: row.get(0)?,
                address: row.get(1)?,
                latitude: row.get(2)?,
                longitude: row.get(3)?,
                is_closed: row.get(4)?,
                geocoding_attempts: row.get(5)?,
                geocoding_error: row.get(6)?,
                created_at: row.get(7)?,
            })
        })
        .optional()
        .map_err(|e| Error::Database(e.to_string()));
        result
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || f(&*conn.lock()))
            .await
            .map_err(|e| Error::Storage(format!("database task failed: {}", e)))?
    }

    pub fn count_tasks(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn fetch_tasks_for_geocoding(&self, limit: usize) -> Result<Vec<Task>> {
        self.with_conn(move |conn| {
            let query_failed = |e: rusqlite::Error| {
                Error::Storage(format!("failed to query active tasks with address: {}", e))
            };
            let mut stmt = conn.prepare_cached(FETCH_TASKS_SQL).map_err(query_failed)?;
            let rows = stmt
                .query_map(params![MAX_GEOCODING_ATTEMPTS, limit as i64], |row| {
                    Ok(Task {
                        id: row.get(0)?,
                        address: row.get(1)?,
                    })
                })
                .map_err(query_failed)?;

            let mut tasks = Vec::new();
            for row in rows {
                let task =
                    row.map_err(|e| Error::Storage(format!("failed to read task row: {}", e)))?;
                debug!("Pending task without coordinates: id={} address={}", task.id, task.address);
                tasks.push(task);
            }
            Ok(tasks)
        })
        .await
    }

    async fn update_task_coordinates(&self, task_id: TaskId, coords: Coordinates) -> Result<()> {
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE tasks
                 SET latitude = ?1, longitude = ?2, geocoding_error = NULL
                 WHERE task_id = ?3",
                params![coords.latitude(), coords.longitude(), task_id],
            )
            .map_err(|e| Error::Storage(format!("failed to update task coordinates: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn increment_failure_count(&self, task_id: TaskId, error: &str) -> Result<()> {
        let error = error.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "UPDATE tasks
                 SET geocoding_attempts = geocoding_attempts + 1, geocoding_error = ?1
                 WHERE task_id = ?2",
                params![error, task_id],
            )
            .map_err(|e| {
                Error::Storage(format!(
                    "failed to update geocoding error and number of attempts: {}",
                    e
                ))
            })?;
            Ok(())
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(|e| Error::Database(e.to_string()))?;
            Ok(())
        })
        .await
    }
}
