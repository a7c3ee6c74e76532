//! Database schema SQL.

/// The `tasks` table as seen by the geocoder.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    task_id INTEGER PRIMARY KEY AUTOINCREMENT,
    address TEXT,
    latitude REAL,
    longitude REAL,
    is_closed INTEGER NOT NULL DEFAULT 0,
    geocoding_attempts INTEGER NOT NULL DEFAULT 0,
    geocoding_error TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_pending
    ON tasks(created_at)
    WHERE latitude IS NULL AND is_closed = 0;
"#;
