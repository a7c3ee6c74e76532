//! Atlas Store: task repository contract and its SQLite implementation.

pub mod repository;
pub mod schema;
pub mod sqlite;
pub mod types;

pub use repository::{TaskRepository, MAX_GEOCODING_ATTEMPTS};
pub use sqlite::SqliteTaskRepository;
pub use types::*;
