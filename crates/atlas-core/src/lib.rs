//! Atlas Core: task and coordinate types, error taxonomy, configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::{AtlasConfig, Environment};
pub use error::{Error, Result};
pub use types::{Coordinates, Task, TaskId};
