//! Process configuration loaded from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_HEALTH_PORT: u16 = 8080;
pub const DEFAULT_WORKERS: usize = 10;
pub const DEFAULT_INTERVAL: &str = "10m";
pub const DEFAULT_PROVIDER: &str = "google";
pub const DEFAULT_DB_PATH: &str = "data/atlas.db";

/// Deployment environment. Selects the logging profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Development,
    Production,
    /// Unrecognized value; logging falls back to a minimal profile.
    Unknown,
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "local" => Environment::Local,
            "development" => Environment::Development,
            "production" => Environment::Production,
            _ => Environment::Unknown,
        })
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Local => write!(f, "local"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
            Environment::Unknown => write!(f, "unknown"),
        }
    }
}

/// Top-level Atlas configuration.
#[derive(Debug, Clone)]
pub struct AtlasConfig {
    pub env: Environment,
    /// Monitoring server port (`/healthz`, `/metrics`).
    pub health_port: u16,
    /// Provider kind tag (`google`, `visicom`, `nominatim`). Validated by the provider factory.
    pub provider_type: String,
    pub provider_key: Option<String>,
    /// Provider-wide request budget per second. `None` lets the factory pick a default.
    pub provider_rate_limit: Option<u32>,
    pub workers: usize,
    pub interval: Duration,
    /// Prepended to every address before geocoding.
    pub address_prefix: String,
    pub db_path: PathBuf,
}

impl AtlasConfig {
    /// Create configuration from the process environment and defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let health_port = var("ATLAS_HEALTH_PORT", &DEFAULT_HEALTH_PORT.to_string())
            .parse::<u16>()
            .map_err(|e| Error::Config(format!("ATLAS_HEALTH_PORT: {}", e)))?;

        let workers = var("ATLAS_WORKERS", &DEFAULT_WORKERS.to_string())
            .parse::<usize>()
            .map_err(|e| Error::Config(format!("ATLAS_WORKERS must be an integer: {}", e)))?;
        if workers == 0 {
            return Err(Error::Config("ATLAS_WORKERS must be at least 1".into()));
        }

        let interval = parse_duration(&var("ATLAS_INTERVAL", DEFAULT_INTERVAL))
            .map_err(|e| Error::Config(format!("ATLAS_INTERVAL: {}", e)))?;

        let provider_rate_limit = match lookup("ATLAS_PROVIDER_RATE_LIMIT") {
            Some(raw) if !raw.trim().is_empty() => Some(raw.trim().parse::<u32>().map_err(|e| {
                Error::Config(format!("ATLAS_PROVIDER_RATE_LIMIT: {}", e))
            })?),
            _ => None,
        };

        let env = var("ATLAS_ENV", "production")
            .parse()
            .unwrap_or(Environment::Unknown);

        Ok(Self {
            env,
            health_port,
            provider_type: var("ATLAS_PROVIDER_TYPE", DEFAULT_PROVIDER),
            provider_key: lookup("ATLAS_PROVIDER_KEY").filter(|k| !k.is_empty()),
            provider_rate_limit,
            workers,
            interval,
            address_prefix: var("ATLAS_ADDRESS_PREFIX", ""),
            db_path: PathBuf::from(var("ATLAS_DB_PATH", DEFAULT_DB_PATH)),
        })
    }
}

/// Parse a positive duration such as `10m`, `30s`, `1h30m` or `250ms`.
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let duration =
        humantime::parse_duration(input.trim()).map_err(|e| format!("{:?}: {}", input, e))?;
    if duration.is_zero() {
        return Err(format!("duration {:?} must be positive", input));
    }
    Ok(duration)
}
