//! Tracing subscriber setup, one profile per deployment environment.

use atlas_core::Environment;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogProfile {
    pub level: &'static str,
    pub json: bool,
    pub timestamps: bool,
    pub source_location: bool,
}

pub fn profile(env: Environment) -> LogProfile {
    match env {
        Environment::Local => LogProfile {
            level: "debug",
            json: false,
            timestamps: true,
            source_location: true,
        },
        Environment::Development => LogProfile {
            level: "info",
            json: true,
            timestamps: true,
            source_location: false,
        },
        Environment::Production => LogProfile {
            level: "warn",
            json: true,
            timestamps: false,
            source_location: false,
        },
        Environment::Unknown => LogProfile {
            level: "error",
            json: true,
            timestamps: false,
            source_location: false,
        },
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the profile level.
pub fn init(env: Environment) {
    let p = profile(env);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(p.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(p.source_location)
        .with_line_number(p.source_location);

    match (p.json, p.timestamps) {
        (true, true) => builder.json().init(),
        (true, false) => builder.json().without_time().init(),
        (false, true) => builder.init(),
        (false, false) => builder.without_time().init(),
    }

    if env == Environment::Unknown {
        error!(
            available_envs = "local, development, production",
            "The env parameter was not specified or was invalid. Logging will be minimal, by default."
        );
    }
}
