//! Provider trait and configuration.

use std::str::FromStr;

use async_trait::async_trait;
use atlas_core::Coordinates;
use serde::{Deserialize, Serialize};

use crate::error::GeocodeError;

/// Resolves an address to coordinates.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short stable name, used as a metrics label.
    fn name(&self) -> &'static str;

    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError>;
}

/// Geocoding backend identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Visicom,
    Nominatim,
}

impl ProviderKind {
    /// Whether the backend refuses to work without an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderKind::Google | ProviderKind::Visicom)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Google => write!(f, "google"),
            ProviderKind::Visicom => write!(f, "visicom"),
            ProviderKind::Nominatim => write!(f, "nominatim"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = GeocodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(ProviderKind::Google),
            "visicom" => Ok(ProviderKind::Visicom),
            "nominatim" => Ok(ProviderKind::Nominatim),
            other => Err(GeocodeError::Config(format!(
                "unsupported provider type: {}",
                other
            ))),
        }
    }
}

/// Everything the factory needs to build a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    /// Requests per second for the whole process. `None` or `0` means "use the default".
    pub rate_limit: Option<u32>,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            api_key: None,
            rate_limit: None,
        }
    }

    /// Build from raw settings, rejecting unknown provider tags.
    pub fn from_settings(
        provider_type: &str,
        api_key: Option<String>,
        rate_limit: Option<u32>,
    ) -> Result<Self, GeocodeError> {
        Ok(Self {
            kind: provider_type.parse()?,
            api_key,
            rate_limit,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: u32) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }
}
