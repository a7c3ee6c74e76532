//! Builds the configured provider.

use std::num::NonZeroU32;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::GeocodeError;
use crate::fallback::FallbackProvider;
use crate::google::GoogleProvider;
use crate::http::{HttpClient, ReqwestClient};
use crate::nominatim::NominatimClient;
use crate::provider::{Provider, ProviderConfig, ProviderKind};
use crate::visicom::VisicomProvider;

const DEFAULT_GOOGLE_RATE_LIMIT: u32 = 50;
const DEFAULT_VISICOM_RATE_LIMIT: u32 = 5;

/// Requests per second for a credentialed provider.
///
/// A missing or zero limit falls back to the provider default with a warning.
/// Nominatim has no request budget and always yields `None`.
pub fn effective_rate_limit(kind: ProviderKind, configured: Option<u32>) -> Option<NonZeroU32> {
    let default = match kind {
        ProviderKind::Google => DEFAULT_GOOGLE_RATE_LIMIT,
        ProviderKind::Visicom => DEFAULT_VISICOM_RATE_LIMIT,
        ProviderKind::Nominatim => return None,
    };

    match configured.and_then(NonZeroU32::new) {
        Some(limit) => Some(limit),
        None => {
            warn!(
                provider = %kind,
                value = default,
                "Rate limit not set, using default value"
            );
            NonZeroU32::new(default)
        }
    }
}

/// Build the provider described by `config` on top of a fresh reqwest client.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn Provider>, GeocodeError> {
    let client: Arc<dyn HttpClient> = Arc::new(ReqwestClient::new()?);
    create_provider_with_client(config, client)
}

/// Build the provider described by `config` using the given transport.
pub fn create_provider_with_client(
    config: &ProviderConfig,
    client: Arc<dyn HttpClient>,
) -> Result<Arc<dyn Provider>, GeocodeError> {
    let api_key = config
        .api_key
        .as_deref()
        .filter(|key| !key.trim().is_empty());

    let provider: Arc<dyn Provider> = match config.kind {
        ProviderKind::Google | ProviderKind::Visicom => {
            let Some(key) = api_key else {
                let label = match config.kind {
                    ProviderKind::Google => "Google",
                    _ => "Visicom",
                };
                return Err(GeocodeError::Config(format!(
                    "API key is required for {} provider",
                    label
                )));
            };
            let rate = effective_rate_limit(config.kind, config.rate_limit).ok_or_else(|| {
                GeocodeError::Config(format!("no rate limit for {} provider", config.kind))
            })?;

            if config.kind == ProviderKind::Google {
                Arc::new(GoogleProvider::new(client, key, rate))
            } else {
                Arc::new(VisicomProvider::new(client, key, rate))
            }
        }
        ProviderKind::Nominatim => Arc::new(FallbackProvider::new(NominatimClient::new(client))),
    };

    info!(provider = provider.name(), "Geocoding provider initialized");
    Ok(provider)
}
