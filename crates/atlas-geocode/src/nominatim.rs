//! OpenStreetMap Nominatim provider.
//!
//! Free and keyless, but weak on rural addresses with house numbers, so the
//! factory always wraps it in a [`FallbackProvider`].

use std::sync::Arc;

use async_trait::async_trait;
use atlas_core::Coordinates;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, error};

use crate::error::GeocodeError;
use crate::fallback::FallbackProvider;
use crate::http::HttpClient;
use crate::provider::Provider;

pub const NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Nominatim usage policy requires an identifying User-Agent.
pub const NOMINATIM_USER_AGENT: &str =
    "Atlas-Geocoding-Service/1.0 (https://github.com/UnknownOlympus/atlas)";

const NAME: &str = "nominatim";
const ACCEPT_LANGUAGE: &str = "uk,en";

/// Nominatim with progressive address fallbacks.
pub type NominatimProvider = FallbackProvider<NominatimClient>;

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

/// A single Nominatim search request per call, no fallbacks.
pub struct NominatimClient {
    client: Arc<dyn HttpClient>,
    base_url: String,
    user_agent: String,
}

impl NominatimClient {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            base_url: NOMINATIM_BASE_URL.to_string(),
            user_agent: NOMINATIM_USER_AGENT.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn parse_degrees(text: &str, axis: &str) -> Result<f64, GeocodeError> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| GeocodeError::InvalidCoordinates {
            provider: NAME,
            detail: format!("invalid {}: {}", axis, text),
        })
}

#[async_trait]
impl Provider for NominatimClient {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("q", address),
                ("format", "json"),
                ("limit", "1"),
                ("addressdetails", "1"),
                ("accept-language", ACCEPT_LANGUAGE),
            ],
        )
        .map_err(|e| GeocodeError::Config(format!("failed to parse base URL: {}", e)))?;

        debug!("Nominatim request URL: {}", url);

        let response = self
            .client
            .get(
                url,
                &[
                    ("User-Agent", self.user_agent.as_str()),
                    ("Accept-Language", ACCEPT_LANGUAGE),
                ],
            )
            .await?;

        if response.status != 200 {
            error!(
                "Nominatim API error: status={} body={}",
                response.status, response.body
            );
            return Err(GeocodeError::Status {
                provider: NAME,
                status: response.status,
                body: response.body,
            });
        }

        debug!("Nominatim raw response: {}", response.body);
        let places: Vec<NominatimPlace> =
            serde_json::from_str(&response.body).map_err(|e| {
                error!("Failed to parse Nominatim response: {}", e);
                GeocodeError::Decode {
                    provider: NAME,
                    detail: e.to_string(),
                }
            })?;

        let place = places
            .first()
            .ok_or(GeocodeError::EmptyResponse { provider: NAME })?;

        let lat = parse_degrees(&place.lat, "latitude")?;
        let lon = parse_degrees(&place.lon, "longitude")?;
        Coordinates::new(lat, lon).map_err(|e| GeocodeError::InvalidCoordinates {
            provider: NAME,
            detail: e.to_string(),
        })
    }
}
