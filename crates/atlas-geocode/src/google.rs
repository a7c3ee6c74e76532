//! Google Maps Geocoding API provider.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use atlas_core::Coordinates;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::budget::RequestBudget;
use crate::error::GeocodeError;
use crate::http::HttpClient;
use crate::provider::Provider;

pub const GOOGLE_BASE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

const NAME: &str = "google";

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    geometry: GoogleGeometry,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLocation,
}

#[derive(Debug, Deserialize)]
struct GoogleLocation {
    lat: f64,
    lng: f64,
}

/// One rate-limited request per lookup; the first result wins.
pub struct GoogleProvider {
    client: Arc<dyn HttpClient>,
    base_url: String,
    api_key: String,
    budget: RequestBudget,
}

impl GoogleProvider {
    pub fn new(client: Arc<dyn HttpClient>, api_key: impl Into<String>, rate_limit: NonZeroU32) -> Self {
        Self {
            client,
            base_url: GOOGLE_BASE_URL.to_string(),
            api_key: api_key.into(),
            budget: RequestBudget::per_second(rate_limit),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn rate_limit(&self) -> u32 {
        self.budget.rate()
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        self.budget.acquire().await;
        debug!("Geocoding using Google Maps: {}", address);

        let url = Url::parse_with_params(
            &self.base_url,
            &[("address", address), ("key", self.api_key.as_str())],
        )
        .map_err(|e| GeocodeError::Config(format!("failed to parse base URL: {}", e)))?;

        let response = self.client.get(url, &[("Accept", "application/json")]).await?;
        if response.status != 200 {
            return Err(GeocodeError::Status {
                provider: NAME,
                status: response.status,
                body: response.body,
            });
        }

        let parsed: GoogleResponse =
            serde_json::from_str(&response.body).map_err(|e| GeocodeError::Decode {
                provider: NAME,
                detail: e.to_string(),
            })?;

        match parsed.status.as_str() {
            "OK" | "ZERO_RESULTS" => {}
            "REQUEST_DENIED" => return Err(GeocodeError::Unauthorized { provider: NAME }),
            _ => {
                return Err(GeocodeError::Api {
                    provider: NAME,
                    status: parsed.status,
                    message: parsed.error_message.unwrap_or_default(),
                })
            }
        }

        let location = match parsed.results.first() {
            Some(result) => &result.geometry.location,
            None => return Err(GeocodeError::EmptyResponse { provider: NAME }),
        };

        Coordinates::new(location.lat, location.lng).map_err(|e| GeocodeError::InvalidCoordinates {
            provider: NAME,
            detail: e.to_string(),
        })
    }
}
