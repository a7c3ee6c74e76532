//! Visicom Data API provider.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use atlas_core::Coordinates;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::budget::RequestBudget;
use crate::error::GeocodeError;
use crate::http::HttpClient;
use crate::provider::Provider;

pub const VISICOM_BASE_URL: &str = "https://api.visicom.ua/data-api/5.0/uk/geocode.json";

const NAME: &str = "visicom";

// Only the centroid matters; coordinates are `[lon, lat]`.
#[derive(Debug, Default, Deserialize)]
struct VisicomResponse {
    #[serde(default)]
    geo_centroid: Option<VisicomPoint>,
}

#[derive(Debug, Default, Deserialize)]
struct VisicomPoint {
    #[serde(default)]
    coordinates: Vec<f64>,
}

pub struct VisicomProvider {
    client: Arc<dyn HttpClient>,
    base_url: String,
    api_key: String,
    budget: RequestBudget,
}

impl VisicomProvider {
    pub fn new(client: Arc<dyn HttpClient>, api_key: impl Into<String>, rate_limit: NonZeroU32) -> Self {
        Self {
            client,
            base_url: VISICOM_BASE_URL.to_string(),
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
impl Provider for VisicomProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        if address.trim().is_empty() {
            return Err(GeocodeError::EmptyAddress { provider: NAME });
        }

        self.budget.acquire().await;
        debug!("Geocoding using Visicom: {}", address);

        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("text", address),
                ("limit", "1"),
                ("key", self.api_key.as_str()),
            ],
        )
        .map_err(|e| GeocodeError::Config(format!("failed to parse base URL: {}", e)))?;

        let response = self.client.get(url, &[("Accept", "application/json")]).await?;
        match response.status {
            200 => {}
            401 | 403 => return Err(GeocodeError::Unauthorized { provider: NAME }),
            status => {
                error!("Visicom API error: status={} body={}", status, response.body);
                return Err(GeocodeError::Status {
                    provider: NAME,
                    status,
                    body: response.body,
                });
            }
        }

        debug!("Visicom raw response: {}", response.body);
        let parsed: VisicomResponse =
            serde_json::from_str(&response.body).map_err(|e| GeocodeError::Decode {
                provider: NAME,
                detail: e.to_string(),
            })?;

        let coords = parsed.geo_centroid.unwrap_or_default().coordinates;
        let (lon, lat) = match coords.as_slice() {
            [] => return Err(GeocodeError::EmptyResponse { provider: NAME }),
            [lon, lat] => (*lon, *lat),
            other => {
                return Err(GeocodeError::InvalidCoordinates {
                    provider: NAME,
                    detail: format!("expected [lon, lat], got {} values", other.len()),
                })
            }
        };

        info!("Visicom found result for {}: lat={} lon={}", address, lat, lon);
        Coordinates::new(lat, lon).map_err(|e| GeocodeError::InvalidCoordinates {
            provider: NAME,
            detail: e.to_string(),
        })
    }
}
