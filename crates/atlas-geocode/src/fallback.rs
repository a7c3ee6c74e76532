//! Progressive address simplification.
//!
//! Addresses like `"с. Грабовець, вул. Польова, 3"` often miss on free
//! geocoders because of the house number or street. Dropping trailing comma
//! segments, down to the first one, still yields a settlement-level point.

use async_trait::async_trait;
use atlas_core::Coordinates;
use tracing::{debug, info, warn};

use crate::error::GeocodeError;
use crate::provider::Provider;

/// Variations of `address` from most to least specific.
///
/// The address as given comes first. When it has several comma-separated
/// components, the trimmed components are rejoined with `", "` to form the
/// address without its last component, without its last two components, and
/// the first component alone. Blank and duplicate variations are skipped, so
/// there are at most four.
pub fn address_fallbacks(address: &str) -> Vec<String> {
    if address.trim().is_empty() {
        return Vec::new();
    }

    let mut variations: Vec<String> = Vec::with_capacity(4);
    let mut add = |candidate: String| {
        if !candidate.trim().is_empty() && !variations.contains(&candidate) {
            variations.push(candidate);
        }
    };

    add(address.to_string());

    let parts: Vec<&str> = address
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() > 1 {
        add(parts[..parts.len() - 1].join(", "));
        if parts.len() > 2 {
            add(parts[..parts.len() - 2].join(", "));
        }
        add(parts[0].to_string());
    }

    variations
}

/// Wraps a provider and retries soft misses with simpler address variations.
///
/// A hard error from the inner provider is returned immediately and no
/// further variations are tried.
pub struct FallbackProvider<P> {
    inner: P,
}

impl<P: Provider> FallbackProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: Provider> Provider for FallbackProvider<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn geocode(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        let name = self.inner.name();
        let variations = address_fallbacks(address);
        if variations.is_empty() {
            return Err(GeocodeError::EmptyAddress { provider: name });
        }

        for (level, variation) in variations.iter().enumerate() {
            debug!(
                provider = name,
                fallback_level = level,
                "Trying address variation: {}",
                variation
            );

            match self.inner.geocode(variation).await {
                Ok(coords) => {
                    if level > 0 {
                        info!(
                            provider = name,
                            fallback_level = level,
                            original = address,
                            "Geocoded using simplified address: {}",
                            variation
                        );
                    }
                    return Ok(coords);
                }
                Err(e) if e.is_soft_miss() => continue,
                Err(e) => return Err(e),
            }
        }

        warn!(
            provider = name,
            attempts = variations.len(),
            "No results for any variation of address: {}",
            address
        );
        Err(GeocodeError::EmptyResponse { provider: name })
    }
}
