//! Atlas Geocode: address to coordinates resolution.
//!
//! Every backend implements the one-method [`Provider`] trait. Credentialed
//! backends (Google, Visicom) issue a single rate-limited request per lookup.
//! The free Nominatim backend is wrapped in [`FallbackProvider`], which retries
//! progressively shorter versions of the address on empty results.
//! [`create_provider`] picks and configures the backend from a [`ProviderConfig`].

pub mod budget;
pub mod error;
pub mod factory;
pub mod fallback;
pub mod google;
pub mod http;
pub mod nominatim;
pub mod provider;
pub mod visicom;

pub use budget::RequestBudget;
pub use error::GeocodeError;
pub use factory::{create_provider, create_provider_with_client, effective_rate_limit};
pub use fallback::{address_fallbacks, FallbackProvider};
pub use google::GoogleProvider;
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use nominatim::{NominatimClient, NominatimProvider};
pub use provider::{Provider, ProviderConfig, ProviderKind};
pub use visicom::VisicomProvider;
