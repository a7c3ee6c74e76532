//! Geocoding error taxonomy.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeocodeError {
    /// The resolver answered but found nothing. The only soft miss.
    #[error("{provider} API returned empty response")]
    EmptyResponse { provider: &'static str },

    #[error("{provider} API returned invalid coordinates: {detail}")]
    InvalidCoordinates {
        provider: &'static str,
        detail: String,
    },

    #[error("{provider} provider got empty address")]
    EmptyAddress { provider: &'static str },

    #[error("{provider} API unauthorized (invalid API key)")]
    Unauthorized { provider: &'static str },

    #[error("{provider} API returned status {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} API returned {status}: {message}")]
    Api {
        provider: &'static str,
        status: String,
        message: String,
    },

    #[error("failed to execute geocoding request: {0}")]
    Request(String),

    #[error("failed to decode {provider} response: {detail}")]
    Decode {
        provider: &'static str,
        detail: String,
    },

    #[error("geocoding cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GeocodeError {
    /// Whether the lookup completed without a match, as opposed to failing.
    pub fn is_soft_miss(&self) -> bool {
        matches!(self, GeocodeError::EmptyResponse { .. })
    }
}
