//! HTTP transport used by the providers.
//!
//! Providers only need "GET this URL with these headers"; putting that behind
//! a trait lets tests script responses and count outbound calls.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::error::GeocodeError;

/// Outbound request timeout for the production client.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Status and fully read body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: Url, headers: &[(&str, &str)]) -> Result<HttpResponse, GeocodeError>;
}

/// [`HttpClient`] backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GeocodeError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: Url, headers: &[(&str, &str)]) -> Result<HttpResponse, GeocodeError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GeocodeError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GeocodeError::Request(format!("failed to read response body: {}", e)))?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for provider tests.

    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;

    /// A request as seen by [`ScriptedHttp`].
    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub url: Url,
        pub headers: Vec<(String, String)>,
    }

    impl Recorded {
        pub fn query(&self, key: &str) -> Option<String> {
            self.url
                .query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
        }

        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    /// Replays queued responses in order and records every request.
    #[derive(Default)]
    pub struct ScriptedHttp {
        responses: Mutex<VecDeque<Result<HttpResponse, GeocodeError>>>,
        requests: Mutex<Vec<Recorded>>,
    }

    impl ScriptedHttp {
        pub fn new(responses: Vec<Result<HttpResponse, GeocodeError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().clone()
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedHttp {
        async fn get(
            &self,
            url: Url,
            headers: &[(&str, &str)],
        ) -> Result<HttpResponse, GeocodeError> {
            self.requests.lock().push(Recorded {
                url,
                headers: headers
                    .iter()
                    .map(|(n, v)| (n.to_string(), v.to_string()))
                    .collect(),
            });
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(GeocodeError::Request("no scripted response left".into())))
        }
    }
}
