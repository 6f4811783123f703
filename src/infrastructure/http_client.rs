//! HTTP client for chart APIs
//!
//! Thin wrapper over `reqwest` that applies a rotated identity to every
//! request and reports every failure mode as a typed [`FetchError`].

use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::domain::SourceKind;
use crate::infrastructure::config::{HarvestConfig, defaults};
use crate::infrastructure::identity::IdentityRotator;

/// Why a page could not be fetched
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid request url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("response body is not valid JSON: {0}")]
    Decode(String),

    #[error("API returned code {code}")]
    ApiCode { code: i64 },

    #[error("unexpected payload shape: {0}")]
    UnexpectedShape(String),
}

/// Configuration for HTTP client behavior
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Overall request timeout
    pub timeout: Duration,
    /// Whether to keep cookies between requests of a run
    pub cookie_store: bool,
}

impl HttpClientConfig {
    pub fn from_harvest_config(config: &HarvestConfig) -> Self {
        Self {
            timeout: config.request_timeout(),
            ..Self::default()
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(defaults::REQUEST_TIMEOUT_SECONDS),
            cookie_store: true,
        }
    }
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    identities: Arc<IdentityRotator>,
}

impl HttpClient {
    pub fn with_config(
        config: &HttpClientConfig,
        identities: Arc<IdentityRotator>,
    ) -> Result<Self, FetchError> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .cookie_store(config.cookie_store)
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self { client, identities })
    }

    /// GETs `endpoint` with `query` and decodes the body as JSON.
    ///
    /// Non-2xx statuses and undecodable bodies are errors; interpreting the
    /// JSON is left to the caller.
    pub async fn get_json(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        kind: SourceKind,
    ) -> Result<Value, FetchError> {
        let url = Url::parse_with_params(endpoint, query)?;
        debug!(%url, source = %kind, "GET");

        let response = self
            .client
            .get(url.clone())
            .headers(self.identities.headers_for(kind))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}
