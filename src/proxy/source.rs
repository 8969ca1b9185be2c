//! Proxy pool bootstrap
//!
//! Fetches the raw endpoint list once at startup. This is the only network
//! call the rotation layer makes and it stays out of the request hooks.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{info, instrument, warn};

use crate::error::{Result, RotaError};
use crate::models::Endpoint;

/// Where the endpoint list comes from
#[async_trait]
pub trait EndpointSource: Send + Sync {
    /// Fetch the full endpoint list
    async fn fetch(&self) -> Result<Vec<Endpoint>>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Parse a newline separated pool listing
///
/// Blank lines and surrounding whitespace are ignored. Lines that cannot be
/// carried in a header are skipped with a warning.
pub fn parse_pool_body(body: &str) -> Vec<Endpoint> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match Endpoint::parse(line) {
            Ok(endpoint) => Some(endpoint),
            Err(e) => {
                warn!("Skipping unusable pool entry: {}", e);
                None
            }
        })
        .collect()
}

/// Endpoint list held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticEndpointSource {
    endpoints: Vec<Endpoint>,
}

impl StaticEndpointSource {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self { endpoints }
    }

    /// Build from raw strings, validating each one
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self> {
        let endpoints = raw
            .iter()
            .map(|s| Endpoint::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { endpoints })
    }
}

#[async_trait]
impl EndpointSource for StaticEndpointSource {
    async fn fetch(&self) -> Result<Vec<Endpoint>> {
        Ok(self.endpoints.clone())
    }

    fn describe(&self) -> String {
        format!("static list ({} endpoints)", self.endpoints.len())
    }
}

/// Pool provider reached with a single HTTP GET
pub struct HttpEndpointSource {
    url: String,
    client: reqwest::Client,
}

impl HttpEndpointSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        url::Url::parse(&url)?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RotaError::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn unreachable(&self, err: reqwest::Error) -> RotaError {
        RotaError::PoolUnreachable {
            url: self.url.clone(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl EndpointSource for HttpEndpointSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<Endpoint>> {
        info!("Fetching proxy pool");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(RotaError::PoolFetchFailed {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| self.unreachable(e))?;
        let endpoints = parse_pool_body(&body);
        info!("Using {} proxy endpoints", endpoints.len());

        Ok(endpoints)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
