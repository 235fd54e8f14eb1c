//! Rendering proxy fetcher
//!
//! The proxy fetches the page server-side and answers with rendered text.
//! One attempt, no cookies from the origin leg, its own timeout.

use super::{read_excerpt, EXCERPT_CHARS};
use crate::client::{FetchOptions, DEFAULT_PROXY_ENDPOINT, DEFAULT_PROXY_TIMEOUT};
use crate::error::ProxyError;
use crate::headers::proxy_headers;
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Fetches pre-rendered text for a page through a rendering proxy
#[derive(Debug, Clone)]
pub struct ProxyFetcher {
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl Default for ProxyFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_PROXY_ENDPOINT, None, DEFAULT_PROXY_TIMEOUT)
    }
}

impl ProxyFetcher {
    /// Create a proxy fetcher
    ///
    /// `endpoint` is the base the target address is appended to.
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let mut endpoint = endpoint.into();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        Self {
            endpoint,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            timeout,
        }
    }

    /// Create a proxy fetcher from retrieval options
    pub fn from_options(options: &FetchOptions) -> Self {
        Self::new(
            options.proxy_endpoint.clone(),
            options.proxy_api_key.clone(),
            options.proxy_timeout,
        )
    }

    /// Address of the proxied page: endpoint followed by the full target
    pub fn proxy_url(&self, target: &Url) -> String {
        format!("{}{}", self.endpoint, target)
    }

    /// Whether requests carry a bearer credential
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fetch the rendered page; the body is returned verbatim
    pub async fn fetch(&self, target: &Url) -> Result<Bytes, ProxyError> {
        let client = reqwest::Client::builder()
            .default_headers(proxy_headers(self.api_key.as_deref()))
            .timeout(self.timeout)
            .build()
            .map_err(|e| ProxyError::Request(format!("failed to create HTTP client: {e}")))?;

        let url = self.proxy_url(target);
        debug!(url = %url, authenticated = self.has_api_key(), "Requesting rendering proxy");

        let response = client
            .get(&url)
            .send()
            .await
            .map_err(ProxyError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let detail = read_excerpt(response, EXCERPT_CHARS).await;
            return Err(ProxyError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        response.bytes().await.map_err(ProxyError::from_reqwest)
    }
}
