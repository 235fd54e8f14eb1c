//! Retriever builder and orchestration
//!
//! Resolve the input, fetch from the origin, fall back to the rendering
//! proxy on a defensive response, then convert markup to Markdown.

use crate::client::FetchOptions;
use crate::convert::markup_to_markdown;
use crate::error::FetchError;
use crate::fetchers::{OriginFetcher, OriginResponse, ProxyFetcher};
use crate::target::resolve_target;
use crate::types::{ContentKind, Document, FetchOutcome, Phase};
use bytes::Bytes;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Builder for configuring a [`Retriever`]
#[derive(Debug, Clone, Default)]
pub struct RetrieverBuilder {
    options: FetchOptions,
}

impl RetrieverBuilder {
    /// Create a new builder with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline shared by the warm-up and main origin requests
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Set custom User-Agent for origin requests
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.options.user_agent = Some(ua.into());
        self
    }

    /// Enable or disable the rendering proxy fallback
    pub fn fallback(mut self, enable: bool) -> Self {
        self.options.fallback = enable;
        self
    }

    /// Set the rendering proxy endpoint
    pub fn proxy_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.options.proxy_endpoint = endpoint.into();
        self
    }

    /// Set the bearer credential for the rendering proxy
    pub fn proxy_api_key(mut self, key: Option<String>) -> Self {
        self.options.proxy_api_key = key;
        self
    }

    /// Set the timeout of the proxy request
    pub fn proxy_timeout(mut self, timeout: Duration) -> Self {
        self.options.proxy_timeout = timeout;
        self
    }

    /// Build the retriever
    pub fn build(self) -> Retriever {
        Retriever {
            origin: OriginFetcher::from_options(&self.options),
            proxy: self
                .options
                .fallback
                .then(|| ProxyFetcher::from_options(&self.options)),
            options: self.options,
        }
    }
}

/// Configured page retriever
#[derive(Debug, Clone)]
pub struct Retriever {
    options: FetchOptions,
    origin: OriginFetcher,
    proxy: Option<ProxyFetcher>,
}

impl Default for Retriever {
    fn default() -> Self {
        RetrieverBuilder::new().build()
    }
}

impl Retriever {
    /// Create a new retriever builder
    pub fn builder() -> RetrieverBuilder {
        RetrieverBuilder::new()
    }

    /// Options this retriever was built with
    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Retrieve the page named by `raw` as a Markdown document
    pub async fn retrieve(&self, raw: &str) -> Result<Document, FetchError> {
        self.retrieve_with_status(raw, |_| {}).await
    }

    /// Retrieve with phase updates
    pub async fn retrieve_with_status<F>(
        &self,
        raw: &str,
        mut status_callback: F,
    ) -> Result<Document, FetchError>
    where
        F: FnMut(Phase),
    {
        status_callback(Phase::Resolving);
        let url = resolve_target(raw)?;

        info!("Fetching {} …", url);
        let outcome = self.fetch_with_status(&url, &mut status_callback).await?;

        if outcome.kind == ContentKind::RawMarkup {
            status_callback(Phase::Converting);
        }
        let content = render(&outcome, &url)?;

        status_callback(Phase::Done);
        Ok(Document {
            url,
            kind: outcome.kind,
            content,
            fallback_reason: outcome.fallback_reason,
        })
    }

    /// Fetch a resolved address, falling back to the proxy when defended
    pub async fn fetch(&self, url: &Url) -> Result<FetchOutcome, FetchError> {
        self.fetch_with_status(url, &mut |_| {}).await
    }

    async fn fetch_with_status<F>(
        &self,
        url: &Url,
        status_callback: &mut F,
    ) -> Result<FetchOutcome, FetchError>
    where
        F: FnMut(Phase),
    {
        status_callback(Phase::Fetching);
        let reason = match self.origin.fetch(url).await? {
            OriginResponse::Document(outcome) => return Ok(outcome),
            OriginResponse::Defended(reason) => reason,
        };

        let Some(proxy) = &self.proxy else {
            return Err(FetchError::HttpStatus(reason.status()));
        };

        status_callback(Phase::FallingBack);
        match proxy.fetch(url).await {
            Ok(body) => {
                info!("{}, fetched content via proxy", reason);
                Ok(FetchOutcome::pre_rendered(body, reason))
            }
            Err(source) => {
                warn!("{}, proxy fallback failed: {}", reason, source);
                Err(FetchError::Blocked { reason, source })
            }
        }
    }
}

/// Turn a fetch outcome into the bytes to store
///
/// Markup goes through the converter with `base` as link context;
/// pre-rendered bodies are returned byte for byte.
pub fn render(outcome: &FetchOutcome, base: &Url) -> Result<Bytes, FetchError> {
    match outcome.kind {
        ContentKind::RawMarkup => {
            info!("Converting HTML to Markdown");
            markup_to_markdown(&outcome.body, outcome.content_type.as_deref(), base)
                .map(Bytes::from)
        }
        ContentKind::PreRendered => {
            info!("Using preformatted Markdown response");
            Ok(outcome.body.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DefenseReason;

    #[test]
    fn test_retriever_builder() {
        let retriever = Retriever::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("TestAgent/1.0")
            .proxy_endpoint("http://localhost:9000/")
            .proxy_api_key(Some("key".to_string()))
            .proxy_timeout(Duration::from_secs(20))
            .build();

        let options = retriever.options();
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert_eq!(options.user_agent, Some("TestAgent/1.0".to_string()));
        assert_eq!(options.proxy_endpoint, "http://localhost:9000/");
        assert_eq!(options.proxy_api_key, Some("key".to_string()));
        assert_eq!(options.proxy_timeout, Duration::from_secs(20));
        assert!(retriever.proxy.is_some());
    }

    #[test]
    fn test_fallback_disabled_has_no_proxy() {
        let retriever = Retriever::builder().fallback(false).build();
        assert!(retriever.proxy.is_none());
        assert!(!retriever.options().fallback);
    }

    #[test]
    fn test_render_pre_rendered_is_verbatim() {
        let body = "Title: Page\n\n<b>kept as is</b>\n\n\n\n";
        let outcome = FetchOutcome::pre_rendered(
            Bytes::from(body.as_bytes().to_vec()),
            DefenseReason::Status(403),
        );
        let base = Url::parse("https://example.com/").unwrap();
        assert_eq!(render(&outcome, &base).unwrap(), body);
    }

    #[test]
    fn test_render_pre_rendered_keeps_invalid_utf8() {
        let body: &[u8] = &[84, 105, 233, 116, 101, 10];
        let outcome =
            FetchOutcome::pre_rendered(Bytes::copy_from_slice(body), DefenseReason::Status(503));
        let base = Url::parse("https://example.com/").unwrap();
        assert_eq!(render(&outcome, &base).unwrap(), body);
    }

    #[test]
    fn test_render_markup_is_converted() {
        let outcome = FetchOutcome::markup(
            Bytes::from_static(b"<h1>Title</h1><a href=\"/x\">x</a>"),
            Some("text/html".to_string()),
        );
        let base = Url::parse("https://example.com/docs/").unwrap();
        let rendered = render(&outcome, &base).unwrap();
        let markdown = String::from_utf8_lossy(&rendered);
        assert!(markdown.starts_with("# Title"));
        assert!(markdown.contains("[x](https://example.com/x)"));
    }

    #[tokio::test]
    async fn test_invalid_target_reports_resolving_only() {
        let retriever = Retriever::default();
        let mut phases = Vec::new();
        let result = retriever
            .retrieve_with_status("https://", |phase| phases.push(phase))
            .await;
        assert!(matches!(result, Err(FetchError::InvalidTarget(_))));
        assert_eq!(phases, vec![Phase::Resolving]);
    }
}
