//! Origin fetcher
//!
//! Warm-up request to the site root, then the document request, both
//! through one cookie jar and under one deadline.

use super::{CHALLENGE_VENDORS, DEFENSIVE_STATUSES};
use crate::client::FetchOptions;
use crate::error::{DefenseReason, FetchError};
use crate::headers::{browser_headers, BROWSER_USER_AGENT};
use crate::target::origin_root;
use crate::types::FetchOutcome;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, CONTENT_TYPE, SERVER};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};
use url::Url;

/// What the origin answered to the document request
#[derive(Debug)]
pub enum OriginResponse {
    /// 2xx with its body
    Document(FetchOutcome),
    /// Anti-automation response; the body is not worth keeping
    Defended(DefenseReason),
}

/// Fetches a page from its origin the way a desktop browser would
#[derive(Debug, Clone)]
pub struct OriginFetcher {
    user_agent: String,
    timeout: Duration,
}

impl OriginFetcher {
    /// Create an origin fetcher
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.into(),
            timeout,
        }
    }

    /// Create an origin fetcher from retrieval options
    pub fn from_options(options: &FetchOptions) -> Self {
        Self::new(
            options
                .user_agent
                .clone()
                .unwrap_or_else(|| BROWSER_USER_AGENT.to_string()),
            options.timeout,
        )
    }

    /// Fetch `target`, sharing one deadline between warm-up and document
    pub async fn fetch(&self, target: &Url) -> Result<OriginResponse, FetchError> {
        let deadline = Instant::now() + self.timeout;
        let session = Session::new()?;

        session.warm_up(target, &self.user_agent, deadline).await;

        let response = timeout_at(
            deadline,
            session
                .client
                .get(target.as_str())
                .headers(browser_headers(&self.user_agent, true))
                .send(),
        )
        .await
        .map_err(|_| self.deadline_exceeded())?
        .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        debug!(url = %target, status = status.as_u16(), "Origin responded");

        if let Some(reason) = classify_defense(status.as_u16(), response.headers()) {
            warn!(url = %target, %reason, "Origin refused automated access");
            return Ok(OriginResponse::Defended(reason));
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = timeout_at(deadline, response.bytes())
            .await
            .map_err(|_| self.deadline_exceeded())?
            .map_err(FetchError::from_reqwest)?;

        Ok(OriginResponse::Document(FetchOutcome::markup(
            body,
            content_type,
        )))
    }

    fn deadline_exceeded(&self) -> FetchError {
        FetchError::Network(format!(
            "operation timed out after {}s",
            self.timeout.as_secs_f64()
        ))
    }
}

/// Classify a response as defensive from its status and `Server` header
pub fn classify_defense(status: u16, headers: &HeaderMap) -> Option<DefenseReason> {
    if !DEFENSIVE_STATUSES.contains(&status) {
        return None;
    }

    let server = headers
        .get(SERVER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let reason = match CHALLENGE_VENDORS
        .iter()
        .copied()
        .find(|vendor| server.contains(*vendor))
    {
        Some(vendor) => DefenseReason::Challenge { status, vendor },
        None => DefenseReason::Status(status),
    };
    Some(reason)
}

/// Cookie-backed client for exactly one retrieval
struct Session {
    client: reqwest::Client,
    jar: Arc<Jar>,
}

impl Session {
    fn new() -> Result<Self, FetchError> {
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(FetchError::ClientBuildError)?;
        Ok(Self { client, jar })
    }

    /// Best-effort request to the origin root so it can set cookies
    ///
    /// Every failure is swallowed.
    async fn warm_up(&self, target: &Url, user_agent: &str, deadline: Instant) {
        let root = origin_root(target);
        let request = self
            .client
            .get(root.as_str())
            .headers(browser_headers(user_agent, false));

        let result = timeout_at(deadline, async {
            let response = request.send().await?;
            let status = response.status();
            response.bytes().await?;
            Ok::<_, reqwest::Error>(status)
        })
        .await;

        match result {
            Ok(Ok(status)) => debug!(
                url = %root,
                status = status.as_u16(),
                cookies = self.jar.cookies(target).is_some(),
                "Warm-up finished"
            ),
            Ok(Err(err)) => debug!(url = %root, error = %err, "Warm-up failed, continuing"),
            Err(_) => debug!(url = %root, "Warm-up ran out of time, continuing"),
        }
    }
}
