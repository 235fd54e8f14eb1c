//! Retrieval configuration
//!
//! [`FetchOptions`] carries every knob of a retrieval. The library never
//! reads the process environment; callers pass credentials in explicitly.

use std::time::Duration;

/// Rendering proxy used when the origin blocks automated clients
pub const DEFAULT_PROXY_ENDPOINT: &str = "https://r.jina.ai/";

/// Budget shared by the warm-up and main origin requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

/// Budget of the proxy leg, counted separately from the origin budget
pub const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(60);

/// Options for one retrieval
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Deadline for warm-up plus main request
    pub timeout: Duration,
    /// Custom User-Agent for origin requests
    pub user_agent: Option<String>,
    /// Fall back to the rendering proxy on defensive responses
    pub fallback: bool,
    /// Base address the target is appended to
    pub proxy_endpoint: String,
    /// Bearer credential for the proxy
    pub proxy_api_key: Option<String>,
    /// Timeout of the proxy request
    pub proxy_timeout: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            fallback: true,
            proxy_endpoint: DEFAULT_PROXY_ENDPOINT.to_string(),
            proxy_api_key: None,
            proxy_timeout: DEFAULT_PROXY_TIMEOUT,
        }
    }
}
