//! Error types for url2md

use std::fmt;
use thiserror::Error;

/// Why the origin's response was treated as an anti-automation defense
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefenseReason {
    /// A known bot-mitigation vendor answered with a defensive status
    Challenge {
        /// HTTP status returned by the origin
        status: u16,
        /// Vendor token found in the `Server` header
        vendor: &'static str,
    },
    /// Defensive status without any vendor signal
    Status(u16),
}

impl DefenseReason {
    /// HTTP status that triggered the classification
    pub fn status(&self) -> u16 {
        match self {
            DefenseReason::Challenge { status, .. } => *status,
            DefenseReason::Status(status) => *status,
        }
    }
}

impl fmt::Display for DefenseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefenseReason::Challenge { status, vendor } => {
                write!(f, "challenge detected ({vendor}, status {status})")
            }
            DefenseReason::Status(status) => write!(f, "defensive status code {status}"),
        }
    }
}

/// Errors from the rendering proxy leg
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Transport failure talking to the proxy
    #[error("proxy request failed: {0}")]
    Request(String),

    /// Proxy answered with a non-2xx status
    #[error("proxy request status {status}{}", format_detail(.detail))]
    Status {
        /// HTTP status from the proxy
        status: u16,
        /// Leading excerpt of the response body, possibly empty
        detail: String,
    },
}

fn format_detail(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {detail}")
    }
}

/// Errors that can occur while retrieving and converting a page
#[derive(Debug, Error)]
pub enum FetchError {
    /// Input could not be turned into an address with a host
    #[error("invalid url: {0}")]
    InvalidTarget(String),

    /// Failed to build HTTP client
    #[error("failed to create HTTP client")]
    ClientBuildError(#[source] reqwest::Error),

    /// Transport failure or deadline expiry on the origin request
    #[error("request failed: {0}")]
    Network(String),

    /// Origin answered with a non-2xx status that is not a defensive one
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// Defensive response and the proxy fallback failed as well
    #[error("{reason} and proxy fallback failed: {source}")]
    Blocked {
        /// Classification of the origin response
        reason: DefenseReason,
        /// What went wrong on the proxy leg
        #[source]
        source: ProxyError,
    },

    /// Markup could not be converted to Markdown
    #[error("failed to convert markup: {0}")]
    Conversion(String),
}

impl FetchError {
    /// Create an error from a reqwest error on the origin path
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Network("request timed out".to_string())
        } else if err.is_connect() {
            FetchError::Network(format!("failed to connect to server: {err}"))
        } else {
            FetchError::Network(err.to_string())
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            FetchError::InvalidTarget(_) => 2,
            _ => 1,
        }
    }
}

impl ProxyError {
    /// Create an error from a reqwest error on the proxy path
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProxyError::Request("request timed out".to_string())
        } else {
            ProxyError::Request(err.to_string())
        }
    }
}
