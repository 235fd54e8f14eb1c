//! Core types for url2md

use crate::error::DefenseReason;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use url::Url;

/// What the fetched payload is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Origin markup that still needs conversion
    RawMarkup,
    /// Text already rendered by the proxy, stored verbatim
    PreRendered,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::RawMarkup => write!(f, "raw_markup"),
            ContentKind::PreRendered => write!(f, "pre_rendered"),
        }
    }
}

/// Successful result of the fetch stage
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Full response body
    pub body: Bytes,
    /// How the body must be treated downstream
    pub kind: ContentKind,
    /// Content-Type of the response that produced the body
    pub content_type: Option<String>,
    /// Set when the origin defended itself and the proxy served the page
    pub fallback_reason: Option<DefenseReason>,
}

impl FetchOutcome {
    /// Body of a 2xx origin response
    pub fn markup(body: Bytes, content_type: Option<String>) -> Self {
        Self {
            body,
            kind: ContentKind::RawMarkup,
            content_type,
            fallback_reason: None,
        }
    }

    /// Body served by the rendering proxy after a defensive origin response
    pub fn pre_rendered(body: Bytes, reason: DefenseReason) -> Self {
        Self {
            body,
            kind: ContentKind::PreRendered,
            content_type: None,
            fallback_reason: Some(reason),
        }
    }
}

/// Stage of a retrieval, reported through status callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Parsing the user input
    Resolving,
    /// Warm-up and main request against the origin
    Fetching,
    /// Origin defended itself, asking the rendering proxy
    FallingBack,
    /// Turning markup into Markdown
    Converting,
    /// Document ready
    Done,
}

/// Final Markdown document for one address
#[derive(Debug, Clone)]
pub struct Document {
    /// Resolved address
    pub url: Url,
    /// Where the text came from
    pub kind: ContentKind,
    /// Exact bytes to store: converted Markdown, or the proxy body as received
    pub content: Bytes,
    /// Why the proxy was used, if it was
    pub fallback_reason: Option<DefenseReason>,
}

impl Document {
    /// Stored content as text; invalid UTF-8 is replaced, `content` is not
    pub fn markdown(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    /// Summary of this document once written to `file`
    pub fn report(&self, file: impl Into<String>) -> Report {
        Report {
            url: self.url.to_string(),
            file: file.into(),
            kind: self.kind,
            bytes: self.content.len() as u64,
            fallback_reason: self.fallback_reason.as_ref().map(ToString::to_string),
        }
    }
}

/// Machine-readable summary of a retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Resolved address
    pub url: String,
    /// Where the document was written
    pub file: String,
    /// Where the text came from
    pub kind: ContentKind,
    /// Size of the stored document
    pub bytes: u64,
    /// Why the proxy was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}
