//! url2md - fetch a web page and keep it as Markdown
//!
//! This crate retrieves one document over HTTP(S) and turns it into
//! Markdown. Origins that turn away automated clients are retried once
//! through a rendering proxy.
//!
//! ## Retrieval
//!
//! A [`Retriever`] runs each retrieval as a fixed sequence:
//! - resolve the input into an address ([`resolve_target`])
//! - warm up the origin and fetch the document with one cookie session
//!   ([`OriginFetcher`])
//! - on a defensive response (401/403/429/503), fetch rendered text from
//!   the proxy instead ([`ProxyFetcher`])
//! - convert markup to Markdown, or keep proxy text verbatim ([`render`])
//!
//! [`output_filename`] names the file a document is stored under.

pub mod artifact;
pub mod client;
mod convert;
mod error;
pub mod fetchers;
pub mod headers;
mod retriever;
pub mod target;
mod types;

pub use artifact::output_filename;
pub use client::FetchOptions;
pub use convert::{html_to_markdown, markup_to_markdown};
pub use error::{DefenseReason, FetchError, ProxyError};
pub use fetchers::{OriginFetcher, ProxyFetcher};
pub use retriever::{render, Retriever, RetrieverBuilder};
pub use target::resolve_target;
pub use types::{ContentKind, Document, FetchOutcome, Phase, Report};

/// Environment variable the CLI reads the proxy credential from
pub const PROXY_API_KEY_ENV: &str = "JINA_API_KEY";

/// Retrieve a page with default options
///
/// Runs without a proxy credential. For custom options, use
/// [`Retriever::builder`].
pub async fn retrieve(raw: &str) -> Result<Document, FetchError> {
    Retriever::default().retrieve(raw).await
}
