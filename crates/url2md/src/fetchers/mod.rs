//! Fetchers for the origin and the rendering proxy
//!
//! Design: [`OriginFetcher`] talks to the site itself through a cookie
//! session that lives for one retrieval and classifies what it gets back.
//! [`ProxyFetcher`] asks a third-party renderer for the same page with a
//! clean client of its own. Sequencing the two is the retriever's job.

mod origin;
mod proxy;

pub use origin::{classify_defense, OriginFetcher, OriginResponse};
pub use proxy::ProxyFetcher;

use crate::convert::is_binary_content_type;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;

/// Statuses origins use to turn away automated clients
pub const DEFENSIVE_STATUSES: &[u16] = &[401, 403, 429, 503];

/// `Server` header tokens of bot-mitigation vendors (lowercase)
pub const CHALLENGE_VENDORS: &[&str] = &["cloudflare", "ddos-guard", "sucuri", "akamaighost"];

/// Maximum characters of an error body kept for diagnostics
pub const EXCERPT_CHARS: usize = 256;

/// Marker appended to a shortened excerpt
pub const EXCERPT_ELLIPSIS: &str = "…";

/// Read the leading part of an error body for diagnostics
///
/// Reads only as many bytes as `max_chars` characters can occupy. Binary,
/// undecodable, or unreadable bodies give an empty excerpt.
pub(crate) async fn read_excerpt(response: reqwest::Response, max_chars: usize) -> String {
    let is_binary = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_binary_content_type);
    if is_binary {
        return String::new();
    }

    // enough bytes for one character past the limit even at 4 bytes each
    let byte_budget = (max_chars + 2) * 4;
    let mut buf = Vec::new();
    let mut stream = response.bytes_stream();

    while buf.len() < byte_budget {
        match stream.next().await {
            Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
            Some(Err(err)) => {
                tracing::debug!(error = %err, "Error reading error body");
                return String::new();
            }
            None => break,
        }
    }

    let text = match std::str::from_utf8(&buf) {
        Ok(text) => text,
        // cut in the middle of a character by the byte budget
        Err(err) if err.error_len().is_none() => {
            std::str::from_utf8(&buf[..err.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => return String::new(),
    };

    truncate_excerpt(text, max_chars)
}

/// Trim and cut `text` to `max_chars` characters, marking the cut
pub(crate) fn truncate_excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{}", &text[..idx], EXCERPT_ELLIPSIS),
        None => text.to_string(),
    }
}
