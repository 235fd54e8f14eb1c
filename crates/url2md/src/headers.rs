//! Request header sets for origin and proxy requests

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, USER_AGENT};

/// Desktop Chrome on macOS, sent to the origin
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Honest client identity sent to the rendering proxy
pub const PROXY_USER_AGENT: &str = concat!("url2md-proxy/", env!("CARGO_PKG_VERSION"));

/// Headers every origin request carries
const BROWSER_HEADERS: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    ),
    ("accept-language", "en-US,en;q=0.9"),
    ("cache-control", "no-cache"),
    ("pragma", "no-cache"),
    (
        "sec-ch-ua",
        "\"Not/A)Brand\";v=\"8\", \"Chromium\";v=\"126\", \"Google Chrome\";v=\"126\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"macOS\""),
];

/// Fetch-metadata headers of a user-initiated document navigation
const NAVIGATION_HEADERS: &[(&str, &str)] = &[
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("upgrade-insecure-requests", "1"),
];

/// Browser-like headers for an origin request
///
/// The warm-up request passes `navigation = false`; the main document
/// request adds the navigation fetch-metadata set.
pub fn browser_headers(user_agent: &str, navigation: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent)
            .unwrap_or_else(|_| HeaderValue::from_static(BROWSER_USER_AGENT)),
    );

    insert_static(&mut headers, BROWSER_HEADERS);
    if navigation {
        insert_static(&mut headers, NAVIGATION_HEADERS);
    }

    headers
}

/// Headers for the rendering proxy, with optional bearer credential
pub fn proxy_headers(api_key: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(PROXY_USER_AGENT));

    let key = api_key.map(str::trim).filter(|key| !key.is_empty());
    if let Some(key) = key {
        match HeaderValue::from_str(&format!("Bearer {key}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => tracing::warn!("Ignoring proxy API key with invalid header characters"),
        }
    }

    headers
}

fn insert_static(headers: &mut HeaderMap, pairs: &[(&'static str, &'static str)]) {
    for &(name, value) in pairs {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
}
