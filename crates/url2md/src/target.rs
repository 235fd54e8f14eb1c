//! Target resolution
//!
//! Turns whatever the user typed (`example.com/docs`, `http://host:8080/x`,
//! `https://site.org`) into an absolute http(s) [`Url`] with a host.

use crate::error::FetchError;
use url::{ParseError, Url};

/// Scheme assumed when the input carries none
pub const DEFAULT_SCHEME: &str = "https";

/// Resolve a user-supplied string into a fetchable address
pub fn resolve_target(raw: &str) -> Result<Url, FetchError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FetchError::InvalidTarget("missing host".to_string()));
    }

    match Url::parse(raw) {
        Ok(parsed) if has_host(&parsed) => return check_scheme(parsed),
        // "localhost:8080" and "example.com:443/x" parse with the host
        // taken as a scheme and no authority at all
        Ok(_) | Err(ParseError::RelativeUrlWithoutBase) => {}
        Err(ParseError::EmptyHost) => {
            return Err(FetchError::InvalidTarget("missing host".to_string()))
        }
        Err(err) => return Err(FetchError::InvalidTarget(err.to_string())),
    }

    match Url::parse(&format!("{DEFAULT_SCHEME}://{raw}")) {
        Ok(guessed) if has_host(&guessed) => Ok(guessed),
        Ok(_) | Err(ParseError::EmptyHost) => {
            Err(FetchError::InvalidTarget("missing host".to_string()))
        }
        Err(err) => Err(FetchError::InvalidTarget(err.to_string())),
    }
}

fn has_host(url: &Url) -> bool {
    url.host_str().is_some_and(|host| !host.is_empty())
}

fn check_scheme(url: Url) -> Result<Url, FetchError> {
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidTarget(format!(
            "unsupported scheme {other}: must be http or https"
        ))),
    }
}

/// Origin root of the address (`scheme://host[:port]/`)
pub fn origin_root(target: &Url) -> Url {
    let mut root = target.clone();
    root.set_path("/");
    root.set_query(None);
    root.set_fragment(None);
    root
}
