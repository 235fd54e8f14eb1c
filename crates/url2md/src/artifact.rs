//! Output file naming

use url::Url;

/// Name used when neither host nor path yields any usable character
pub const FALLBACK_STEM: &str = "output";

/// Extension of every artifact
pub const EXTENSION: &str = "md";

/// Derive the artifact file name for a resolved address
///
/// Host (with explicit port) and path are joined, every run of
/// non-alphanumeric characters collapses to one `_`, and the result is
/// trimmed of `_`. Query and fragment never contribute.
pub fn output_filename(target: &Url) -> String {
    let host = host_with_port(target);
    let joined = format!("{}{}", host, target.path());
    let mut base = joined.trim_matches('/');
    if base.is_empty() {
        base = host.as_str();
    }

    let mut stem = sanitize_stem(base);
    if stem.is_empty() {
        stem = FALLBACK_STEM.to_string();
    }

    format!("{stem}.{EXTENSION}")
}

/// Collapse non-alphanumeric runs to `_` and trim the edges
///
/// Applying this to its own output returns the same string.
pub fn sanitize_stem(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_sep = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }

    out
}

fn host_with_port(target: &Url) -> String {
    let host = target.host_str().unwrap_or_default();
    match target.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}
