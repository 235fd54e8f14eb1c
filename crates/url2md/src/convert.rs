//! HTML to Markdown conversion
//!
//! A single-pass tag scanner, good enough for documentation pages and
//! articles. Links and images are resolved against the page address so the
//! saved file stays usable outside the site.

use crate::error::FetchError;
use std::collections::VecDeque;
use std::iter::Peekable;
use std::str::Chars;
use url::Url;

/// Binary content type prefixes
const BINARY_PREFIXES: &[&str] = &[
    "image/",
    "audio/",
    "video/",
    "application/octet-stream",
    "application/pdf",
    "application/zip",
    "application/gzip",
    "application/x-tar",
    "application/x-rar",
    "application/x-7z",
    "application/vnd.ms-",
    "application/vnd.openxmlformats",
    "font/",
];

/// Content types stored as they are instead of being converted
const PLAIN_TEXT_TYPES: &[&str] = &["text/plain", "text/markdown", "text/x-markdown"];

/// Elements whose whole subtree is dropped
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "svg", "head", "template",
];

/// Convert a fetched markup payload into Markdown
///
/// Fails for binary payloads. Explicit plain-text and Markdown responses
/// are passed through with newline normalization only.
pub fn markup_to_markdown(
    body: &[u8],
    content_type: Option<&str>,
    base: &Url,
) -> Result<String, FetchError> {
    if let Some(ct) = content_type {
        if is_binary_content_type(ct) {
            return Err(FetchError::Conversion(format!(
                "binary content ({ct}) cannot be converted to Markdown"
            )));
        }
    }
    if body.contains(&0) {
        return Err(FetchError::Conversion(
            "payload contains binary data".to_string(),
        ));
    }

    let content = String::from_utf8_lossy(body);
    if content_type.is_some_and(is_plain_text_type) {
        return Ok(filter_excessive_newlines(content.trim()));
    }

    Ok(html_to_markdown(&content, base))
}

/// Convert HTML to Markdown, resolving relative links against `base`
pub fn html_to_markdown(html: &str, base: &Url) -> String {
    let mut converter = Converter::new(base);
    converter.run(html);
    tidy(&converter.out)
}

/// Check if content type indicates binary content
pub(crate) fn is_binary_content_type(content_type: &str) -> bool {
    let ct_lower = content_type.to_lowercase();
    BINARY_PREFIXES
        .iter()
        .any(|prefix| ct_lower.starts_with(prefix))
}

fn is_plain_text_type(content_type: &str) -> bool {
    let ct_lower = content_type.to_lowercase();
    PLAIN_TEXT_TYPES
        .iter()
        .any(|prefix| ct_lower.starts_with(prefix))
}

struct Converter<'a> {
    base: &'a Url,
    out: String,
    links: Vec<Option<String>>,
    list_depth: usize,
    quote_depth: usize,
    in_pre: bool,
}

impl<'a> Converter<'a> {
    fn new(base: &'a Url) -> Self {
        Self {
            base,
            out: String::new(),
            links: Vec::new(),
            list_depth: 0,
            quote_depth: 0,
            in_pre: false,
        }
    }

    fn run(&mut self, html: &str) {
        let mut chars = html.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '<' {
                let tag = read_tag(&mut chars);
                match skipped_element(&tag) {
                    Some(name) => skip_element(&mut chars, &name),
                    None => self.tag(&tag),
                }
            } else if c == '&' {
                let decoded = decode_entity(&mut chars);
                self.text(&decoded);
            } else {
                self.char(c);
            }
        }
    }

    fn char(&mut self, c: char) {
        if self.in_pre {
            if c == '\n' {
                self.out.push('\n');
                self.quote_prefix();
            } else {
                self.out.push(c);
            }
        } else if c.is_whitespace() {
            if !(self.out.is_empty() || self.out.ends_with('\n') || self.out.ends_with(' ')) {
                self.out.push(' ');
            }
        } else {
            self.out.push(c);
        }
    }

    fn text(&mut self, s: &str) {
        for c in s.chars() {
            self.char(c);
        }
    }

    fn newline(&mut self) {
        self.out.push('\n');
        self.quote_prefix();
    }

    fn blank_line(&mut self) {
        self.newline();
        self.newline();
    }

    fn quote_prefix(&mut self) {
        for _ in 0..self.quote_depth {
            self.out.push_str("> ");
        }
    }

    fn tag(&mut self, raw: &str) {
        // comments, doctype, processing instructions
        if raw.starts_with('!') || raw.starts_with('?') {
            return;
        }

        let is_closing = raw.starts_with('/');
        let body = raw.trim_start_matches('/');
        let self_closing = body.ends_with('/');
        let name = tag_name(body);

        // stray closing tag of a skipped element
        if SKIP_TAGS.contains(&name.as_str()) {
            return;
        }

        match name.as_str() {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                if is_closing {
                    self.blank_line();
                } else {
                    let level = name[1..].parse::<usize>().unwrap_or(1);
                    self.blank_line();
                    self.out.push_str(&"#".repeat(level));
                    self.out.push(' ');
                }
            }
            "p" | "div" | "section" | "article" | "main" | "header" | "footer" | "nav"
            | "aside" | "table" | "figure" => {
                self.blank_line();
            }
            "tr" | "dt" | "dd" => {
                if is_closing {
                    self.newline();
                }
            }
            "td" | "th" => {
                if is_closing {
                    self.out.push_str(" | ");
                }
            }
            "br" => {
                self.newline();
            }
            "hr" => {
                self.blank_line();
                self.out.push_str("---");
                self.blank_line();
            }
            "ul" | "ol" => {
                if is_closing {
                    self.list_depth = self.list_depth.saturating_sub(1);
                    if self.list_depth == 0 {
                        self.newline();
                    }
                } else {
                    if self.list_depth == 0 {
                        self.newline();
                    }
                    self.list_depth += 1;
                }
            }
            "li" => {
                if !is_closing {
                    self.newline();
                    for _ in 0..self.list_depth.saturating_sub(1) {
                        self.out.push_str("  ");
                    }
                    self.out.push_str("- ");
                }
            }
            "strong" | "b" => {
                self.out.push_str("**");
            }
            "em" | "i" => {
                self.out.push('*');
            }
            "pre" => {
                if is_closing {
                    self.in_pre = false;
                    self.newline();
                    self.out.push_str("```");
                    self.blank_line();
                } else {
                    self.blank_line();
                    self.out.push_str("```");
                    self.newline();
                    self.in_pre = true;
                }
            }
            "code" => {
                if !self.in_pre {
                    self.out.push('`');
                }
            }
            "blockquote" => {
                if is_closing {
                    self.quote_depth = self.quote_depth.saturating_sub(1);
                    self.blank_line();
                } else {
                    self.quote_depth += 1;
                    self.blank_line();
                }
            }
            "a" => {
                if is_closing {
                    if let Some(Some(href)) = self.links.pop() {
                        self.out.push_str("](");
                        self.out.push_str(&href);
                        self.out.push(')');
                    }
                } else if !self_closing {
                    let href = extract_attribute(body, "href")
                        .filter(|href| !href.trim().is_empty())
                        .map(|href| resolve_link(self.base, &href));
                    if href.is_some() {
                        self.out.push('[');
                    }
                    self.links.push(href);
                }
            }
            "img" => {
                if let Some(src) = extract_attribute(body, "src") {
                    let alt = extract_attribute(body, "alt").unwrap_or_default();
                    self.out.push_str("![");
                    self.out.push_str(alt.trim());
                    self.out.push_str("](");
                    self.out.push_str(&resolve_link(self.base, &src));
                    self.out.push(')');
                }
            }
            _ => {}
        }
    }
}

/// Read everything up to the closing `>` of a tag, swallowing whole comments
///
/// A `>` inside a quoted attribute value does not end the tag.
fn read_tag(chars: &mut Peekable<Chars>) -> String {
    let mut tag = String::new();
    let mut quote: Option<char> = None;

    for next in chars.by_ref() {
        match quote {
            Some(q) if next == q => quote = None,
            Some(_) => {}
            None if next == '>' => {
                if tag.starts_with("!--") && !tag.ends_with("--") {
                    tag.push(next);
                    continue;
                }
                break;
            }
            None if (next == '"' || next == '\'')
                && !tag.starts_with('!')
                && tag.trim_end().ends_with('=') =>
            {
                quote = Some(next);
            }
            None => {}
        }
        tag.push(next);
    }
    tag
}

/// Lowercase element name of a tag body without its leading `/`
fn tag_name(body: &str) -> String {
    body.split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Name of the element whose content must be dropped, if `raw` opens one
fn skipped_element(raw: &str) -> Option<String> {
    if raw.starts_with(|c: char| matches!(c, '/' | '!' | '?')) || raw.ends_with('/') {
        return None;
    }
    let name = tag_name(raw);
    SKIP_TAGS.contains(&name.as_str()).then_some(name)
}

/// Consume raw content up to and including the matching `</name>`
///
/// Content is not parsed, so `<` inside scripts cannot open tags.
fn skip_element(chars: &mut Peekable<Chars>, name: &str) {
    let closing: Vec<char> = format!("</{name}").chars().collect();
    let mut tail: VecDeque<char> = VecDeque::with_capacity(closing.len());

    while let Some(c) = chars.next() {
        if tail.len() == closing.len() {
            tail.pop_front();
        }
        tail.push_back(c.to_ascii_lowercase());

        let ends_name = chars
            .peek()
            .map_or(true, |next| *next == '>' || *next == '/' || next.is_whitespace());
        if ends_name && tail.iter().eq(closing.iter()) {
            read_tag(chars);
            return;
        }
    }
}

/// Resolve `href` against the page address, leaving fragments and
/// unparseable values untouched
fn resolve_link(base: &Url, href: &str) -> String {
    let href = href.trim();
    if href.starts_with('#') {
        return href.to_string();
    }
    base.join(href)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Extract attribute value from tag
fn extract_attribute(tag: &str, attr: &str) -> Option<String> {
    let tag_lower = tag.to_ascii_lowercase();
    let pattern = format!("{}=", attr);

    let mut from = 0;
    while let Some(offset) = tag_lower[from..].find(&pattern) {
        let start = from + offset;
        from = start + pattern.len();

        // skip matches inside longer names such as data-href=
        let preceded_ok = tag_lower[..start]
            .chars()
            .next_back()
            .is_some_and(char::is_whitespace);
        if !preceded_ok {
            continue;
        }

        let rest = tag[from..].trim_start();
        let value = if let Some(rest) = rest.strip_prefix('"') {
            rest.find('"').map(|end| &rest[..end])
        } else if let Some(rest) = rest.strip_prefix('\'') {
            rest.find('\'').map(|end| &rest[..end])
        } else {
            let end = rest
                .find(|c: char| c.is_whitespace() || c == '>')
                .unwrap_or(rest.len());
            Some(&rest[..end])
        };
        return value.map(decode_attribute);
    }
    None
}

fn decode_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '&' {
            out.push_str(&decode_entity(&mut chars));
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode an HTML entity whose `&` was already consumed
///
/// Unknown or malformed entities are returned verbatim.
fn decode_entity(chars: &mut Peekable<Chars>) -> String {
    let mut entity = String::new();
    let mut terminated = false;
    while let Some(&next) = chars.peek() {
        if next == ';' {
            chars.next();
            terminated = true;
            break;
        }
        if !(next.is_ascii_alphanumeric() || next == '#') || entity.len() > 10 {
            break;
        }
        entity.push(next);
        chars.next();
    }

    if !terminated {
        return format!("&{entity}");
    }

    let decoded = match entity.as_str() {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        "mdash" => Some('—'),
        "ndash" => Some('–'),
        "hellip" => Some('…'),
        "copy" => Some('©'),
        "reg" => Some('®'),
        _ => entity.strip_prefix('#').and_then(|num| {
            let code = match num.strip_prefix(|c: char| c == 'x' || c == 'X') {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => num.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32)
        }),
    };

    match decoded {
        Some(c) => c.to_string(),
        None => format!("&{entity};"),
    }
}

/// Collapse spaces outside code fences, trim line ends, keep max one blank line
fn tidy(s: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_fence = false;

    for line in s.lines() {
        let line = line.trim_end();
        let is_fence = line
            .trim_start_matches(|c: char| c == '>' || c == ' ')
            .starts_with("```");

        if in_fence && !is_fence {
            lines.push(line.to_string());
            continue;
        }
        if is_fence {
            in_fence = !in_fence;
        }

        let content = line.trim_start();
        let mut collapsed = " ".repeat(line.len() - content.len());
        let mut last_was_space = false;
        for c in content.chars() {
            if c == ' ' {
                if !last_was_space {
                    collapsed.push(' ');
                }
                last_was_space = true;
            } else {
                collapsed.push(c);
                last_was_space = false;
            }
        }

        let previous_blank = lines.last().map_or(true, |last| is_blank(last));
        if is_blank(&collapsed) {
            if !previous_blank {
                lines.push(collapsed);
            }
            continue;
        }

        // a quoted blank line must not glue following text onto the quote
        if !collapsed.starts_with('>') {
            if let Some(last) = lines.last_mut() {
                if is_blank(last) {
                    last.clear();
                }
            }
        }
        lines.push(collapsed);
    }

    while lines.last().is_some_and(|last| is_blank(last)) {
        lines.pop();
    }

    lines.join("\n")
}

fn is_blank(line: &str) -> bool {
    line.chars().all(|c| c == '>' || c == ' ')
}

/// Filter excessive newlines: keep at most 2 consecutive newlines
pub fn filter_excessive_newlines(s: &str) -> String {
    let mut result = String::new();
    let mut newline_count = 0;

    for c in s.chars() {
        if c == '\n' {
            newline_count += 1;
            if newline_count <= 2 {
                result.push(c);
            }
        } else {
            newline_count = 0;
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/docs/guide").unwrap()
    }

    fn md(html: &str) -> String {
        html_to_markdown(html, &base())
    }

    #[test]
    fn test_headers() {
        let out = md("<h1>Title</h1><h2>Subtitle</h2><h6>Tiny</h6>");
        assert!(out.starts_with("# Title"));
        assert!(out.contains("\n## Subtitle"));
        assert!(out.contains("###### Tiny"));
    }

    #[test]
    fn test_paragraphs_separated() {
        let out = md("<p>First\n   paragraph</p><p>Second paragraph</p>");
        assert_eq!(out, "First paragraph\n\nSecond paragraph");
    }

    #[test]
    fn test_lists() {
        let out = md("<ul><li>Item 1</li><li>Item 2<ul><li>Nested</li></ul></li></ul>");
        assert!(out.contains("- Item 1"));
        assert!(out.contains("- Item 2"));
        assert!(out.contains("  - Nested"));
    }

    #[test]
    fn test_emphasis() {
        let out = md("<p><strong>bold</strong> and <em>italic</em></p>");
        assert_eq!(out, "**bold** and *italic*");
    }

    #[test]
    fn test_links_resolved_against_base() {
        let html = r#"<p>See <a href="../api/index.html">the API</a>
            and <a href='/about'>about</a>.</p>"#;
        let out = md(html);
        assert!(out.contains("[the API](https://example.com/api/index.html)"));
        assert!(out.contains("[about](https://example.com/about)"));
    }

    #[test]
    fn test_absolute_and_fragment_links_kept() {
        let html = r##"<a href="https://other.org/x?a=1&amp;b=2">ext</a> <a href="#top">top</a>"##;
        let out = md(html);
        assert!(out.contains("[ext](https://other.org/x?a=1&b=2)"));
        assert!(out.contains("[top](#top)"));
    }

    #[test]
    fn test_anchor_without_href_is_plain_text() {
        assert_eq!(md(r#"<p><a name="x">plain</a></p>"#), "plain");
        assert_eq!(md(r#"<p><a data-href="/x">plain</a></p>"#), "plain");
    }

    #[test]
    fn test_images() {
        let out = md(r#"<img src="img/logo.png" alt="Logo"/>"#);
        assert_eq!(out, "![Logo](https://example.com/docs/img/logo.png)");
    }

    #[test]
    fn test_code_block_keeps_layout() {
        let out = md("<pre><code>fn main() {\n    println!(\"hi\");\n}</code></pre>");
        assert!(out.contains("```\nfn main() {\n    println!(\"hi\");\n}\n```"));
        assert_eq!(md("<p>Use <code>cargo</code></p>"), "Use `cargo`");
    }

    #[test]
    fn test_blockquote() {
        let out = md("<blockquote><p>Quoted</p></blockquote><p>After</p>");
        assert!(out.contains("> Quoted"));
        assert!(out.ends_with("After"));
        assert!(!out.contains("> After"));
    }

    #[test]
    fn test_skip_script_style_head() {
        let html = concat!(
            "<html><head><title>T</title><style>p{}</style></head>",
            "<body><p>Before</p><script>alert('bad');</script>",
            "<!-- a > b --><p>After</p></body></html>",
        );
        let out = md(html);
        assert_eq!(out, "Before\n\nAfter");
    }

    #[test]
    fn test_script_content_is_not_parsed() {
        let out = md("<p>Before</p><script>for(var i=0;i<n;i++){}</script><p>After</p>");
        assert_eq!(out, "Before\n\nAfter");

        let html = concat!(
            "<p>Before</p>",
            "<script>document.write('<p>x</p>'); if (a </b) {}</SCRIPT >",
            "<p>After</p>",
        );
        assert_eq!(md(html), "Before\n\nAfter");

        let out = md("<style>a<b{}</style><p>Kept</p><svg><svg></svg></svg><p>Too</p>");
        assert_eq!(out, "Kept\n\nToo");
    }

    #[test]
    fn test_unclosed_script_drops_rest() {
        assert_eq!(md("<p>Only</p><script>var x = 1;"), "Only");
    }

    #[test]
    fn test_quoted_gt_inside_attribute() {
        let out = md(r#"<p><a title="a > b" href="/x">link</a></p>"#);
        assert_eq!(out, "[link](https://example.com/x)");

        let out = md(r#"<img alt='1 > 0' src="/i.png"><p>after</p>"#);
        assert!(out.starts_with("![1 > 0](https://example.com/i.png)"));
        assert!(out.ends_with("after"));
    }

    #[test]
    fn test_entity_decoding() {
        let html = concat!(
            "<p>&amp; &lt; &gt; &quot; &apos; &#39; &#x41; ",
            "&mdash; &copy; &unknown; AT&T</p>",
        );
        let out = md(html);
        assert_eq!(out, "& < > \" ' ' A — © &unknown; AT&T");
    }

    #[test]
    fn test_excessive_blank_lines_collapsed() {
        let out = md("<div><div><p>A</p></div></div><div><p>B</p></div>");
        assert_eq!(out, "A\n\nB");
    }

    #[test]
    fn test_binary_rejected() {
        let err = markup_to_markdown(&[0x89, 0x50], Some("image/png"), &base()).unwrap_err();
        assert!(matches!(err, FetchError::Conversion(msg) if msg.contains("image/png")));

        let err = markup_to_markdown(b"ab\0cd", None, &base()).unwrap_err();
        assert!(matches!(err, FetchError::Conversion(_)));
    }

    #[test]
    fn test_plain_text_passes_through() {
        let body = b"# Already markdown\n\n\n\n<not a tag>";
        let out = markup_to_markdown(body, Some("text/markdown; charset=utf-8"), &base()).unwrap();
        assert_eq!(out, "# Already markdown\n\n<not a tag>");
    }

    #[test]
    fn test_html_payload_converted() {
        let out = markup_to_markdown(b"<h1>Hi</h1>", Some("text/html"), &base()).unwrap();
        assert_eq!(out, "# Hi");
        let out = markup_to_markdown(b"<h1>Hi</h1>", None, &base()).unwrap();
        assert_eq!(out, "# Hi");
    }

    #[test]
    fn test_is_binary_content_type() {
        assert!(is_binary_content_type("image/png"));
        assert!(is_binary_content_type("application/pdf"));
        assert!(is_binary_content_type("Font/woff2"));
        assert!(!is_binary_content_type("text/html"));
        assert!(!is_binary_content_type("application/json"));
    }

    #[test]
    fn test_filter_excessive_newlines() {
        let input = "line1\n\n\n\n\nline2";
        let output = filter_excessive_newlines(input);
        assert_eq!(output, "line1\n\nline2");
    }
}
