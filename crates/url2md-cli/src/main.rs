//! url2md CLI - save a web page as a Markdown file

use clap::Parser;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url2md::{output_filename, Document, Retriever, PROXY_API_KEY_ENV};

/// url2md - fetch a URL and save it as Markdown
///
/// Origins that answer with a bot challenge or a defensive status are
/// retried once through the r.jina.ai rendering proxy. Set JINA_API_KEY
/// to authenticate against the proxy.
#[derive(Parser, Debug)]
#[command(name = "url2md")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// URL to fetch; https is assumed when the scheme is missing
    url: String,

    /// Print progress to stderr
    #[arg(long, short)]
    verbose: bool,

    /// Directory the Markdown file is written to
    #[arg(long, short, default_value = ".")]
    output_dir: PathBuf,

    /// Print the Markdown to stdout instead of writing a file
    #[arg(long, conflicts_with = "json")]
    stdout: bool,

    /// Print a JSON summary of the written file
    #[arg(long)]
    json: bool,

    /// Seconds allowed for the warm-up and page request together
    #[arg(long, default_value_t = 45)]
    timeout: u64,

    /// Seconds allowed for the rendering proxy request
    #[arg(long, default_value_t = 60)]
    proxy_timeout: u64,

    /// Fail on defensive responses instead of asking the rendering proxy
    #[arg(long)]
    no_fallback: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = run(&cli).await;
    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let default_filter = default_log_filter(verbose);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Diagnostics only with `-v`; failures are reported by `run` itself
fn default_log_filter(verbose: bool) -> &'static str {
    if verbose {
        "url2md=info"
    } else {
        "error"
    }
}

async fn run(cli: &Cli) -> i32 {
    let retriever = build_retriever(cli, api_key_from_env());

    let document = match retriever.retrieve(&cli.url).await {
        Ok(document) => document,
        Err(e) => {
            eprintln!("Error: {}", e);
            return e.exit_code();
        }
    };

    if cli.stdout {
        write_safe(&document.content);
        return 0;
    }

    let path = output_path(&cli.output_dir, &document);
    info!("Saving to {}", path.display());
    if let Err(e) = write_document(&path, &document.content) {
        eprintln!("Error: failed to write {}: {}", path.display(), e);
        return 1;
    }
    info!(
        "Done. Wrote {} bytes to {}",
        document.content.len(),
        path.display()
    );

    if cli.json {
        let report = document.report(path.display().to_string());
        match serde_json::to_string_pretty(&report) {
            Ok(json) => writeln_safe(&json),
            Err(e) => {
                eprintln!("Error serializing report: {}", e);
                return 1;
            }
        }
    }

    0
}

fn build_retriever(cli: &Cli, api_key: Option<String>) -> Retriever {
    Retriever::builder()
        .timeout(Duration::from_secs(cli.timeout))
        .proxy_timeout(Duration::from_secs(cli.proxy_timeout))
        .fallback(!cli.no_fallback)
        .proxy_api_key(api_key)
        .build()
}

fn api_key_from_env() -> Option<String> {
    normalize_api_key(std::env::var(PROXY_API_KEY_ENV).ok())
}

/// Trim the credential; blank means none
fn normalize_api_key(raw: Option<String>) -> Option<String> {
    raw.map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

fn output_path(dir: &Path, document: &Document) -> PathBuf {
    dir.join(output_filename(&document.url))
}

fn write_document(path: &Path, content: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, content)
}

/// Write a line to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let mut line = String::with_capacity(s.len() + 1);
    line.push_str(s);
    line.push('\n');
    write_safe(line.as_bytes());
}

/// Write raw bytes to stdout, exit silently on broken pipe
fn write_safe(bytes: &[u8]) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = handle.write_all(bytes).and_then(|()| handle.flush()) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use clap::error::ErrorKind;
    use url2md::{ContentKind, DefenseReason};

    fn document(url: &str) -> Document {
        Document {
            url: url.parse().unwrap(),
            kind: ContentKind::RawMarkup,
            content: Bytes::from_static(b"# Title\n"),
            fallback_reason: None,
        }
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["url2md", "example.com"]).unwrap();
        assert_eq!(cli.url, "example.com");
        assert!(!cli.verbose);
        assert_eq!(cli.output_dir, PathBuf::from("."));
        assert!(!cli.stdout);
        assert!(!cli.json);
        assert_eq!(cli.timeout, 45);
        assert_eq!(cli.proxy_timeout, 60);
        assert!(!cli.no_fallback);
    }

    #[test]
    fn test_parse_all_flags() {
        let cli = Cli::try_parse_from([
            "url2md",
            "-v",
            "-o",
            "out",
            "--json",
            "--timeout",
            "10",
            "--proxy-timeout",
            "20",
            "--no-fallback",
            "https://example.com/docs",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.output_dir, PathBuf::from("out"));
        assert!(cli.json);
        assert_eq!(cli.timeout, 10);
        assert_eq!(cli.proxy_timeout, 20);
        assert!(cli.no_fallback);
    }

    #[test]
    fn test_missing_url_is_usage_error() {
        let err = Cli::try_parse_from(["url2md"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_stdout_conflicts_with_json() {
        let err =
            Cli::try_parse_from(["url2md", "--stdout", "--json", "example.com"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_normalize_api_key() {
        assert_eq!(normalize_api_key(None), None);
        assert_eq!(normalize_api_key(Some("   ".into())), None);
        assert_eq!(
            normalize_api_key(Some(" secret\n".into())),
            Some("secret".to_string())
        );
    }

    #[test]
    fn test_build_retriever_from_flags() {
        let cli = Cli::try_parse_from([
            "url2md",
            "--timeout",
            "5",
            "--proxy-timeout",
            "7",
            "--no-fallback",
            "example.com",
        ])
        .unwrap();
        let retriever = build_retriever(&cli, Some("key".into()));
        let options = retriever.options();
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert_eq!(options.proxy_timeout, Duration::from_secs(7));
        assert!(!options.fallback);
        assert_eq!(options.proxy_api_key, Some("key".to_string()));
    }

    #[test]
    fn test_output_path_uses_artifact_name() {
        let doc = document("https://example.com/docs/");
        assert_eq!(
            output_path(Path::new("out"), &doc),
            PathBuf::from("out").join("example_com_docs.md")
        );
        let doc = document("https://springdoc.org");
        assert_eq!(
            output_path(Path::new("."), &doc),
            PathBuf::from(".").join("springdoc_org.md")
        );
    }

    #[test]
    fn test_write_document_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let doc = document("https://example.com/a/b?x=1");
        let path = output_path(&dir.path().join("nested"), &doc);

        write_document(&path, &doc.content).unwrap();

        assert_eq!(path.file_name().unwrap(), "example_com_a_b.md");
        assert_eq!(fs::read_to_string(&path).unwrap(), "# Title\n");
    }

    #[test]
    fn test_pre_rendered_bytes_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let raw: &[u8] = &[84, 105, 233, 116, 101, 10];
        let doc = Document {
            url: "https://example.com/blocked".parse().unwrap(),
            kind: ContentKind::PreRendered,
            content: Bytes::copy_from_slice(raw),
            fallback_reason: Some(DefenseReason::Status(403)),
        };
        let path = output_path(dir.path(), &doc);

        write_document(&path, &doc.content).unwrap();

        assert_eq!(fs::read(&path).unwrap(), raw);
    }

    #[test]
    fn test_default_log_filter_quiet_without_verbose() {
        assert_eq!(default_log_filter(false), "error");
        assert_eq!(default_log_filter(true), "url2md=info");
    }

    #[test]
    fn test_write_document_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example_com.md");
        write_document(&path, b"old").unwrap();
        write_document(&path, b"new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }
}
