//! CLI binary for potd-poster.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PostConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use potd_poster::{
    dry_run, run, Chunk, EntrySource, OAuthCredentials, PostConfig, RunObserver, RunSummary,
    TracingObserver, DEFAULT_FEED_URL,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── Terminal observer ────────────────────────────────────────────────────────

/// Prints one line per stage to stderr and forwards everything to `tracing`.
struct CliObserver {
    inner: TracingObserver,
}

impl RunObserver for CliObserver {
    fn on_chunk(&self, chunk: &Chunk) {
        self.inner.on_chunk(chunk);
    }

    fn on_segmentation_complete(&self, chunk_count: usize) {
        self.inner.on_segmentation_complete(chunk_count);
        eprintln!("{} caption split into {} posts", cyan("◆"), bold(&chunk_count.to_string()));
    }

    fn on_transcode_start(&self, original_size: usize, ceiling: usize, quality: u8) {
        self.inner.on_transcode_start(original_size, ceiling, quality);
        eprintln!(
            "{} image is {} bytes  {}",
            cyan("◆"),
            bold(&original_size.to_string()),
            dim(&format!("(limit {ceiling}, quality {quality})"))
        );
    }

    fn on_transcode_probe(&self, min_width: u32, max_width: u32, test_width: u32, size: usize) {
        self.inner.on_transcode_probe(min_width, max_width, test_width, size);
        eprintln!(
            "  {} {:>5}px  {:>9} bytes  {}",
            dim("·"),
            test_width,
            size,
            dim(&format!("[{min_width}, {max_width}]"))
        );
    }

    fn on_transcode_complete(&self, width: u32, height: u32, size: usize, reencoded: bool) {
        self.inner.on_transcode_complete(width, height, size, reencoded);
        let how = if reencoded { "re-encoded" } else { "unchanged" };
        eprintln!("{} image {how}: {width}×{height}, {size} bytes", green("✓"));
    }

    fn on_post_published(&self, index: usize, total: usize, id: &str) {
        self.inner.on_post_published(index, total, id);
        eprintln!("  {} post {:>2}/{:<2}  {}", green("✓"), index, total, dim(id));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # See what today's thread would look like, without posting
  potd --dry-run

  # Post from the Commons feed
  potd

  # Post from a Google Sheet
  potd --source sheet --spreadsheet-id 1AbC... --range 'Sheet1!Y1:Z1'

  # Machine-readable summary
  potd --dry-run --json > summary.json

ENVIRONMENT VARIABLES:
  POTD_CONSUMER_KEY          Posting API consumer key
  POTD_CONSUMER_SECRET       Posting API consumer secret
  POTD_ACCESS_TOKEN          Posting API access token
  POTD_ACCESS_TOKEN_SECRET   Posting API access token secret
  POTD_SHEETS_API_KEY        Google Sheets API key (sheet source)
  RUST_LOG                   Overrides -v / -q log filtering
"#;

/// Post the Wikimedia Commons picture of the day as a thread.
#[derive(Parser, Debug)]
#[command(
    name = "potd",
    version,
    about = "Post the Wikimedia Commons picture of the day as a thread",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Where today's caption and image URL come from.
    #[arg(long, env = "POTD_SOURCE", value_enum, default_value = "feed")]
    source: SourceArg,

    /// Spreadsheet id (sheet source).
    #[arg(long, env = "POTD_SPREADSHEET_ID", required_if_eq("source", "sheet"))]
    spreadsheet_id: Option<String>,

    /// A1 range holding the caption and URL cells (sheet source).
    #[arg(long, env = "POTD_RANGE", default_value = "Sheet1!Y1:Z1")]
    range: String,

    /// Google Sheets API key (sheet source).
    #[arg(long, env = "POTD_SHEETS_API_KEY", hide_env_values = true)]
    sheets_api_key: Option<String>,

    /// RSS feed URL (feed source).
    #[arg(long, env = "POTD_FEED_URL", default_value = DEFAULT_FEED_URL)]
    feed_url: String,

    /// JPEG quality used when the image has to be shrunk (1–100).
    #[arg(long, env = "POTD_QUALITY", default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Image size ceiling in bytes.
    #[arg(long, env = "POTD_SIZE_LIMIT", default_value_t = 5_000_000)]
    size_limit: usize,

    /// Maximum number of posts in the thread (1–99).
    #[arg(long, env = "POTD_MAX_POSTS", default_value_t = 99,
          value_parser = clap::value_parser!(u8).range(1..=99))]
    max_posts: u8,

    /// Long-edge cap in pixels for re-encoded images.
    #[arg(long, env = "POTD_MAX_DIMENSION", default_value_t = 4096)]
    max_dimension: u32,

    /// Where to write the upload artefact. Default: ./new.jpeg
    #[arg(short, long, env = "POTD_OUTPUT")]
    output: Option<PathBuf>,

    /// Keep the written image after posting.
    #[arg(long, env = "POTD_KEEP_IMAGE")]
    keep_image: bool,

    /// Plan the thread and shrink the image, but post nothing.
    #[arg(long)]
    dry_run: bool,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Timeout for the source fetch and image download, in seconds.
    #[arg(long, env = "POTD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Timeout for each posting API call, in seconds.
    #[arg(long, env = "POTD_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Log line format on stderr.
    #[arg(long, env = "POTD_LOG_FORMAT", value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "POTD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "POTD_QUIET")]
    quiet: bool,

    #[arg(long, env = "POTD_CONSUMER_KEY", hide_env_values = true, hide = true)]
    consumer_key: Option<String>,

    #[arg(long, env = "POTD_CONSUMER_SECRET", hide_env_values = true, hide = true)]
    consumer_secret: Option<String>,

    #[arg(long, env = "POTD_ACCESS_TOKEN", hide_env_values = true, hide = true)]
    access_token: Option<String>,

    #[arg(long, env = "POTD_ACCESS_TOKEN_SECRET", hide_env_values = true, hide = true)]
    access_token_secret: Option<String>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SourceArg {
    Sheet,
    Feed,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .init(),
    }

    let config = build_config(&cli)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let summary = if cli.dry_run {
        dry_run(&config).await.context("Dry run failed")?
    } else {
        run(&config).await.context("Posting failed")?
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&summary);
    }

    Ok(())
}

/// Map CLI args to `PostConfig`.
fn build_config(cli: &Cli) -> Result<PostConfig> {
    let source = match cli.source {
        SourceArg::Feed => EntrySource::Feed {
            url: cli.feed_url.clone(),
        },
        SourceArg::Sheet => EntrySource::Sheet {
            spreadsheet_id: cli
                .spreadsheet_id
                .clone()
                .context("--spreadsheet-id is required for the sheet source")?,
            range: cli.range.clone(),
            api_key: cli
                .sheets_api_key
                .clone()
                .context("POTD_SHEETS_API_KEY is required for the sheet source")?,
        },
    };

    let mut builder = PostConfig::builder()
        .source(source)
        .quality(cli.quality)
        .size_ceiling_bytes(cli.size_limit)
        .max_thread_posts(usize::from(cli.max_posts))
        .max_dimension(cli.max_dimension)
        .keep_image(cli.keep_image)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref path) = cli.output {
        builder = builder.output_path(path);
    }

    if let (Some(ck), Some(cs), Some(at), Some(ats)) = (
        &cli.consumer_key,
        &cli.consumer_secret,
        &cli.access_token,
        &cli.access_token_secret,
    ) {
        builder = builder.credentials(OAuthCredentials::new(ck, cs, at, ats));
    }

    // Terminal lines only when a human reads stderr in text mode.
    if !cli.quiet && !cli.json && cli.log_format == LogFormat::Text {
        builder = builder.observer(Arc::new(CliObserver {
            inner: TracingObserver,
        }));
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(summary: &RunSummary) {
    for (i, post) in summary.chunks.iter().enumerate() {
        println!("{}", dim(&format!("── {}/{} ──", i + 1, summary.chunks.len())));
        println!("{post}");
    }
    println!();

    let image = &summary.image;
    let location = image
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(removed)".into());
    eprintln!(
        "{}  image {} → {} bytes ({:.0}% saved)  →  {}",
        green("✔"),
        image.original_bytes,
        image.final_bytes,
        image.savings() * 100.0,
        bold(&location),
    );

    if summary.dry_run {
        eprintln!("   {} nothing posted  —  {}ms", cyan("dry run"), summary.duration_ms);
    } else {
        let root = summary.post_ids.first().map(String::as_str).unwrap_or("-");
        eprintln!(
            "   {} posts published, root {}  —  {}ms",
            summary.post_ids.len(),
            bold(root),
            summary.duration_ms
        );
    }
}
