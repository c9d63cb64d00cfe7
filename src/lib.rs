//! # potd-poster
//!
//! Post the Wikimedia Commons picture of the day as a thread on a
//! short-post platform.
//!
//! ## Why this crate?
//!
//! Picture-of-the-day captions routinely run to several hundred characters and
//! the originals to tens of megabytes. The platform takes 280 weighted units
//! per post and 5 MB per image. This crate does the two fiddly parts: it
//! splits the caption into a thread whose seams are marked with `...`, and it
//! shrinks the image with a width binary search until its JPEG encoding fits.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Sheet / RSS feed
//!  │
//!  ├─ 1. Source     today's caption + image URL
//!  ├─ 2. Segment    caption → thread of valid posts
//!  ├─ 3. Download   image bytes
//!  ├─ 4. Transcode  shrink below the byte ceiling (CPU-bound, spawn_blocking)
//!  ├─ 5. Persist    <cwd>/new.jpeg
//!  └─ 6. Publish    media upload, root post, replies
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use potd_poster::{dry_run, PostConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PostConfig::default();
//!     let summary = dry_run(&config).await?;
//!     for post in &summary.chunks {
//!         println!("{post}\n");
//!     }
//!     eprintln!("image: {} → {} bytes", summary.image.original_bytes, summary.image.final_bytes);
//!     Ok(())
//! }
//! ```
//!
//! The two engines work without any network:
//!
//! ```rust
//! use potd_poster::{segment, NoopObserver, WeightedLengthOracle};
//!
//! let caption = "word ".repeat(100);
//! let chunks = segment(&caption, &WeightedLengthOracle::default(), &NoopObserver).unwrap();
//! assert_eq!(chunks.len(), 2);
//! assert!(chunks[0].text.ends_with("..."));
//! assert!(chunks[1].text.starts_with("..."));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `potd` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! potd-poster = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod observer;
pub mod output;
pub mod pipeline;
pub mod post;
pub mod text;
pub mod transcode;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PostConfig, PostConfigBuilder, MAX_THREAD_POSTS};
pub use error::{OracleError, PotdError, SegmentError, TranscodeError};
pub use observer::{NoopObserver, Observer, RunObserver, TracingObserver};
pub use output::{ImageReport, RunSummary};
pub use pipeline::auth::{OAuthCredentials, OAuthSigner};
pub use pipeline::publish::{ApiEndpoints, Publisher, XClient};
pub use pipeline::source::{EntrySource, PotdEntry, DEFAULT_FEED_URL};
pub use post::{dry_run, plan_thread, prepare, run, PreparedRun};
pub use text::{
    segment, CharLimitOracle, Chunk, ValidityOracle, WeightedLengthConfig, WeightedLengthOracle,
    ELLIPSIS,
};
pub use transcode::{transcode, SourceImage, TranscodeOptions, TranscodeOutcome};
