//! Error types for the potd-poster library.
//!
//! Errors are layered the same way the run is:
//!
//! * [`SegmentError`], [`OracleError`] and [`TranscodeError`] belong to the
//!   two pure engines ([`crate::text::segment`] and [`crate::transcode`]).
//!   They carry enough context to explain *which* word or *which* width
//!   failed without knowing anything about HTTP or the posting API.
//!
//! * [`PotdError`] is the **fatal** error of a whole run. Every stage of
//!   [`crate::post::run`] returns it, and the engine errors convert into it
//!   via `#[from]`.
//!
//! There is no non-fatal tier: a run either posts the complete thread or
//! posts nothing after the failing stage. Nothing is retried.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by a posting run.
#[derive(Debug, Error)]
pub enum PotdError {
    // ── Source errors ─────────────────────────────────────────────────────
    /// The entry source (sheet or feed) could not be fetched.
    #[error("Failed to fetch today's entry from '{source_name}': {reason}")]
    SourceFetchFailed { source_name: String, reason: String },

    /// The entry source answered, but not in the expected shape.
    #[error("Entry source returned malformed data: {detail}")]
    SourceMalformed { detail: String },

    // ── Download errors ───────────────────────────────────────────────────
    /// HTTP download of the image failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The caption could not be split into valid posts.
    #[error(transparent)]
    Segment(#[from] SegmentError),

    /// The image could not be decoded or re-encoded.
    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    /// Segmentation produced more posts than one thread may hold.
    #[error("Caption produced {count} posts, more than the {max} allowed in one thread")]
    ThreadTooLong { count: usize, max: usize },

    /// The binary search collapsed without finding an encoding under the ceiling.
    #[error("Could not shrink the image below {ceiling} bytes (best attempt: {size} bytes at {width}px wide)")]
    ImageOverCeiling {
        size: usize,
        ceiling: usize,
        width: u32,
    },

    // ── Posting API errors ────────────────────────────────────────────────
    /// `run` was called without OAuth credentials.
    #[error("Posting credentials are not configured.\nSet POTD_CONSUMER_KEY, POTD_CONSUMER_SECRET, POTD_ACCESS_TOKEN and POTD_ACCESS_TOKEN_SECRET, or use --dry-run.")]
    MissingCredentials,

    /// The HTTP request to the posting API could not be sent.
    #[error("Request to '{endpoint}' failed: {reason}")]
    ApiRequestFailed { endpoint: String, reason: String },

    /// The posting API answered with a status other than 200/201.
    #[error("Bad HTTP status {status} from '{endpoint}': {body}")]
    ApiError {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The posting API answered 2xx but the body could not be decoded.
    #[error("Could not decode response from '{endpoint}': {detail}")]
    ApiResponseMalformed { endpoint: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write the transcoded image to its output path.
    #[error("Failed to write image file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of a [`crate::text::ValidityOracle`] to answer at all.
///
/// A `false` answer is not an error; this is for oracles backed by
/// something that can break (a remote service, a parser).
#[derive(Debug, Clone, Error)]
#[error("Validity oracle failed on {candidate:?}: {reason}")]
pub struct OracleError {
    pub candidate: String,
    pub reason: String,
}

impl OracleError {
    pub fn new(candidate: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while splitting a caption into posts.
#[derive(Debug, Clone, Error)]
pub enum SegmentError {
    /// The caption contains no words at all.
    #[error("Caption is empty; nothing to post")]
    EmptyCaption,

    /// A single word, even with its continuation markers, is rejected by the oracle.
    #[error("Word {word:?} cannot fit into a post by itself (tried {candidate:?})")]
    WordTooLong { word: String, candidate: String },

    /// The remaining word count did not shrink during an iteration.
    #[error("Segmentation made no progress: {remaining} words remain, previously {previous}")]
    NoProgress { remaining: usize, previous: usize },

    /// The oracle itself failed.
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// Errors raised while re-encoding an image.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The source bytes are not a decodable image.
    #[error("Could not decode source image: {0}")]
    Decode(#[source] image::ImageError),

    /// Re-encoding at a probe width failed.
    #[error("Failed to re-encode image at {width}px wide: {source}")]
    Encode {
        width: u32,
        #[source]
        source: image::ImageError,
    },

    /// The decoded image has a zero-sized dimension.
    #[error("Source image has zero size ({width}x{height})")]
    ZeroDimensions { width: u32, height: u32 },

    /// Even one pixel wide, the output would be taller than the long-edge cap.
    #[error("Source image {width}x{height} is too narrow to fit within {max_dimension}px on the long edge")]
    AspectRatioTooExtreme {
        width: u32,
        height: u32,
        max_dimension: u32,
    },
}
