//! Result types returned by [`crate::run`] and [`crate::dry_run`].

use crate::pipeline::source::PotdEntry;
use crate::transcode::TranscodeOutcome;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a run did, in a shape that serialises cleanly for `--json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// The entry fetched from the source.
    pub entry: PotdEntry,
    /// The planned (or published) post texts, in thread order.
    pub chunks: Vec<String>,
    /// What happened to the image.
    pub image: ImageReport,
    /// Media id returned by the upload. None on a dry run.
    pub media_id: Option<String>,
    /// Ids of the published posts, root first. Empty on a dry run.
    pub post_ids: Vec<String>,
    /// True when nothing was posted.
    pub dry_run: bool,
    /// Wall-clock time of the whole run.
    pub duration_ms: u64,
}

/// Image statistics for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReport {
    /// Size of the downloaded image.
    pub original_bytes: usize,
    /// Size of the uploaded (or would-be uploaded) image.
    pub final_bytes: usize,
    pub width: u32,
    pub height: u32,
    /// False when the download was used untouched.
    pub reencoded: bool,
    /// Number of trial encodes.
    pub probes: u32,
    /// Where the image was written. None once it has been removed.
    pub path: Option<PathBuf>,
}

impl ImageReport {
    pub fn new(original_bytes: usize, outcome: &TranscodeOutcome, path: Option<PathBuf>) -> Self {
        Self {
            original_bytes,
            final_bytes: outcome.bytes.len(),
            width: outcome.width,
            height: outcome.height,
            reencoded: outcome.reencoded,
            probes: outcome.probes,
            path,
        }
    }

    /// Fraction of the original size saved by re-encoding.
    pub fn savings(&self) -> f64 {
        if self.original_bytes == 0 {
            return 0.0;
        }
        1.0 - self.final_bytes as f64 / self.original_bytes as f64
    }
}
