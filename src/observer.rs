//! Observer trait for structured run events.
//!
//! Both engines and the orchestrator report what they are doing through an
//! injected [`RunObserver`] instead of a process-wide logger. Inject one via
//! [`crate::config::PostConfigBuilder::observer`]; when none is configured
//! the run uses [`TracingObserver`], which turns every event into a
//! `tracing` event with key/value fields.
//!
//! # Example
//!
//! ```rust
//! use potd_poster::{Chunk, RunObserver};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingObserver {
//!     chunks: AtomicUsize,
//! }
//!
//! impl RunObserver for CountingObserver {
//!     fn on_chunk(&self, chunk: &Chunk) {
//!         self.chunks.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("chunk {}: {} chars", chunk.index, chunk.text.chars().count());
//!     }
//! }
//! ```

use crate::text::Chunk;
use std::sync::Arc;
use tracing::{debug, info};

/// Receives structured events from a posting run.
///
/// Implementations must be `Send + Sync` because the transcode stage runs on
/// a blocking worker thread. All methods have default no-op implementations
/// so callers only override what they care about.
pub trait RunObserver: Send + Sync {
    /// Called for every chunk the segmenter emits, in order.
    fn on_chunk(&self, chunk: &Chunk) {
        let _ = chunk;
    }

    /// Called once when segmentation finishes successfully.
    fn on_segmentation_complete(&self, chunk_count: usize) {
        let _ = chunk_count;
    }

    /// Called before the transcoder looks at the source image.
    ///
    /// # Arguments
    /// * `original_size` — byte length of the source encoding
    /// * `ceiling`       — byte ceiling the result must respect
    /// * `quality`       — JPEG quality used for every probe
    fn on_transcode_start(&self, original_size: usize, ceiling: usize, quality: u8) {
        let _ = (original_size, ceiling, quality);
    }

    /// Called after every binary-search probe.
    ///
    /// # Arguments
    /// * `min_width`, `max_width` — bracket *before* the probe was applied
    /// * `test_width`             — the width that was encoded
    /// * `size`                   — resulting byte length
    fn on_transcode_probe(&self, min_width: u32, max_width: u32, test_width: u32, size: usize) {
        let _ = (min_width, max_width, test_width, size);
    }

    /// Called once with the final image, re-encoded or not.
    fn on_transcode_complete(&self, width: u32, height: u32, size: usize, reencoded: bool) {
        let _ = (width, height, size, reencoded);
    }

    /// Called after each post of the thread is published.
    ///
    /// # Arguments
    /// * `index` — 1-indexed position in the thread
    /// * `total` — thread length
    /// * `id`    — identifier assigned by the posting API
    fn on_post_published(&self, index: usize, total: usize, id: &str) {
        let _ = (index, total, id);
    }
}

/// Discards every event.
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Forwards every event to `tracing` with structured fields.
///
/// This is the default observer when none is configured.
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn on_chunk(&self, chunk: &Chunk) {
        info!(
            index = chunk.index,
            first = chunk.is_first,
            last = chunk.is_last,
            text = %chunk.text,
            "generated post"
        );
    }

    fn on_segmentation_complete(&self, chunk_count: usize) {
        info!(chunk_count, "finished generating posts");
    }

    fn on_transcode_start(&self, original_size: usize, ceiling: usize, quality: u8) {
        info!(original_size, ceiling, quality, "starting compression");
    }

    fn on_transcode_probe(&self, min_width: u32, max_width: u32, test_width: u32, size: usize) {
        debug!(min_width, max_width, test_width, size, "probed width");
    }

    fn on_transcode_complete(&self, width: u32, height: u32, size: usize, reencoded: bool) {
        info!(width, height, size, reencoded, "image ready for upload");
    }

    fn on_post_published(&self, index: usize, total: usize, id: &str) {
        info!(index, total, id, "post published");
    }
}

/// Shared observer handle, as stored in [`crate::config::PostConfig`].
pub type Observer = Arc<dyn RunObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingObserver {
        chunks: AtomicUsize,
        probes: Mutex<Vec<u32>>,
        posts: Mutex<Vec<String>>,
    }

    impl RunObserver for TrackingObserver {
        fn on_chunk(&self, _chunk: &Chunk) {
            self.chunks.fetch_add(1, Ordering::SeqCst);
        }

        fn on_transcode_probe(&self, _min: u32, _max: u32, test_width: u32, _size: usize) {
            self.probes.lock().unwrap().push(test_width);
        }

        fn on_post_published(&self, _index: usize, _total: usize, id: &str) {
            self.posts.lock().unwrap().push(id.to_string());
        }
    }

    fn chunk(index: usize) -> Chunk {
        Chunk {
            index,
            text: "hello".into(),
            is_first: index == 1,
            is_last: false,
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let obs = NoopObserver;
        obs.on_chunk(&chunk(1));
        obs.on_segmentation_complete(1);
        obs.on_transcode_start(10, 5, 90);
        obs.on_transcode_probe(1, 100, 50, 7);
        obs.on_transcode_complete(50, 25, 4, true);
        obs.on_post_published(1, 1, "123");
    }

    #[test]
    fn tracing_observer_does_not_panic_without_subscriber() {
        let obs = TracingObserver;
        obs.on_chunk(&chunk(2));
        obs.on_transcode_complete(4096, 2048, 4_999_999, true);
    }

    #[test]
    fn tracking_observer_receives_events() {
        let tracker = TrackingObserver::default();
        tracker.on_chunk(&chunk(1));
        tracker.on_chunk(&chunk(2));
        tracker.on_transcode_probe(1, 4096, 2048, 9_000_000);
        tracker.on_transcode_probe(1, 2048, 1024, 3_000_000);
        tracker.on_post_published(1, 2, "1001");
        tracker.on_post_published(2, 2, "1002");

        assert_eq!(tracker.chunks.load(Ordering::SeqCst), 2);
        assert_eq!(*tracker.probes.lock().unwrap(), vec![2048, 1024]);
        assert_eq!(*tracker.posts.lock().unwrap(), vec!["1001", "1002"]);
    }

    #[test]
    fn arc_dyn_observer_works() {
        let obs: Observer = Arc::new(NoopObserver);
        obs.on_segmentation_complete(3);
    }
}
