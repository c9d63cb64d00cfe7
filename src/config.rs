//! Configuration for one posting run.
//!
//! Every run is controlled through [`PostConfig`], built via its
//! [`PostConfigBuilder`]. The struct is plain data apart from the optional
//! observer, so it can be cloned into the blocking transcode task and logged
//! with its secrets redacted.

use crate::error::PotdError;
use crate::observer::Observer;
use crate::pipeline::auth::OAuthCredentials;
use crate::pipeline::publish::ApiEndpoints;
use crate::pipeline::source::EntrySource;
use crate::transcode::{TranscodeOptions, DEFAULT_SIZE_CEILING, MAX_UPLOAD_DIMENSION};
use std::fmt;
use std::path::PathBuf;

/// Platform cap on the number of posts in one thread.
pub const MAX_THREAD_POSTS: usize = 99;

/// Configuration for a posting run.
///
/// Built via [`PostConfig::builder()`] or using [`PostConfig::default()`].
///
/// # Example
/// ```rust
/// use potd_poster::{EntrySource, PostConfig};
///
/// let config = PostConfig::builder()
///     .source(EntrySource::Feed { url: "https://example.org/potd.rss".into() })
///     .quality(85)
///     .size_ceiling_bytes(4_000_000)
///     .build()
///     .unwrap();
/// assert_eq!(config.quality, 85);
/// ```
#[derive(Clone)]
pub struct PostConfig {
    /// Where today's caption and image URL come from. Default: the Commons feed.
    pub source: EntrySource,

    /// Posting credentials. Only required by [`crate::run`].
    pub credentials: Option<OAuthCredentials>,

    /// JPEG quality for re-encoding, 1–100. Default: 90.
    pub quality: u8,

    /// Upload size ceiling in bytes. Default: 5 000 000.
    ///
    /// The platform rejects images above 5 MB. The transcoder only touches
    /// the image when it is at or above this size.
    pub size_ceiling_bytes: usize,

    /// Long-edge cap in pixels for re-encoded images. Default: 4096.
    pub max_dimension: u32,

    /// Width tolerance of the transcoder's binary search. Default: 10.
    pub search_tolerance: u32,

    /// Maximum posts in the thread. Range: 1–99. Default: 99.
    pub max_thread_posts: usize,

    /// Weighted length limit for each post. Default: 280.
    pub max_weighted_length: u32,

    /// Where the upload artefact is written. Default: `<cwd>/new.jpeg`.
    pub output_path: Option<PathBuf>,

    /// Keep the written image after a successful post. Default: false.
    pub keep_image: bool,

    /// Timeout for the source fetch and the image download, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Timeout for each posting API call, in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Posting API endpoints.
    pub endpoints: ApiEndpoints,

    /// Run event sink. If None, events only go to `tracing`.
    pub observer: Option<Observer>,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            source: EntrySource::default(),
            credentials: None,
            quality: 90,
            size_ceiling_bytes: DEFAULT_SIZE_CEILING,
            max_dimension: MAX_UPLOAD_DIMENSION,
            search_tolerance: 10,
            max_thread_posts: MAX_THREAD_POSTS,
            max_weighted_length: 280,
            output_path: None,
            keep_image: false,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            endpoints: ApiEndpoints::default(),
            observer: None,
        }
    }
}

impl fmt::Debug for PostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostConfig")
            .field("source", &self.source)
            .field("credentials", &self.credentials)
            .field("quality", &self.quality)
            .field("size_ceiling_bytes", &self.size_ceiling_bytes)
            .field("max_dimension", &self.max_dimension)
            .field("search_tolerance", &self.search_tolerance)
            .field("max_thread_posts", &self.max_thread_posts)
            .field("max_weighted_length", &self.max_weighted_length)
            .field("output_path", &self.output_path)
            .field("keep_image", &self.keep_image)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("endpoints", &self.endpoints)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn RunObserver>"))
            .finish()
    }
}

impl PostConfig {
    /// Create a new builder for `PostConfig`.
    pub fn builder() -> PostConfigBuilder {
        PostConfigBuilder {
            config: Self::default(),
        }
    }

    /// The transcoder knobs carried by this config.
    pub fn transcode_options(&self) -> TranscodeOptions {
        TranscodeOptions {
            quality: self.quality,
            size_ceiling_bytes: self.size_ceiling_bytes,
            max_dimension: self.max_dimension,
            tolerance: self.search_tolerance,
        }
    }
}

/// Builder for [`PostConfig`].
#[derive(Debug)]
pub struct PostConfigBuilder {
    config: PostConfig,
}

impl PostConfigBuilder {
    pub fn source(mut self, source: EntrySource) -> Self {
        self.config.source = source;
        self
    }

    pub fn credentials(mut self, credentials: OAuthCredentials) -> Self {
        self.config.credentials = Some(credentials);
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.config.quality = quality.clamp(1, 100);
        self
    }

    pub fn size_ceiling_bytes(mut self, bytes: usize) -> Self {
        self.config.size_ceiling_bytes = bytes;
        self
    }

    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px.max(1);
        self
    }

    pub fn search_tolerance(mut self, px: u32) -> Self {
        self.config.search_tolerance = px.max(2);
        self
    }

    pub fn max_thread_posts(mut self, n: usize) -> Self {
        self.config.max_thread_posts = n.clamp(1, MAX_THREAD_POSTS);
        self
    }

    pub fn max_weighted_length(mut self, units: u32) -> Self {
        self.config.max_weighted_length = units;
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_path = Some(path.into());
        self
    }

    pub fn keep_image(mut self, v: bool) -> Self {
        self.config.keep_image = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn endpoints(mut self, endpoints: ApiEndpoints) -> Self {
        self.config.endpoints = endpoints;
        self
    }

    pub fn observer(mut self, observer: Observer) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PostConfig, PotdError> {
        let c = &self.config;
        if c.size_ceiling_bytes == 0 {
            return Err(PotdError::InvalidConfig(
                "size ceiling must be a positive number of bytes".into(),
            ));
        }
        if c.max_weighted_length == 0 {
            return Err(PotdError::InvalidConfig(
                "weighted length limit must be positive".into(),
            ));
        }
        if c.download_timeout_secs == 0 || c.api_timeout_secs == 0 {
            return Err(PotdError::InvalidConfig("timeouts must be ≥ 1 second".into()));
        }
        if let EntrySource::Sheet {
            spreadsheet_id,
            range,
            api_key,
        } = &c.source
        {
            if spreadsheet_id.trim().is_empty() || range.trim().is_empty() {
                return Err(PotdError::InvalidConfig(
                    "sheet source needs a spreadsheet id and a range".into(),
                ));
            }
            if api_key.trim().is_empty() {
                return Err(PotdError::InvalidConfig(
                    "sheet source needs a Sheets API key".into(),
                ));
            }
        }
        if let EntrySource::Feed { url } = &c.source {
            if !crate::pipeline::download::is_url(url) {
                return Err(PotdError::InvalidConfig(format!(
                    "feed URL must be http(s), got {url:?}"
                )));
            }
        }
        Ok(self.config)
    }
}
