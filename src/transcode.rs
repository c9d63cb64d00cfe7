//! Size-constrained image transcoding.
//!
//! The posting platform rejects media above a byte ceiling (5 MB for images)
//! and above 4096 px on the long edge. [`transcode`] returns the source bytes
//! untouched when they already fit; otherwise it binary-searches the output
//! width, re-encoding as JPEG at a fixed quality, and keeps the widest
//! encoding that lands at or under the ceiling.
//!
//! ## Search
//!
//! ```text
//! bracket = [1, min(max_dimension, width)]     (narrowed further for portrait images)
//! while max - min >= tolerance:
//!     test = (min + max) / 2
//!     size(test) > ceiling  →  max = test
//!     otherwise             →  min = test, remember this encoding
//! ```
//!
//! Byte size grows with width at a fixed quality, which is what makes the
//! bisection valid. The 10 px tolerance bounds the search to about a dozen
//! encodes for a 4096 px source.

use crate::error::{PotdError, TranscodeError};
use crate::observer::RunObserver;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageFormat, ImageReader, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Platform limit on either edge of an uploaded image, in pixels.
pub const MAX_UPLOAD_DIMENSION: u32 = 4096;

/// Platform limit on the byte size of an uploaded image.
pub const DEFAULT_SIZE_CEILING: usize = 5_000_000;

/// Default file name of the upload artefact, relative to the working directory.
pub const OUTPUT_FILE_NAME: &str = "new.jpeg";

/// Raw encoded image bytes plus their decoded dimensions.
#[derive(Debug, Clone)]
pub struct SourceImage {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

impl SourceImage {
    /// Read the dimensions of `bytes` without decoding the pixels.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, TranscodeError> {
        let (width, height) = ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(|e| TranscodeError::Decode(image::ImageError::IoError(e)))?
            .into_dimensions()
            .map_err(TranscodeError::Decode)?;
        if width == 0 || height == 0 {
            return Err(TranscodeError::ZeroDimensions { width, height });
        }
        Ok(Self {
            bytes,
            width,
            height,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Knobs for [`transcode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeOptions {
    /// JPEG quality for every probe, passed through to the encoder. Default: 90.
    pub quality: u8,
    /// Inclusive byte ceiling for the result. Default: 5 000 000.
    pub size_ceiling_bytes: usize,
    /// Long-edge cap in pixels. Default: 4096.
    pub max_dimension: u32,
    /// Stop once the bracket is narrower than this many pixels. Default: 10.
    pub tolerance: u32,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            quality: 90,
            size_ceiling_bytes: DEFAULT_SIZE_CEILING,
            max_dimension: MAX_UPLOAD_DIMENSION,
            tolerance: 10,
        }
    }
}

/// The image chosen for upload.
#[derive(Debug, Clone)]
pub struct TranscodeOutcome {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// `false` when the source bytes are returned untouched.
    pub reencoded: bool,
    /// Number of encodes performed.
    pub probes: u32,
    /// Whether `bytes` respects the ceiling.
    pub within_ceiling: bool,
}

/// The binary-search bracket over output widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SearchBounds {
    min_width: u32,
    max_width: u32,
}

impl SearchBounds {
    fn span(&self) -> u32 {
        self.max_width.saturating_sub(self.min_width)
    }

    fn midpoint(&self) -> u32 {
        self.min_width + self.span() / 2
    }
}

struct Encoded {
    bytes: Vec<u8>,
    width: u32,
    height: u32,
}

/// Shrink `image` until its encoding fits `options.size_ceiling_bytes`.
///
/// Returns the original bytes when they are already below the ceiling.
/// Otherwise returns the widest accepted JPEG encoding; if the search
/// collapses without any accepted width the narrowest attempt is returned
/// with `within_ceiling = false` and the caller decides what to do with it.
///
/// # Errors
/// Any decode or encode failure. There is no fallback to the source bytes.
/// [`TranscodeError::AspectRatioTooExtreme`] when even a 1 px wide output
/// would exceed `options.max_dimension` in height.
pub fn transcode(
    image: &SourceImage,
    options: &TranscodeOptions,
    observer: &dyn RunObserver,
) -> Result<TranscodeOutcome, TranscodeError> {
    let ceiling = options.size_ceiling_bytes;
    let original_size = image.len();
    observer.on_transcode_start(original_size, ceiling, options.quality);

    if original_size < ceiling {
        info!(size = original_size, "no image processing needed, file size is already below limit");
        observer.on_transcode_complete(image.width, image.height, original_size, false);
        return Ok(TranscodeOutcome {
            bytes: image.bytes.clone(),
            width: image.width,
            height: image.height,
            reencoded: false,
            probes: 0,
            within_ceiling: true,
        });
    }

    let max_width = max_search_width(image.width, image.height, options.max_dimension);
    if height_at(image.width, image.height, max_width) > options.max_dimension {
        return Err(TranscodeError::AspectRatioTooExtreme {
            width: image.width,
            height: image.height,
            max_dimension: options.max_dimension,
        });
    }

    let pixels = image::load_from_memory(&image.bytes)
        .map_err(TranscodeError::Decode)?
        .to_rgb8();

    let tolerance = options.tolerance.max(2);
    let mut bounds = SearchBounds {
        min_width: 1,
        max_width,
    };
    let mut best: Option<Encoded> = None;
    let mut narrowest_rejected: Option<Encoded> = None;
    let mut probes = 0u32;

    info!(max_width = bounds.max_width, "starting binary search");
    while bounds.span() >= tolerance {
        let test_width = bounds.midpoint();
        let encoded = encode_at(&pixels, test_width, options.quality)?;
        probes += 1;
        let size = encoded.bytes.len();
        observer.on_transcode_probe(bounds.min_width, bounds.max_width, test_width, size);

        if size > ceiling {
            bounds.max_width = test_width;
            narrowest_rejected = Some(encoded);
        } else {
            bounds.min_width = test_width;
            best = Some(encoded);
        }
    }

    let (chosen, within_ceiling) = match (best, narrowest_rejected) {
        (Some(best), _) => (best, true),
        (None, Some(rejected)) => (rejected, false),
        (None, None) => {
            let encoded = encode_at(&pixels, bounds.max_width, options.quality)?;
            probes += 1;
            let fits = encoded.bytes.len() <= ceiling;
            (encoded, fits)
        }
    };

    info!(
        size = chosen.bytes.len(),
        width = chosen.width,
        height = chosen.height,
        probes,
        within_ceiling,
        "compression finished"
    );
    observer.on_transcode_complete(chosen.width, chosen.height, chosen.bytes.len(), true);

    Ok(TranscodeOutcome {
        bytes: chosen.bytes,
        width: chosen.width,
        height: chosen.height,
        reencoded: true,
        probes,
        within_ceiling,
    })
}

/// Upper end of the width bracket: the source width capped so that neither
/// edge of the output exceeds `max_dimension`.
pub fn max_search_width(width: u32, height: u32, max_dimension: u32) -> u32 {
    let mut max_width = width.min(max_dimension);
    if height > width {
        let proportional = (u64::from(max_dimension) * u64::from(width) / u64::from(height)) as u32;
        max_width = max_width.min(proportional.max(1));
    }
    max_width.max(1)
}

/// Height that keeps the source aspect ratio at `target_width`.
fn scaled_height(pixels: &RgbImage, target_width: u32) -> u32 {
    let (w, h) = pixels.dimensions();
    height_at(w, h, target_width)
}

fn height_at(width: u32, height: u32, target_width: u32) -> u32 {
    let scaled = (f64::from(height) * f64::from(target_width) / f64::from(width)).round() as u32;
    scaled.max(1)
}

fn encode_at(pixels: &RgbImage, width: u32, quality: u8) -> Result<Encoded, TranscodeError> {
    let height = scaled_height(pixels, width);
    let resized = imageops::resize(pixels, width, height, FilterType::Lanczos3);

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&resized)
        .map_err(|source| TranscodeError::Encode { width, source })?;

    debug!(width, height, size = buf.len(), "re-encoded");
    Ok(Encoded {
        bytes: buf,
        width,
        height,
    })
}

/// MIME type and file extension of encoded image bytes. Unrecognised bytes
/// are reported as JPEG, the only format the search produces.
pub fn media_type(bytes: &[u8]) -> (&'static str, &'static str) {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) | Err(_) => ("image/jpeg", "jpeg"),
        Ok(format) => (
            format.to_mime_type(),
            format.extensions_str().first().copied().unwrap_or("bin"),
        ),
    }
}

/// Upload file name for `bytes`: `new.jpeg`, or `new.<ext>` for a
/// passed-through source in another format.
pub fn upload_file_name(bytes: &[u8]) -> String {
    let (_, extension) = media_type(bytes);
    let stem = OUTPUT_FILE_NAME
        .rsplit_once('.')
        .map_or(OUTPUT_FILE_NAME, |(stem, _)| stem);
    format!("{stem}.{extension}")
}

/// `<cwd>/new.jpeg`, the default location of the upload artefact.
pub fn default_output_path() -> Result<PathBuf, PotdError> {
    let cwd = std::env::current_dir()
        .map_err(|e| PotdError::Internal(format!("could not get current working directory: {e}")))?;
    Ok(cwd.join(OUTPUT_FILE_NAME))
}

/// Write the chosen image to `path`.
pub fn persist(outcome: &TranscodeOutcome, path: &Path) -> Result<(), PotdError> {
    std::fs::write(path, &outcome.bytes).map_err(|source| PotdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), size = outcome.bytes.len(), "wrote image to disk");
    Ok(())
}
