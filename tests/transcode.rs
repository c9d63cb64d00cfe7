//! Image transcoding behaviour through the public API.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use potd_poster::transcode::{persist, OUTPUT_FILE_NAME};
use potd_poster::{transcode, NoopObserver, RunObserver, SourceImage, TranscodeOptions};
use std::io::Cursor;
use std::sync::Mutex;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Incompressible pixels so encoded size tracks width.
fn noise(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let v = (x.wrapping_mul(2_246_822_519) ^ y.wrapping_mul(3_266_489_917))
            .wrapping_mul(668_265_263);
        Rgb([(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8])
    })
}

fn encode(img: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), format)
        .expect("encode fixture");
    buf
}

#[derive(Default)]
struct Recorder {
    starts: Mutex<Vec<(usize, usize, u8)>>,
    probes: Mutex<Vec<(u32, u32, u32, usize)>>,
    completes: Mutex<Vec<(u32, u32, usize, bool)>>,
}

impl RunObserver for Recorder {
    fn on_transcode_start(&self, original_size: usize, ceiling: usize, quality: u8) {
        self.starts.lock().unwrap().push((original_size, ceiling, quality));
    }

    fn on_transcode_probe(&self, min_width: u32, max_width: u32, test_width: u32, size: usize) {
        self.probes
            .lock()
            .unwrap()
            .push((min_width, max_width, test_width, size));
    }

    fn on_transcode_complete(&self, width: u32, height: u32, size: usize, reencoded: bool) {
        self.completes
            .lock()
            .unwrap()
            .push((width, height, size, reencoded));
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn test_search_narrows_and_keeps_widest_fit() {
    let bytes = encode(noise(800, 600), ImageFormat::Png);
    let source = SourceImage::from_bytes(bytes.clone()).unwrap();
    let ceiling = 80_000;
    let options = TranscodeOptions {
        size_ceiling_bytes: ceiling,
        ..TranscodeOptions::default()
    };
    let recorder = Recorder::default();

    let out = transcode(&source, &options, &recorder).unwrap();

    assert_eq!(*recorder.starts.lock().unwrap(), vec![(bytes.len(), ceiling, 90)]);

    let probes = recorder.probes.lock().unwrap().clone();
    assert!(!probes.is_empty());
    assert_eq!(probes.len() as u32, out.probes);
    assert_eq!((probes[0].0, probes[0].1), (1, 800));

    for pair in probes.windows(2) {
        let (min, max, test, size) = pair[0];
        let (next_min, next_max, _, _) = pair[1];
        assert!(min <= test && test <= max);
        if size > ceiling {
            assert_eq!((next_min, next_max), (min, test));
        } else {
            assert_eq!((next_min, next_max), (test, max));
        }
    }

    let widest_fit = probes
        .iter()
        .filter(|p| p.3 <= ceiling)
        .map(|p| p.2)
        .max()
        .expect("some probe fits");
    assert_eq!(out.width, widest_fit);
    assert!(out.within_ceiling);
    assert!(out.bytes.len() <= ceiling);

    let completes = recorder.completes.lock().unwrap();
    assert_eq!(completes.len(), 1);
    assert_eq!(completes[0], (out.width, out.height, out.bytes.len(), true));
}

#[test]
fn test_jpeg_under_ceiling_passes_through() {
    let bytes = encode(noise(120, 80), ImageFormat::Jpeg);
    let source = SourceImage::from_bytes(bytes.clone()).unwrap();
    assert_eq!(source.dimensions(), (120, 80));

    let recorder = Recorder::default();
    let options = TranscodeOptions {
        size_ceiling_bytes: bytes.len() + 1,
        ..TranscodeOptions::default()
    };
    let out = transcode(&source, &options, &recorder).unwrap();

    assert_eq!(out.bytes, bytes);
    assert!(!out.reencoded);
    assert!(recorder.probes.lock().unwrap().is_empty());
    assert!(!recorder.completes.lock().unwrap()[0].3);
}

#[test]
fn test_size_equal_to_ceiling_is_reencoded() {
    let bytes = encode(noise(120, 80), ImageFormat::Png);
    let source = SourceImage::from_bytes(bytes.clone()).unwrap();
    let options = TranscodeOptions {
        size_ceiling_bytes: bytes.len(),
        ..TranscodeOptions::default()
    };
    let out = transcode(&source, &options, &NoopObserver).unwrap();
    assert!(out.reencoded);
    assert!(out.bytes.len() <= bytes.len());
}

#[test]
fn test_lower_quality_keeps_more_pixels() {
    let source = SourceImage::from_bytes(encode(noise(900, 600), ImageFormat::Png)).unwrap();
    let at = |quality| {
        let options = TranscodeOptions {
            quality,
            size_ceiling_bytes: 60_000,
            ..TranscodeOptions::default()
        };
        transcode(&source, &options, &NoopObserver).unwrap()
    };
    let low = at(30);
    let high = at(95);
    assert!(low.within_ceiling && high.within_ceiling);
    assert!(low.width > high.width, "q30 {} vs q95 {}", low.width, high.width);
}

#[test]
fn test_persisted_image_round_trips_from_disk() {
    let source = SourceImage::from_bytes(encode(noise(500, 700), ImageFormat::Png)).unwrap();
    let options = TranscodeOptions {
        size_ceiling_bytes: 40_000,
        max_dimension: 350,
        ..TranscodeOptions::default()
    };
    let out = transcode(&source, &options, &NoopObserver).unwrap();
    assert!(out.height <= 350, "height {}", out.height);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(OUTPUT_FILE_NAME);
    persist(&out, &path).unwrap();

    let reloaded = image::open(&path).unwrap();
    assert_eq!((reloaded.width(), reloaded.height()), (out.width, out.height));
    assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, out.bytes.len());
}
