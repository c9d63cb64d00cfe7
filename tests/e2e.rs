//! End-to-end integration tests for potd-poster.
//!
//! These tests fetch the live Commons feed and download today's picture.
//! They are gated behind the `E2E_ENABLED` environment variable so they do
//! not run in CI unless explicitly requested. Nothing is ever posted.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use potd_poster::pipeline::download::download_image;
use potd_poster::pipeline::source::fetch_entry;
use potd_poster::{dry_run, EntrySource, PostConfig, SourceImage};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test if E2E_ENABLED is not set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_feed_entry_is_well_formed() {
    e2e_skip_unless_enabled!();

    let entry = fetch_entry(&EntrySource::default(), 60)
        .await
        .expect("feed fetch");
    println!("caption: {}", entry.description);
    println!("image:   {}", entry.download_url);

    assert!(!entry.description.trim().is_empty());
    assert!(!entry.description.contains('<'), "tags left in caption");
    assert!(entry.download_url.starts_with("https://"));
    assert!(!entry.download_url.contains("/thumb/"));
}

#[tokio::test]
async fn test_todays_image_decodes() {
    e2e_skip_unless_enabled!();

    let entry = fetch_entry(&EntrySource::default(), 60)
        .await
        .expect("feed fetch");
    let bytes = download_image(&entry.download_url, 120)
        .await
        .expect("download");
    let image = SourceImage::from_bytes(bytes).expect("decodable image");
    let (w, h) = image.dimensions();
    println!("{} bytes, {w}×{h}", image.len());
    assert!(w > 0 && h > 0);
}

#[tokio::test]
async fn test_dry_run_produces_postable_thread() {
    e2e_skip_unless_enabled!();

    let dir = tempfile::tempdir().unwrap();
    let config = PostConfig::builder()
        .output_path(dir.path().join("new.jpeg"))
        .build()
        .unwrap();

    let summary = dry_run(&config).await.expect("dry run");
    println!("{}", serde_json::to_string_pretty(&summary).unwrap());

    assert!(summary.dry_run);
    assert!(!summary.chunks.is_empty());
    assert!(summary.chunks.len() <= 99);
    assert!(summary.post_ids.is_empty());
    assert!(summary.image.final_bytes <= 5_000_000);

    let path = summary.image.path.expect("image kept on dry run");
    assert_eq!(
        std::fs::metadata(&path).unwrap().len() as usize,
        summary.image.final_bytes
    );
}

#[tokio::test]
async fn test_unreachable_feed_fails_cleanly() {
    e2e_skip_unless_enabled!();

    let config = PostConfig::builder()
        .source(EntrySource::Feed {
            url: "https://commons.wikimedia.org/this-feed-does-not-exist.rss".into(),
        })
        .build()
        .unwrap();
    let err = dry_run(&config).await.unwrap_err();
    println!("error: {err}");
    assert!(matches!(
        err,
        potd_poster::PotdError::SourceFetchFailed { .. } | potd_poster::PotdError::SourceMalformed { .. }
    ));
}
