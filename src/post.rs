//! Run orchestration: fetch, plan, download, shrink, publish.
//!
//! ## Why split `prepare` from `run`?
//!
//! Everything up to the planned thread needs no credentials and has no
//! side effect besides the written image. [`prepare`] does exactly that
//! part, which is what [`dry_run`] reports and what [`run`] builds on.
//! A failure anywhere aborts the run; nothing is retried and nothing is
//! partially posted before the image and thread are known to be valid.

use crate::config::PostConfig;
use crate::error::PotdError;
use crate::observer::{Observer, RunObserver, TracingObserver};
use crate::output::{ImageReport, RunSummary};
use crate::pipeline::download::download_image;
use crate::pipeline::publish::{publish_thread, Publisher, XClient};
use crate::pipeline::source::{fetch_entry, PotdEntry};
use crate::text::{segment, Chunk, ValidityOracle, WeightedLengthOracle};
use crate::transcode::{
    default_output_path, persist, transcode, upload_file_name, SourceImage, TranscodeOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Everything known before the first API call.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub entry: PotdEntry,
    pub chunks: Vec<Chunk>,
    pub image: TranscodeOutcome,
    /// Size of the downloaded image.
    pub original_bytes: usize,
    /// Where the upload artefact was written.
    pub image_path: PathBuf,
}

/// Segment `caption` and reject threads longer than `max_posts`.
pub fn plan_thread<O>(
    caption: &str,
    oracle: &O,
    max_posts: usize,
    observer: &dyn RunObserver,
) -> Result<Vec<Chunk>, PotdError>
where
    O: ValidityOracle + ?Sized,
{
    let chunks = segment(caption, oracle, observer)?;
    if chunks.len() > max_posts {
        return Err(PotdError::ThreadTooLong {
            count: chunks.len(),
            max: max_posts,
        });
    }
    Ok(chunks)
}

/// Fetch today's entry, plan the thread, then download and shrink the image
/// and write it to disk. Needs no credentials.
///
/// The image is written last, so a failed run leaves nothing on disk.
pub async fn prepare(config: &PostConfig) -> Result<PreparedRun, PotdError> {
    let observer = resolve_observer(config);

    // ── Step 1: Today's entry ────────────────────────────────────────────
    let entry = fetch_entry(&config.source, config.download_timeout_secs).await?;

    // ── Step 2: Plan the thread ──────────────────────────────────────────
    let oracle = WeightedLengthOracle::with_limit(config.max_weighted_length);
    let chunks = plan_thread(
        &entry.description,
        &oracle,
        config.max_thread_posts,
        observer.as_ref(),
    )?;
    info!(posts = chunks.len(), "thread planned");

    // ── Step 3: Download ─────────────────────────────────────────────────
    let bytes = download_image(&entry.download_url, config.download_timeout_secs).await?;
    let original_bytes = bytes.len();

    // ── Step 4: Transcode (CPU-bound) ────────────────────────────────────
    let options = config.transcode_options();
    let task_observer = Arc::clone(&observer);
    let image = tokio::task::spawn_blocking(move || {
        let source = SourceImage::from_bytes(bytes)?;
        transcode(&source, &options, task_observer.as_ref())
    })
    .await
    .map_err(|e| PotdError::Internal(format!("transcode task failed: {e}")))??;

    if !image.within_ceiling {
        return Err(PotdError::ImageOverCeiling {
            size: image.bytes.len(),
            ceiling: config.size_ceiling_bytes,
            width: image.width,
        });
    }

    // ── Step 5: Persist ──────────────────────────────────────────────────
    let image_path = match &config.output_path {
        Some(path) => path.clone(),
        None => default_output_path()?,
    };
    persist(&image, &image_path)?;

    Ok(PreparedRun {
        entry,
        chunks,
        image,
        original_bytes,
        image_path,
    })
}

/// Prepare, then upload the image and publish the thread.
///
/// The written image is removed afterwards, whether posting succeeded or
/// not, unless `keep_image` is set.
///
/// # Errors
/// [`PotdError::MissingCredentials`] before any network access when the
/// config has no complete credentials; otherwise the first stage failure.
pub async fn run(config: &PostConfig) -> Result<RunSummary, PotdError> {
    let start = Instant::now();
    let credentials = config
        .credentials
        .clone()
        .ok_or(PotdError::MissingCredentials)?;
    let client = XClient::new(credentials, config.endpoints.clone(), config.api_timeout_secs)?;

    let prepared = prepare(config).await?;
    let observer = resolve_observer(config);

    let published = publish(&client, &prepared, observer.as_ref()).await;

    let image_path = if config.keep_image {
        Some(prepared.image_path.clone())
    } else {
        if let Err(e) = tokio::fs::remove_file(&prepared.image_path).await {
            warn!(path = %prepared.image_path.display(), error = %e, "could not remove image");
        }
        None
    };

    let (media_id, post_ids) = published?;
    info!(posts = post_ids.len(), "thread published");

    Ok(summarise(
        prepared,
        image_path,
        Some(media_id),
        post_ids,
        false,
        start,
    ))
}

/// Prepare only; nothing is posted and the written image is kept.
pub async fn dry_run(config: &PostConfig) -> Result<RunSummary, PotdError> {
    let start = Instant::now();
    let prepared = prepare(config).await?;
    let path = Some(prepared.image_path.clone());
    Ok(summarise(prepared, path, None, Vec::new(), true, start))
}

async fn publish<P: Publisher>(
    publisher: &P,
    prepared: &PreparedRun,
    observer: &dyn RunObserver,
) -> Result<(String, Vec<String>), PotdError> {
    let file_name = upload_file_name(&prepared.image.bytes);
    let media_id = publisher
        .upload_media(prepared.image.bytes.clone(), &file_name)
        .await?;
    let post_ids = publish_thread(publisher, &prepared.chunks, &media_id, observer).await?;
    Ok((media_id, post_ids))
}

fn summarise(
    prepared: PreparedRun,
    image_path: Option<PathBuf>,
    media_id: Option<String>,
    post_ids: Vec<String>,
    dry_run: bool,
    start: Instant,
) -> RunSummary {
    RunSummary {
        image: ImageReport::new(prepared.original_bytes, &prepared.image, image_path),
        chunks: prepared.chunks.into_iter().map(|c| c.text).collect(),
        entry: prepared.entry,
        media_id,
        post_ids,
        dry_run,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

fn resolve_observer(config: &PostConfig) -> Observer {
    config
        .observer
        .clone()
        .unwrap_or_else(|| Arc::new(TracingObserver))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SegmentError;
    use crate::observer::NoopObserver;
    use crate::pipeline::auth::OAuthCredentials;
    use crate::pipeline::source::EntrySource;
    use crate::text::CharLimitOracle;
    use crate::transcode::OUTPUT_FILE_NAME;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a one-item feed captioned `caption` at `/feed.rss` and a small
    /// PNG at every other path.
    /// Returns the feed URL and the server's base URL.
    async fn serve_feed(caption: &str) -> (String, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let feed = format!(
            r#"<?xml version="1.0"?>
<rss version="2.0"><channel><item>
<description>&lt;div&gt;&lt;img src="{base}/picture.png" /&gt;&lt;div class="description en" lang="en"&gt;{caption}&lt;/div&gt;&lt;/div&gt;</description>
</item></channel></rss>"#
        );
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_fn(64, 48, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 5) as u8, (x ^ y) as u8])
        }))
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut request = vec![0u8; 4096];
                let n = socket.read(&mut request).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&request[..n]).to_string();
                let (content_type, body) = if head.starts_with("GET /feed.rss") {
                    ("application/rss+xml", feed.clone().into_bytes())
                } else {
                    ("image/png", png.clone())
                };
                let header = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(header.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("{base}/feed.rss"), base)
    }

    fn local_config(feed_url: String, output: PathBuf) -> PostConfig {
        PostConfig::builder()
            .source(EntrySource::Feed { url: feed_url })
            .credentials(OAuthCredentials::new("ck", "cs", "at", "ats"))
            .output_path(output)
            .build()
            .unwrap()
    }

    #[test]
    fn short_caption_is_one_post() {
        let chunks = plan_thread(
            "A bee on a flower.",
            &WeightedLengthOracle::default(),
            99,
            &NoopObserver,
        )
        .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "A bee on a flower.");
    }

    #[test]
    fn long_thread_is_rejected() {
        let caption = "word ".repeat(50);
        let err = plan_thread(&caption, &CharLimitOracle::new(12), 5, &NoopObserver).unwrap_err();
        match err {
            PotdError::ThreadTooLong { count, max } => {
                assert!(count > 5);
                assert_eq!(max, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn thread_at_the_cap_is_accepted() {
        let caption = "word ".repeat(50);
        let chunks = plan_thread(&caption, &CharLimitOracle::new(12), 99, &NoopObserver).unwrap();
        assert!(chunks.len() <= 99);
        let again =
            plan_thread(&caption, &CharLimitOracle::new(12), chunks.len(), &NoopObserver).unwrap();
        assert_eq!(again, chunks);
    }

    #[test]
    fn segment_errors_surface_as_run_errors() {
        let err = plan_thread("   ", &WeightedLengthOracle::default(), 99, &NoopObserver).unwrap_err();
        assert!(matches!(err, PotdError::Segment(_)));
    }

    #[tokio::test]
    async fn run_without_credentials_fails_before_network() {
        let config = PostConfig::builder()
            .source(crate::pipeline::source::EntrySource::Feed {
                url: "http://127.0.0.1:9/unreachable.rss".into(),
            })
            .build()
            .unwrap();
        let err = run(&config).await.unwrap_err();
        assert!(matches!(err, PotdError::MissingCredentials));
    }

    #[tokio::test]
    async fn caption_failure_leaves_no_image_on_disk() {
        let (feed_url, _) = serve_feed(&"x".repeat(400)).await;
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join(OUTPUT_FILE_NAME);

        let err = run(&local_config(feed_url, output.clone())).await.unwrap_err();

        assert!(
            matches!(err, PotdError::Segment(SegmentError::WordTooLong { .. })),
            "unexpected error: {err:?}"
        );
        assert!(!output.exists(), "image left at {}", output.display());
    }

    #[tokio::test]
    async fn dry_run_against_local_feed_keeps_image() {
        let (feed_url, base) = serve_feed("A small test picture.").await;
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join(OUTPUT_FILE_NAME);

        let summary = dry_run(&local_config(feed_url, output.clone())).await.unwrap();

        assert_eq!(summary.entry.download_url, format!("{base}/picture.png"));
        assert_eq!(summary.chunks, vec!["A small test picture.".to_string()]);
        assert!(!summary.image.reencoded);
        assert_eq!(summary.image.path.as_deref(), Some(output.as_path()));
        assert!(output.exists());
    }

    #[derive(Default)]
    struct UploadRecorder {
        file_names: std::sync::Mutex<Vec<String>>,
    }

    impl Publisher for UploadRecorder {
        async fn upload_media(&self, _bytes: Vec<u8>, file_name: &str) -> Result<String, PotdError> {
            self.file_names.lock().unwrap().push(file_name.to_string());
            Ok("m1".into())
        }

        async fn post_with_media(&self, _text: &str, _media_id: &str) -> Result<String, PotdError> {
            Ok("p1".into())
        }

        async fn post_reply(&self, _text: &str, _in_reply_to: &str) -> Result<String, PotdError> {
            Ok("p2".into())
        }
    }

    #[tokio::test]
    async fn passthrough_png_is_uploaded_under_its_own_extension() {
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(8, 8))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        let prepared = PreparedRun {
            entry: PotdEntry {
                description: "A bee.".into(),
                download_url: "https://example.org/bee.png".into(),
            },
            chunks: plan_thread("A bee.", &WeightedLengthOracle::default(), 99, &NoopObserver)
                .unwrap(),
            original_bytes: png.len(),
            image: TranscodeOutcome {
                bytes: png,
                width: 8,
                height: 8,
                reencoded: false,
                probes: 0,
                within_ceiling: true,
            },
            image_path: PathBuf::from(OUTPUT_FILE_NAME),
        };
        let publisher = UploadRecorder::default();

        let (media_id, post_ids) = publish(&publisher, &prepared, &NoopObserver).await.unwrap();

        assert_eq!(media_id, "m1");
        assert_eq!(post_ids, vec!["p1".to_string()]);
        assert_eq!(*publisher.file_names.lock().unwrap(), vec!["new.png".to_string()]);
    }
}
