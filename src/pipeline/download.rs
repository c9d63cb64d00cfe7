//! Image download: GET the picture of the day into memory.
//!
//! The transcoder works on a byte buffer, so the image is kept in memory
//! rather than spooled to a temp file; Commons originals are tens of
//! megabytes at most.

use crate::error::PotdError;
use crate::pipeline::http_client;
use tracing::info;

/// Check if the input string looks like an HTTP(S) URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Download `url` and return the response body.
///
/// # Errors
/// * [`PotdError::DownloadTimeout`] when the request exceeds `timeout_secs`
/// * [`PotdError::DownloadFailed`] for non-URLs, transport errors, non-2xx
///   statuses and empty bodies
pub async fn download_image(url: &str, timeout_secs: u64) -> Result<Vec<u8>, PotdError> {
    if !is_url(url) {
        return Err(PotdError::DownloadFailed {
            url: url.to_string(),
            reason: "not an HTTP/HTTPS URL".into(),
        });
    }
    info!(url, "downloading image");

    let client = http_client(timeout_secs).map_err(|e| PotdError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| download_error(url, timeout_secs, e))?;

    if !response.status().is_success() {
        return Err(PotdError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| download_error(url, timeout_secs, e))?;

    if bytes.is_empty() {
        return Err(PotdError::DownloadFailed {
            url: url.to_string(),
            reason: "empty response body".into(),
        });
    }

    info!(url, size = bytes.len(), "downloaded image");
    Ok(bytes.to_vec())
}

fn download_error(url: &str, timeout_secs: u64, e: reqwest::Error) -> PotdError {
    if e.is_timeout() {
        PotdError::DownloadTimeout {
            url: url.to_string(),
            secs: timeout_secs,
        }
    } else {
        PotdError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}
