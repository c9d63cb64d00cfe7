//! Pipeline stages around the two engines.
//!
//! Each submodule implements exactly one I/O step of a run.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ download ──▶ [transcode] ──▶ publish
//! (sheet/feed) (image bytes)              (auth + media upload + thread)
//! ```
//!
//! 1. [`source`]   — fetch today's `{description, download_url}` from a
//!    Google Sheets range or the Commons POTD feed
//! 2. [`download`] — GET the image bytes
//! 3. [`auth`]     — OAuth 1.0a request signing for the posting API
//! 4. [`publish`]  — media upload and thread posting

pub mod auth;
pub mod download;
pub mod publish;
pub mod source;

use std::time::Duration;

/// `User-Agent` sent on every request; Wikimedia rejects anonymous clients.
pub const USER_AGENT: &str = concat!(
    "potd-poster/",
    env!("CARGO_PKG_VERSION"),
    " (+https://commons.wikimedia.org/wiki/Commons:Picture_of_the_day)"
);

/// Build the HTTP client shared by every stage of one run.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
}
