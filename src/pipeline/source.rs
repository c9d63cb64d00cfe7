//! Entry sources: where today's caption and image URL come from.
//!
//! Two sources are supported:
//!
//! * **Sheet**: a Google Sheets range read through the public
//!   `values.get` endpoint with an API key. Column A holds the raw caption
//!   block, column B the image URL.
//! * **Feed**: the Wikimedia Commons "featured feed" RSS for the picture
//!   of the day, scraped with a handful of regex rules.
//!
//! Both resolve to a [`PotdEntry`]. Parsing is split from fetching so the
//! rules can be tested on fixtures.

use crate::error::PotdError;
use crate::pipeline::http_client;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Base of the Sheets `values.get` endpoint.
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// English POTD RSS feed on Wikimedia Commons.
pub const DEFAULT_FEED_URL: &str =
    "https://commons.wikimedia.org/w/api.php?action=featuredfeed&feed=potd&feedformat=rss&language=en";

/// Everything in the sheet's caption cell up to and including this marker
/// is heading material, not caption.
const SHEET_CAPTION_MARKER: &str = "] \n\n";

/// One day's picture: caption plus where to download the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotdEntry {
    pub description: String,
    pub download_url: String,
}

/// Where to read today's entry from.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntrySource {
    /// A Google Sheets range, read with an API key.
    Sheet {
        spreadsheet_id: String,
        range: String,
        api_key: String,
    },
    /// An RSS feed in the Commons featured-feed format.
    Feed { url: String },
}

impl Default for EntrySource {
    fn default() -> Self {
        EntrySource::Feed {
            url: DEFAULT_FEED_URL.to_string(),
        }
    }
}

impl fmt::Debug for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntrySource::Sheet {
                spreadsheet_id,
                range,
                ..
            } => f
                .debug_struct("Sheet")
                .field("spreadsheet_id", spreadsheet_id)
                .field("range", range)
                .field("api_key", &"<redacted>")
                .finish(),
            EntrySource::Feed { url } => f.debug_struct("Feed").field("url", url).finish(),
        }
    }
}

impl EntrySource {
    /// Short human-readable name used in errors and logs.
    pub fn name(&self) -> String {
        match self {
            EntrySource::Sheet {
                spreadsheet_id,
                range,
                ..
            } => format!("sheet {spreadsheet_id} ({range})"),
            EntrySource::Feed { url } => url.clone(),
        }
    }
}

/// Fetch today's entry from `source`.
pub async fn fetch_entry(source: &EntrySource, timeout_secs: u64) -> Result<PotdEntry, PotdError> {
    info!(source = %source.name(), "fetching today's entry");
    let entry = match source {
        EntrySource::Sheet {
            spreadsheet_id,
            range,
            api_key,
        } => {
            let url = sheet_values_url(spreadsheet_id, range, api_key)?;
            let body = get_text(source, url.as_str(), timeout_secs).await?;
            let values: ValueRange =
                serde_json::from_str(&body).map_err(|e| PotdError::SourceMalformed {
                    detail: format!("sheet response is not a value range: {e}"),
                })?;
            parse_sheet_values(&values)?
        }
        EntrySource::Feed { url } => {
            let body = get_text(source, url, timeout_secs).await?;
            parse_feed(&body)?
        }
    };
    info!(url = %entry.download_url, "fetched today's entry");
    Ok(entry)
}

async fn get_text(source: &EntrySource, url: &str, timeout_secs: u64) -> Result<String, PotdError> {
    let failed = |reason: String| PotdError::SourceFetchFailed {
        source_name: source.name(),
        reason,
    };

    let client = http_client(timeout_secs).map_err(|e| failed(e.to_string()))?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| failed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }
    response.text().await.map_err(|e| failed(e.to_string()))
}

// ── Sheet ────────────────────────────────────────────────────────────────────

/// Response body of `spreadsheets.values.get`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValueRange {
    #[serde(default)]
    pub range: String,
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

/// URL of the `values.get` call for one range.
pub fn sheet_values_url(
    spreadsheet_id: &str,
    range: &str,
    api_key: &str,
) -> Result<reqwest::Url, PotdError> {
    let mut url = reqwest::Url::parse(SHEETS_API_BASE)
        .map_err(|e| PotdError::Internal(format!("bad Sheets API base URL: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| PotdError::Internal("Sheets API base URL cannot have path segments".into()))?
        .push(spreadsheet_id)
        .push("values")
        .push(range);
    url.query_pairs_mut().append_pair("key", api_key);
    Ok(url)
}

/// Turn the first row of a value range into an entry.
pub fn parse_sheet_values(values: &ValueRange) -> Result<PotdEntry, PotdError> {
    let row = values.values.first().ok_or_else(|| PotdError::SourceMalformed {
        detail: "no data found in sheet".into(),
    })?;
    let cell = |i: usize| -> Result<String, PotdError> {
        row.get(i)
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .ok_or_else(|| PotdError::SourceMalformed {
                detail: format!("sheet row has {} cells, expected at least 2", row.len()),
            })
    };

    Ok(PotdEntry {
        description: clean_sheet_description(&cell(0)?)?,
        download_url: cell(1)?.trim().to_string(),
    })
}

/// Cut the heading block off a sheet caption cell and drop its newlines.
pub fn clean_sheet_description(raw: &str) -> Result<String, PotdError> {
    let (_, caption) =
        raw.split_once(SHEET_CAPTION_MARKER)
            .ok_or_else(|| PotdError::SourceMalformed {
                detail: format!("caption cell has no {SHEET_CAPTION_MARKER:?} marker"),
            })?;
    Ok(caption.replace('\n', ""))
}

// ── Feed ─────────────────────────────────────────────────────────────────────

static RE_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<item>(.*?)</item>").unwrap());

static RE_DESCRIPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<description>(.*?)</description>").unwrap());

static RE_CDATA: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^\s*<!\[CDATA\[(.*)\]\]>\s*$").unwrap());

static RE_CAPTION_DIV: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<div[^>]*class="description[^"]*"[^>]*>(.*?)</div>"#).unwrap()
});

static RE_IMG_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<img[^>]*?\ssrc="([^"]+)""#).unwrap());

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

static RE_NUMERIC_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(?:[xX]([0-9a-fA-F]+)|([0-9]+));").unwrap());

/// Scrape the most recent item of a Commons featured feed.
pub fn parse_feed(xml: &str) -> Result<PotdEntry, PotdError> {
    let item = RE_ITEM
        .captures_iter(xml)
        .last()
        .ok_or_else(|| PotdError::SourceMalformed {
            detail: "feed has no <item>".into(),
        })?;
    let raw = RE_DESCRIPTION
        .captures(&item[1])
        .map(|c| c[1].to_string())
        .ok_or_else(|| PotdError::SourceMalformed {
            detail: "feed item has no <description>".into(),
        })?;

    let html = match RE_CDATA.captures(&raw) {
        Some(c) => c[1].to_string(),
        None => unescape_html(&raw),
    };
    debug!(len = html.len(), "feed item description");

    let src = RE_IMG_SRC
        .captures(&html)
        .map(|c| unescape_html(&c[1]))
        .ok_or_else(|| PotdError::SourceMalformed {
            detail: "feed item has no <img src>".into(),
        })?;
    let caption_html = RE_CAPTION_DIV
        .captures(&html)
        .map(|c| c[1].to_string())
        .ok_or_else(|| PotdError::SourceMalformed {
            detail: "feed item has no description <div>".into(),
        })?;

    let description = collapse_whitespace(&unescape_html(&RE_TAG.replace_all(&caption_html, "")));
    if description.is_empty() {
        return Err(PotdError::SourceMalformed {
            detail: "feed item description is empty".into(),
        });
    }

    Ok(PotdEntry {
        description,
        download_url: full_resolution_url(&src),
    })
}

/// Map a Commons thumbnail URL back to the original file.
///
/// `…/commons/thumb/a/ab/Foo.jpg/300px-Foo.jpg` → `…/commons/a/ab/Foo.jpg`.
/// Protocol-relative URLs get an `https:` scheme; other URLs pass through.
pub fn full_resolution_url(src: &str) -> String {
    let url = if src.starts_with("//") {
        format!("https:{src}")
    } else {
        src.to_string()
    };
    if !url.contains("/thumb/") {
        return url;
    }
    let original = url.replacen("/thumb/", "/", 1);
    match original.rsplit_once('/') {
        Some((head, _size_variant)) => head.to_string(),
        None => original,
    }
}

/// Decode the HTML entities that appear in feed markup.
pub fn unescape_html(s: &str) -> String {
    let named = s
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ");
    let numeric = RE_NUMERIC_ENTITY.replace_all(&named, |caps: &regex::Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    numeric.replace("&amp;", "&")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
