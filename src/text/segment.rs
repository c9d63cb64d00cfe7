//! Greedy caption segmentation into a thread of posts.
//!
//! ## Algorithm
//!
//! The caption is reduced to its words (runs of non-whitespace) and rebuilt
//! chunk by chunk with single-space joins:
//!
//! ```text
//! loop:
//!   whole remainder (+ leading "...")         valid? ──yes──▶ final chunk, stop
//!   first word alone (+ leading, + trailing)  valid? ──no───▶ WordTooLong
//!   append words while the decorated candidate stays valid
//!   emit the last valid candidate, switch on the leading marker
//!   remaining word count must have shrunk, else NoProgress
//! ```
//!
//! Trying the whole remainder first is what keeps the trailing marker off the
//! last chunk. Candidates are always checked *with* their markers because the
//! markers themselves consume length budget.
//!
//! Markers attach to the neighbouring word without a space:
//! `"...brush-shaped tongue to..."`, `"...lap it up."`.

use crate::error::SegmentError;
use crate::observer::RunObserver;
use crate::text::oracle::ValidityOracle;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The continuation marker placed at the seams between chunks.
pub const ELLIPSIS: &str = "...";

const WORD_SEPARATOR: &str = " ";

/// One post of a thread, exactly as it will be published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 1-indexed position in the thread.
    pub index: usize,
    /// Full post text, continuation markers included.
    pub text: String,
    /// The first chunk carries no leading marker.
    pub is_first: bool,
    /// The last chunk carries no trailing marker.
    pub is_last: bool,
}

impl Chunk {
    /// The chunk text with its continuation markers removed.
    pub fn body(&self) -> &str {
        let mut body = self.text.as_str();
        if !self.is_first {
            body = body.strip_prefix(ELLIPSIS).unwrap_or(body);
        }
        if !self.is_last {
            body = body.strip_suffix(ELLIPSIS).unwrap_or(body);
        }
        body
    }
}

/// Split `caption` into an ordered thread of chunks, each accepted by `oracle`.
///
/// # Errors
/// * [`SegmentError::EmptyCaption`] — the caption has no words
/// * [`SegmentError::WordTooLong`]  — one word cannot fit even on its own
/// * [`SegmentError::NoProgress`]   — an iteration consumed no words
/// * [`SegmentError::Oracle`]       — the oracle failed to answer
pub fn segment<O>(
    caption: &str,
    oracle: &O,
    observer: &dyn RunObserver,
) -> Result<Vec<Chunk>, SegmentError>
where
    O: ValidityOracle + ?Sized,
{
    let words: Vec<&str> = caption.split_whitespace().collect();
    if words.is_empty() {
        return Err(SegmentError::EmptyCaption);
    }
    debug!(words = words.len(), "segmenting caption");

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut remaining: &[&str] = &words;
    let mut leading = "";

    loop {
        let whole = decorate(leading, remaining, "");
        if oracle.is_valid(&whole)? {
            emit(&mut chunks, whole, true, observer);
            break;
        }

        let lone = decorate(leading, &remaining[..1], ELLIPSIS);
        if !oracle.is_valid(&lone)? {
            return Err(SegmentError::WordTooLong {
                word: remaining[0].to_string(),
                candidate: lone,
            });
        }

        let before = remaining.len();
        let mut taken = 0;
        let mut accepted: Option<String> = None;
        while taken < remaining.len() {
            let trailing = if taken + 1 == remaining.len() {
                ""
            } else {
                ELLIPSIS
            };
            let candidate = decorate(leading, &remaining[..=taken], trailing);
            if !oracle.is_valid(&candidate)? {
                break;
            }
            accepted = Some(candidate);
            taken += 1;
        }

        let after = before - taken;
        let text = match accepted {
            Some(text) if after < before => text,
            _ => {
                return Err(SegmentError::NoProgress {
                    remaining: after,
                    previous: before,
                })
            }
        };

        remaining = &remaining[taken..];
        let exhausted = remaining.is_empty();
        emit(&mut chunks, text, exhausted, observer);
        if exhausted {
            break;
        }
        leading = ELLIPSIS;
    }

    observer.on_segmentation_complete(chunks.len());
    Ok(chunks)
}

fn decorate(leading: &str, words: &[&str], trailing: &str) -> String {
    let mut out = String::with_capacity(
        leading.len() + trailing.len() + words.iter().map(|w| w.len() + 1).sum::<usize>(),
    );
    out.push_str(leading);
    out.push_str(&words.join(WORD_SEPARATOR));
    out.push_str(trailing);
    out
}

fn emit(chunks: &mut Vec<Chunk>, text: String, is_last: bool, observer: &dyn RunObserver) {
    let index = chunks.len() + 1;
    let chunk = Chunk {
        index,
        text,
        is_first: index == 1,
        is_last,
    };
    observer.on_chunk(&chunk);
    chunks.push(chunk);
}
