//! The validity oracle: "would the platform accept this string as one post?"
//!
//! The segmenter only ever asks this yes/no question about fully decorated
//! candidates (continuation markers included). How the platform counts is
//! the oracle's business, which is what lets tests drive the segmenter with
//! a plain character limit or an arbitrary closure.

use crate::error::OracleError;

/// Decides whether a candidate string is a valid single post.
pub trait ValidityOracle {
    /// Return `Ok(true)` when `candidate` may be posted as-is.
    ///
    /// `Err` means the oracle could not answer; the segmenter aborts.
    fn is_valid(&self, candidate: &str) -> Result<bool, OracleError>;
}

impl<F> ValidityOracle for F
where
    F: Fn(&str) -> bool,
{
    fn is_valid(&self, candidate: &str) -> Result<bool, OracleError> {
        Ok(self(candidate))
    }
}

/// Valid iff the candidate has between 1 and `max_chars` Unicode scalar values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharLimitOracle {
    pub max_chars: usize,
}

impl CharLimitOracle {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl ValidityOracle for CharLimitOracle {
    fn is_valid(&self, candidate: &str) -> Result<bool, OracleError> {
        let count = candidate.chars().count();
        Ok(count >= 1 && count <= self.max_chars)
    }
}
