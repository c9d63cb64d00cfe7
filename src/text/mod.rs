//! Caption handling: splitting text into a thread of valid posts.
//!
//! ## Layout
//!
//! 1. [`oracle`]   — the [`ValidityOracle`] capability plus a plain character
//!    limit implementation
//! 2. [`weighted`] — the posting platform's weighted-length rule
//! 3. [`segment`]  — the greedy segmenter that turns a caption into
//!    [`Chunk`]s, each accepted by the oracle

pub mod oracle;
pub mod segment;
pub mod weighted;

pub use oracle::{CharLimitOracle, ValidityOracle};
pub use segment::{segment, Chunk, ELLIPSIS};
pub use weighted::{WeightRange, WeightedLengthConfig, WeightedLengthOracle};
