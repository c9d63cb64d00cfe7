//! Weighted post length, as the posting platform counts it.
//!
//! The platform does not count characters. Each code point has a weight:
//! Latin, Cyrillic, most punctuation and a few typographic ranges weigh one
//! unit, everything else (CJK, emoji, …) weighs two. A link counts as a fixed
//! 23 units whatever its real length, and a whole emoji sequence
//! (`👨‍👩‍👧‍👦` is seven code points) counts once.
//!
//! [`WeightedLengthOracle`] implements those rules over a
//! [`WeightedLengthConfig`] whose default matches the platform's published
//! v3 configuration. It does not apply Unicode normalisation. Links are
//! recognised with an `http://` or `https://` scheme, or without one when
//! the host ends in a common top-level domain (`commons.wikimedia.org/...`).
//! Surrounding brackets, quotes and trailing punctuation are not part of
//! the link and are counted normally.

use crate::error::OracleError;
use crate::text::oracle::ValidityOracle;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// An inclusive code-point range with a non-default weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightRange {
    pub start: u32,
    pub end: u32,
    pub weight: u32,
}

impl WeightRange {
    const fn new(start: u32, end: u32, weight: u32) -> Self {
        Self { start, end, weight }
    }

    fn contains(&self, cp: u32) -> bool {
        cp >= self.start && cp <= self.end
    }
}

/// Counting rules for [`WeightedLengthOracle`].
///
/// Weights are expressed in hundredths of a unit (`scale = 100`), so the
/// default limit of 280 units is a budget of 28 000.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedLengthConfig {
    /// Maximum length in units. Default: 280.
    pub max_weighted_length: u32,
    /// Weight of one unit. Default: 100.
    pub scale: u32,
    /// Weight of a code point outside every range. Default: 200.
    pub default_weight: u32,
    /// Units charged for any link. Default: 23.
    pub transformed_url_length: u32,
    /// Treat emoji sequences as a single default-weight glyph. Default: true.
    pub emoji_parsing: bool,
    /// Ranges with their own weight.
    pub ranges: Vec<WeightRange>,
}

impl Default for WeightedLengthConfig {
    fn default() -> Self {
        Self {
            max_weighted_length: 280,
            scale: 100,
            default_weight: 200,
            transformed_url_length: 23,
            emoji_parsing: true,
            ranges: vec![
                WeightRange::new(0, 4351, 100),
                WeightRange::new(8192, 8205, 100),
                WeightRange::new(8208, 8223, 100),
                WeightRange::new(8242, 8247, 100),
            ],
        }
    }
}

/// Code points that make a post invalid wherever they appear.
const INVALID_CHARS: [char; 8] = [
    '\u{FFFE}', '\u{FEFF}', '\u{FFFF}', '\u{202A}', '\u{202B}', '\u{202C}', '\u{202D}', '\u{202E}',
];

const ZWJ: char = '\u{200D}';

static RE_SCHEME_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^https?://\S+$").unwrap());

static RE_BARE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+(?:com|org|net|edu|gov|mil|int|info|biz|io|co|me|tv|app|dev|ai|uk|de|fr|jp|ca|au|nz|us|eu)(?::\d{1,5})?(?:/\S*)?$",
    )
    .unwrap()
});

/// Byte range of the link inside `token`, if the token carries one.
fn link_span(token: &str) -> Option<(usize, usize)> {
    let start = token.len() - token.trim_start_matches(['(', '[', '"', '\'', '.']).len();
    let end = token.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', ']', '"', '\'']).len();
    if start >= end {
        return None;
    }
    let core = &token[start..end];
    (RE_SCHEME_LINK.is_match(core) || RE_BARE_LINK.is_match(core)).then_some((start, end))
}

/// The posting platform's length rule as a [`ValidityOracle`].
#[derive(Debug, Clone, Default)]
pub struct WeightedLengthOracle {
    config: WeightedLengthConfig,
}

impl WeightedLengthOracle {
    pub fn new(config: WeightedLengthConfig) -> Self {
        Self { config }
    }

    /// Oracle with the default rules and a custom unit limit.
    pub fn with_limit(max_weighted_length: u32) -> Self {
        Self::new(WeightedLengthConfig {
            max_weighted_length,
            ..WeightedLengthConfig::default()
        })
    }

    pub fn config(&self) -> &WeightedLengthConfig {
        &self.config
    }

    /// Weighted length of `text`, in units (rounded down).
    pub fn weighted_length(&self, text: &str) -> u32 {
        self.scaled_length(text) / self.config.scale.max(1)
    }

    fn scaled_length(&self, text: &str) -> u32 {
        let mut total = 0u32;
        let mut token = String::new();
        for c in text.chars() {
            if c.is_whitespace() {
                total = total.saturating_add(self.token_weight(&token));
                token.clear();
                total = total.saturating_add(self.char_weight(c));
            } else {
                token.push(c);
            }
        }
        total.saturating_add(self.token_weight(&token))
    }

    fn token_weight(&self, token: &str) -> u32 {
        if token.is_empty() {
            return 0;
        }
        if let Some((start, end)) = link_span(token) {
            return self
                .glyph_weight(&token[..start])
                .saturating_add(self.config.transformed_url_length * self.config.scale)
                .saturating_add(self.glyph_weight(&token[end..]));
        }
        self.glyph_weight(token)
    }

    fn glyph_weight(&self, token: &str) -> u32 {
        let chars: Vec<char> = token.chars().collect();
        let mut total = 0u32;
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if self.config.emoji_parsing {
                if is_regional_indicator(c)
                    && chars.get(i + 1).copied().is_some_and(is_regional_indicator)
                {
                    total = total.saturating_add(self.config.default_weight);
                    i += 2;
                    continue;
                }
                if is_emoji_base(c) {
                    i = skip_emoji_sequence(&chars, i);
                    total = total.saturating_add(self.config.default_weight);
                    continue;
                }
            }
            total = total.saturating_add(self.char_weight(c));
            i += 1;
        }
        total
    }

    fn char_weight(&self, c: char) -> u32 {
        let cp = c as u32;
        self.config
            .ranges
            .iter()
            .find(|r| r.contains(cp))
            .map(|r| r.weight)
            .unwrap_or(self.config.default_weight)
    }
}

impl ValidityOracle for WeightedLengthOracle {
    fn is_valid(&self, candidate: &str) -> Result<bool, OracleError> {
        if candidate.trim().is_empty() || candidate.contains(INVALID_CHARS) {
            return Ok(false);
        }
        let budget = self.config.max_weighted_length.saturating_mul(self.config.scale);
        Ok(self.scaled_length(candidate) <= budget)
    }
}

/// Index just past the emoji sequence starting at `start`.
fn skip_emoji_sequence(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    loop {
        while i < chars.len() && is_emoji_modifier(chars[i]) {
            i += 1;
        }
        match (chars.get(i), chars.get(i + 1)) {
            (Some(&ZWJ), Some(&next)) if is_emoji_base(next) => i += 2,
            _ => return i,
        }
    }
}

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

fn is_emoji_base(c: char) -> bool {
    matches!(c as u32,
        0x1F000..=0x1F1E5
        | 0x1F200..=0x1F3FA
        | 0x1F400..=0x1FAFF
        | 0x2300..=0x23FF
        | 0x2600..=0x27BF
        | 0x2B00..=0x2BFF
    )
}

/// Variation selectors, skin tones, tag characters and the keycap mark.
fn is_emoji_modifier(c: char) -> bool {
    matches!(c as u32,
        0xFE0E..=0xFE0F
        | 0x1F3FB..=0x1F3FF
        | 0xE0020..=0xE007F
        | 0x20E3
    )
}
