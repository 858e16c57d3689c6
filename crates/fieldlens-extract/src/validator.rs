//! Content validation for extracted text spans
//!
//! Binary containers interleave structure bytes with text, so every extractor
//! and matcher produces candidates that are really mis-decoded noise. The
//! [`ContentValidator`] is the single gate deciding whether a span is genuine
//! text before it is stored as a merge field, formula, macro or field code.

use serde::{Deserialize, Serialize};

/// Unicode replacement character produced by lossy decoding
pub const REPLACEMENT_CHAR: char = '\u{FFFD}';

/// Byte-order mark, invisible but frequently left behind by UTF-16 decoding
const BYTE_ORDER_MARK: char = '\u{FEFF}';

/// Default minimum span length in characters (after trimming)
pub const DEFAULT_MIN_LENGTH: usize = 2;

/// Default maximum fraction of replacement characters
pub const DEFAULT_MAX_REPLACEMENT_RATIO: f64 = 0.20;

/// Default maximum fraction of non-printable, non-whitespace characters
pub const DEFAULT_MAX_NON_PRINTABLE_RATIO: f64 = 0.30;

/// Why a span was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// Fewer characters than `min_length`
    TooShort,
    /// Replacement character ratio above the limit
    TooManyReplacementChars,
    /// Non-printable character ratio above the limit
    TooManyNonPrintable,
}

/// Measurements taken over one span
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpanAssessment {
    /// Number of characters in the trimmed span
    pub chars: usize,
    /// Fraction of `U+FFFD` characters
    pub replacement_ratio: f64,
    /// Fraction of non-printable, non-whitespace characters
    pub non_printable_ratio: f64,
    /// Rejection reason, `None` when the span is accepted
    pub rejection: Option<Rejection>,
}

impl SpanAssessment {
    /// Whether the span passed validation
    #[inline]
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.rejection.is_none()
    }
}

/// Heuristic gate separating genuine text from binary noise
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentValidator {
    /// Minimum number of characters a span must have
    pub min_length: usize,
    /// Maximum tolerated fraction of replacement characters
    pub max_replacement_ratio: f64,
    /// Maximum tolerated fraction of non-printable characters
    pub max_non_printable_ratio: f64,
}

impl Default for ContentValidator {
    #[inline]
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            max_replacement_ratio: DEFAULT_MAX_REPLACEMENT_RATIO,
            max_non_printable_ratio: DEFAULT_MAX_NON_PRINTABLE_RATIO,
        }
    }
}

impl ContentValidator {
    /// Create a validator with explicit thresholds
    #[inline]
    #[must_use]
    pub const fn new(
        min_length: usize,
        max_replacement_ratio: f64,
        max_non_printable_ratio: f64,
    ) -> Self {
        Self {
            min_length,
            max_replacement_ratio,
            max_non_printable_ratio,
        }
    }

    /// Set the minimum span length
    #[inline]
    #[must_use = "returns validator with minimum length configured"]
    pub const fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    /// Measure a span and decide whether it is genuine text
    #[must_use]
    pub fn assess(&self, span: &str) -> SpanAssessment {
        let trimmed = span.trim();
        let mut chars = 0usize;
        let mut replacement = 0usize;
        let mut non_printable = 0usize;

        for c in trimmed.chars() {
            chars += 1;
            if c == REPLACEMENT_CHAR {
                replacement += 1;
            } else if !is_printable_char(c) && !c.is_whitespace() {
                non_printable += 1;
            }
        }

        let replacement_ratio = ratio(replacement, chars);
        let non_printable_ratio = ratio(non_printable, chars);

        let rejection = if chars < self.min_length.max(1) {
            Some(Rejection::TooShort)
        } else if replacement_ratio > self.max_replacement_ratio {
            Some(Rejection::TooManyReplacementChars)
        } else if non_printable_ratio > self.max_non_printable_ratio {
            Some(Rejection::TooManyNonPrintable)
        } else {
            None
        };

        SpanAssessment {
            chars,
            replacement_ratio,
            non_printable_ratio,
            rejection,
        }
    }

    /// Whether a span is genuine text
    #[inline]
    #[must_use]
    pub fn is_valid(&self, span: &str) -> bool {
        self.assess(span).is_valid()
    }
}

#[allow(clippy::cast_precision_loss)] // span lengths are far below 2^52
#[inline]
fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Whether a character is visible text (whitespace excluded)
///
/// Control characters, the replacement character and the byte-order mark are
/// treated as non-printable.
#[inline]
#[must_use]
pub fn is_printable_char(c: char) -> bool {
    !c.is_control() && c != REPLACEMENT_CHAR && c != BYTE_ORDER_MARK
}

/// Remove non-printable code points, keeping whitespace and order
#[must_use]
pub fn clean(span: &str) -> String {
    span.chars()
        .filter(|&c| is_printable_char(c) || c.is_whitespace())
        .collect()
}
