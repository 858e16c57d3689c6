//! Error types for pattern matching and configuration
//!
//! Neither error type escapes [`crate::analyze`]: a failing detector is
//! recorded in the report's `parse_errors` and the remaining detectors run.

use thiserror::Error;

/// Errors raised while building or running a pattern group
#[derive(Error, Debug)]
pub enum PatternError {
    /// A pattern of the group failed to compile
    #[error("Invalid pattern in group '{group}': {source}")]
    InvalidPattern {
        /// Group the pattern belongs to
        group: String,
        /// Compilation error from the regex engine
        source: regex::Error,
    },

    /// A matcher produced more matches than its guard allows
    #[error("Pattern group '{group}' exceeded {limit} matches")]
    MatchLimitExceeded {
        /// Group the matcher belongs to
        group: String,
        /// Configured guard
        limit: usize,
    },

    /// A registry group ended up without any matcher
    #[error("Pattern group '{0}' has no matchers")]
    EmptyGroup(String),
}

/// Inconsistent [`crate::ComplexityConfig`] values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Nesting thresholds are not strictly ascending
    #[error("nesting_medium_threshold ({medium}) must be below nesting_high_threshold ({high})")]
    ThresholdOrder {
        /// Medium nesting threshold
        medium: usize,
        /// High nesting threshold
        high: usize,
    },

    /// Score cutoffs are not strictly ascending
    #[error("score cutoffs must ascend: medium {medium} < high {high} < critical {critical}")]
    CutoffOrder {
        /// Medium level cutoff
        medium: u32,
        /// High level cutoff
        high: u32,
        /// Critical level cutoff
        critical: u32,
    },

    /// A sample cap of zero would hide every finding
    #[error("{0} must be greater than zero")]
    ZeroCap(&'static str),
}

/// Result type for pattern operations
pub type Result<T> = std::result::Result<T, PatternError>;
