//! Running pattern groups over text

use super::PatternGroup;
use crate::error::Result;
use fieldlens_extract::validator::{self, ContentValidator};
use std::collections::HashSet;

/// Stored samples are truncated to this many characters
pub const MAX_SAMPLE_CHARS: usize = 100;

/// Deduplicated matches of one group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupMatches {
    /// Cleaned, truncated samples of valid matches, at most `limit`
    pub samples: Vec<String>,
    /// Unique matches accepted by the validator
    pub valid_count: usize,
    /// Unique matches rejected by the validator
    pub invalid_count: usize,
}

impl GroupMatches {
    /// Whether nothing valid was found
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.valid_count == 0
    }
}

/// Match every matcher of `group`, deduplicate and validate
///
/// Matches are deduplicated by exact string, first occurrence first. When a
/// validator is given, rejected matches only increase
/// [`GroupMatches::invalid_count`]; otherwise every unique match is valid.
///
/// # Errors
///
/// Propagates the first matcher failure.
pub fn match_group(
    text: &str,
    group: &PatternGroup,
    limit: usize,
    validator: Option<&ContentValidator>,
) -> Result<GroupMatches> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut result = GroupMatches::default();

    for matcher in group.matchers() {
        for candidate in matcher.find_all(text)? {
            if seen.contains(&candidate) {
                continue;
            }
            let valid = validator.map_or(true, |v| v.is_valid(&candidate));
            if valid {
                result.valid_count += 1;
                if result.samples.len() < limit {
                    result.samples.push(sample(&candidate));
                }
            } else {
                result.invalid_count += 1;
            }
            seen.insert(candidate);
        }
    }

    log::debug!(
        "{}: {} valid, {} invalid",
        group.name(),
        result.valid_count,
        result.invalid_count
    );
    Ok(result)
}

/// Raw number of matches, duplicates included
///
/// # Errors
///
/// Propagates the first matcher failure.
pub fn count_group(text: &str, group: &PatternGroup) -> Result<usize> {
    let mut count = 0;
    for matcher in group.matchers() {
        count += matcher.find_all(text)?.len();
    }
    Ok(count)
}

/// Clean a raw match and cut it at [`MAX_SAMPLE_CHARS`] characters
fn sample(raw: &str) -> String {
    let cleaned = validator::clean(raw);
    let trimmed = cleaned.trim();
    match trimmed.char_indices().nth(MAX_SAMPLE_CHARS) {
        Some((cut, _)) => trimmed[..cut].to_string(),
        None => trimmed.to_string(),
    }
}
