//! Feature patterns
//!
//! A [`PatternGroup`] bundles the matchers for one feature (merge fields,
//! formulas, macros, ...). Groups live in an immutable [`PatternRegistry`]
//! that analyzers share by reference.

pub mod matcher;
pub mod registry;

pub use matcher::{count_group, match_group, GroupMatches, MAX_SAMPLE_CHARS};
pub use registry::{GroupKind, PatternRegistry, PatternRegistryBuilder};

use crate::error::{PatternError, Result};
use regex::Regex;
use std::fmt;

/// Default guard on the number of matches one matcher may produce
pub const DEFAULT_MAX_MATCHES: usize = 100_000;

/// Finds every occurrence of one feature in a text
pub trait FeatureMatcher: Send + Sync + fmt::Debug {
    /// All matches, in text order
    ///
    /// # Errors
    ///
    /// Implementations return an error instead of producing unbounded output.
    fn find_all(&self, text: &str) -> Result<Vec<String>>;
}

/// [`FeatureMatcher`] backed by a compiled regular expression
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    group: GroupKind,
    regex: Regex,
    max_matches: usize,
}

impl RegexMatcher {
    /// Compile a pattern for a group
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidPattern`] when the pattern does not compile.
    pub fn new(group: GroupKind, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| PatternError::InvalidPattern {
            group: group.as_str().to_string(),
            source,
        })?;
        Ok(Self {
            group,
            regex,
            max_matches: DEFAULT_MAX_MATCHES,
        })
    }

    /// Set the match guard
    #[inline]
    #[must_use = "returns matcher with match guard configured"]
    pub fn with_max_matches(mut self, max_matches: usize) -> Self {
        self.max_matches = max_matches;
        self
    }

    /// Source pattern
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl FeatureMatcher for RegexMatcher {
    fn find_all(&self, text: &str) -> Result<Vec<String>> {
        let mut found = Vec::new();
        for m in self.regex.find_iter(text) {
            if found.len() == self.max_matches {
                return Err(PatternError::MatchLimitExceeded {
                    group: self.group.as_str().to_string(),
                    limit: self.max_matches,
                });
            }
            found.push(m.as_str().to_string());
        }
        Ok(found)
    }
}

/// Ordered matchers for one feature
#[derive(Debug)]
pub struct PatternGroup {
    kind: GroupKind,
    matchers: Vec<Box<dyn FeatureMatcher>>,
}

impl PatternGroup {
    /// Empty group
    #[inline]
    #[must_use]
    pub fn new(kind: GroupKind) -> Self {
        Self {
            kind,
            matchers: Vec::new(),
        }
    }

    /// Group of regex matchers, compiled in order
    ///
    /// # Errors
    ///
    /// Returns the first compilation failure.
    pub fn from_patterns<S: AsRef<str>>(
        kind: GroupKind,
        patterns: &[S],
        max_matches: usize,
    ) -> Result<Self> {
        let mut group = Self::new(kind);
        for pattern in patterns {
            let matcher = RegexMatcher::new(kind, pattern.as_ref())?.with_max_matches(max_matches);
            group.matchers.push(Box::new(matcher));
        }
        Ok(group)
    }

    /// Append a matcher
    #[inline]
    #[must_use = "returns group with matcher appended"]
    pub fn with_matcher(mut self, matcher: Box<dyn FeatureMatcher>) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Feature this group detects
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> GroupKind {
        self.kind
    }

    /// Registry name of the group
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Matchers in evaluation order
    #[inline]
    #[must_use]
    pub fn matchers(&self) -> &[Box<dyn FeatureMatcher>] {
        &self.matchers
    }

    /// Whether the group has no matcher
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_matcher_finds_in_order() {
        let matcher = RegexMatcher::new(GroupKind::Formulas, r"\d+").unwrap();
        assert_eq!(matcher.find_all("a1 b22 c333").unwrap(), vec!["1", "22", "333"]);
    }

    #[test]
    fn test_regex_matcher_guard() {
        let matcher = RegexMatcher::new(GroupKind::Formulas, r"\d")
            .unwrap()
            .with_max_matches(2);
        assert_eq!(matcher.find_all("1 2").unwrap().len(), 2);

        let err = matcher.find_all("1 2 3").unwrap_err();
        assert!(matches!(
            err,
            PatternError::MatchLimitExceeded { limit: 2, ref group } if group == "formulas"
        ));
    }

    #[test]
    fn test_invalid_pattern_names_group() {
        let err = RegexMatcher::new(GroupKind::Macros, r"(unclosed").unwrap_err();
        assert!(err.to_string().starts_with("Invalid pattern in group 'macros'"));
    }

    #[test]
    fn test_group_from_patterns() {
        let group =
            PatternGroup::from_patterns(GroupKind::Tables, &["a", "b"], DEFAULT_MAX_MATCHES)
                .unwrap();
        assert_eq!(group.name(), "tables");
        assert_eq!(group.matchers().len(), 2);
        assert!(PatternGroup::new(GroupKind::Tables).is_empty());
    }
}
