//! Pattern registry: the immutable set of feature groups
//!
//! The default registry is compiled once, on first use, and shared by every
//! analyzer. Custom registries come from [`PatternRegistryBuilder`] and are
//! immutable once built; wrap them in an `Arc` to share them across threads.

use super::{FeatureMatcher, PatternGroup, RegexMatcher, DEFAULT_MAX_MATCHES};
use crate::error::{PatternError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

/// Merge field references: field instructions and chevron placeholders
const MERGE_FIELD_PATTERNS: &[&str] = &[
    r"(?i)\bMERGEFIELD\s+[^{}\r\n]{1,150}",
    r"(?i)\bDOCVARIABLE\s+[^{}\r\n]{1,150}",
    r"«[^«»\r\n]{1,80}»",
];

/// Expression fields and formula function calls
const FORMULA_PATTERNS: &[&str] = &[
    r"\{\s*=[^{}]{1,200}\}",
    r"\b(?:SUM|PRODUCT|AVERAGE|MIN|MAX|COUNT|ROUND|ABS|INT|MOD|SIGN|AND|OR|NOT|DEFINED)\([^()]{0,100}\)",
];

/// VBA procedures, auto-run entry points and project markers
///
/// Procedure declarations only count at the start of a line.
const MACRO_PATTERNS: &[&str] = &[
    r"(?im)^[ \t]*(?:(?:Private|Public|Friend)[ \t]+)?(?:Static[ \t]+)?Sub[ \t]+\w+[ \t]*\(",
    r"(?im)^[ \t]*(?:(?:Private|Public|Friend)[ \t]+)?(?:Static[ \t]+)?Function[ \t]+\w+[ \t]*\(",
    r"\bAuto(?:Open|Close|Exec|New|Exit)\b",
    r"\bDocument_(?:Open|Close|New)\b",
    r"_VBA_PROJECT",
    r"vbaProject\.bin",
    r"Attribute VB_Name",
];

/// Two or more consecutive lines with at least two tab stops each
const TABLE_PATTERNS: &[&str] =
    &[r"(?m)(?:^[^\t\r\n]*\t[^\t\r\n]*\t[^\r\n]*(?:\r?\n|$)){2,}"];

/// ActiveX controls, class ids and form control prog ids
const ACTIVEX_PATTERNS: &[&str] = &[
    r"(?i)\bActiveX\b",
    r"(?i)\bCLSID\b",
    r"\{[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}\}",
    r"\bForms\.\w+\.1\b",
    r"(?i)\bactiveX\d*\.xml\b",
    r"\bCONTROL\s+Forms\.\w+",
];

/// Auxiliary fields: references, prompts, includes, form fields
const FIELD_CODE_PATTERNS: &[&str] = &[
    r"\{\s*(?:REF|PAGEREF|NOTEREF|ASK|FILLIN|SET|SEQ|INCLUDETEXT|INCLUDEPICTURE|MACROBUTTON|GOTOBUTTON|HYPERLINK|TOC|INDEX|XE|TC|DATE|TIME|PAGE|NUMPAGES|DOCPROPERTY|AUTOTEXT|QUOTE|SYMBOL|FORMTEXT|FORMCHECKBOX|FORMDROPDOWN)\b[^{}]{0,150}\}",
    r"\b(?:FORMTEXT|FORMCHECKBOX|FORMDROPDOWN|INCLUDETEXT|INCLUDEPICTURE|MACROBUTTON|GOTOBUTTON|DOCPROPERTY)\b",
];

/// Opening of an IF field; kept in step with the nesting scanner's lookahead
const IF_START_PATTERNS: &[&str] = &[r"(?i)\{[ \t\r\n]{0,3}IF\b"];

/// IF field without nested fields
const IF_FULL_PATTERNS: &[&str] = &[r"(?i)\{\s*IF\s[^{}]*\}"];

static DEFAULT_REGISTRY: LazyLock<PatternRegistry> = LazyLock::new(|| {
    PatternRegistryBuilder::new()
        .build()
        .expect("valid default pattern regexes")
});

/// Feature a pattern group detects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKind {
    /// Merge field references
    MergeFields,
    /// Formula fields and calls
    Formulas,
    /// Macro code and VBA project markers
    Macros,
    /// Tab-separated table blocks in text
    Tables,
    /// ActiveX / form controls
    Activex,
    /// Auxiliary field codes
    FieldCodes,
    /// IF field openings
    IfStart,
    /// Complete IF fields without nesting
    IfFull,
}

impl GroupKind {
    /// Every group, in registry order
    pub const ALL: [Self; 8] = [
        Self::MergeFields,
        Self::Formulas,
        Self::Macros,
        Self::Tables,
        Self::Activex,
        Self::FieldCodes,
        Self::IfStart,
        Self::IfFull,
    ];

    /// Registry name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MergeFields => "merge_fields",
            Self::Formulas => "formulas",
            Self::Macros => "macros",
            Self::Tables => "tables",
            Self::Activex => "activex",
            Self::FieldCodes => "field_codes",
            Self::IfStart => "if_start",
            Self::IfFull => "if_full",
        }
    }

    /// Built-in patterns of the group
    #[must_use]
    pub const fn default_patterns(self) -> &'static [&'static str] {
        match self {
            Self::MergeFields => MERGE_FIELD_PATTERNS,
            Self::Formulas => FORMULA_PATTERNS,
            Self::Macros => MACRO_PATTERNS,
            Self::Tables => TABLE_PATTERNS,
            Self::Activex => ACTIVEX_PATTERNS,
            Self::FieldCodes => FIELD_CODE_PATTERNS,
            Self::IfStart => IF_START_PATTERNS,
            Self::IfFull => IF_FULL_PATTERNS,
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable bundle of every feature group
#[derive(Debug)]
pub struct PatternRegistry {
    merge_fields: PatternGroup,
    formulas: PatternGroup,
    macros: PatternGroup,
    tables: PatternGroup,
    activex: PatternGroup,
    field_codes: PatternGroup,
    if_start: PatternGroup,
    if_full: PatternGroup,
}

impl PatternRegistry {
    /// Shared registry of the built-in patterns
    #[inline]
    #[must_use]
    pub fn default_registry() -> &'static Self {
        &DEFAULT_REGISTRY
    }

    /// Builder starting from the built-in patterns
    #[inline]
    #[must_use]
    pub fn builder() -> PatternRegistryBuilder {
        PatternRegistryBuilder::new()
    }

    /// The group detecting `kind`
    #[inline]
    #[must_use]
    pub const fn group(&self, kind: GroupKind) -> &PatternGroup {
        match kind {
            GroupKind::MergeFields => &self.merge_fields,
            GroupKind::Formulas => &self.formulas,
            GroupKind::Macros => &self.macros,
            GroupKind::Tables => &self.tables,
            GroupKind::Activex => &self.activex,
            GroupKind::FieldCodes => &self.field_codes,
            GroupKind::IfStart => &self.if_start,
            GroupKind::IfFull => &self.if_full,
        }
    }

    /// All groups, in registry order
    pub fn groups(&self) -> impl Iterator<Item = &PatternGroup> {
        GroupKind::ALL.into_iter().map(|kind| self.group(kind))
    }
}

/// Builds a [`PatternRegistry`] from the built-in patterns plus overrides
#[derive(Debug)]
pub struct PatternRegistryBuilder {
    max_matches: usize,
    replaced: BTreeMap<GroupKind, PatternGroup>,
    extra: Vec<(GroupKind, String)>,
}

impl Default for PatternRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternRegistryBuilder {
    /// Builder with no overrides
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_matches: DEFAULT_MAX_MATCHES,
            replaced: BTreeMap::new(),
            extra: Vec::new(),
        }
    }

    /// Match guard applied to every regex compiled by the builder
    #[inline]
    #[must_use = "returns builder with match guard configured"]
    pub fn with_max_matches(mut self, max_matches: usize) -> Self {
        self.max_matches = max_matches;
        self
    }

    /// Replace a built-in group entirely
    #[inline]
    #[must_use = "returns builder with group replaced"]
    pub fn with_group(mut self, group: PatternGroup) -> Self {
        self.replaced.insert(group.kind(), group);
        self
    }

    /// Append a regex to a group
    #[inline]
    #[must_use = "returns builder with pattern appended"]
    pub fn with_pattern(mut self, kind: GroupKind, pattern: impl Into<String>) -> Self {
        self.extra.push((kind, pattern.into()));
        self
    }

    /// Compile the registry
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidPattern`] for a pattern that does not
    /// compile and [`PatternError::EmptyGroup`] for a group left without
    /// matchers.
    pub fn build(mut self) -> Result<PatternRegistry> {
        Ok(PatternRegistry {
            merge_fields: self.take_group(GroupKind::MergeFields)?,
            formulas: self.take_group(GroupKind::Formulas)?,
            macros: self.take_group(GroupKind::Macros)?,
            tables: self.take_group(GroupKind::Tables)?,
            activex: self.take_group(GroupKind::Activex)?,
            field_codes: self.take_group(GroupKind::FieldCodes)?,
            if_start: self.take_group(GroupKind::IfStart)?,
            if_full: self.take_group(GroupKind::IfFull)?,
        })
    }

    fn take_group(&mut self, kind: GroupKind) -> Result<PatternGroup> {
        let mut group = match self.replaced.remove(&kind) {
            Some(group) => group,
            None => PatternGroup::from_patterns(kind, kind.default_patterns(), self.max_matches)?,
        };
        for (_, pattern) in self.extra.iter().filter(|(k, _)| *k == kind) {
            let matcher: Box<dyn FeatureMatcher> =
                Box::new(RegexMatcher::new(kind, pattern)?.with_max_matches(self.max_matches));
            group = group.with_matcher(matcher);
        }
        if group.is_empty() {
            return Err(PatternError::EmptyGroup(kind.as_str().to_string()));
        }
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(kind: GroupKind, text: &str) -> Vec<String> {
        let group = PatternRegistry::default_registry().group(kind);
        group
            .matchers()
            .iter()
            .flat_map(|m| m.find_all(text).unwrap())
            .collect()
    }

    #[test]
    fn test_default_registry_has_every_group() {
        let registry = PatternRegistry::default_registry();
        let names: Vec<&str> = registry.groups().map(PatternGroup::name).collect();
        assert_eq!(
            names,
            vec![
                "merge_fields",
                "formulas",
                "macros",
                "tables",
                "activex",
                "field_codes",
                "if_start",
                "if_full"
            ]
        );
        assert!(registry.groups().all(|g| !g.is_empty()));
    }

    #[test]
    fn test_merge_field_patterns() {
        let found = matches(
            GroupKind::MergeFields,
            r"Dear {MERGEFIELD FirstName \* Upper}, your «Plan» plan. {DOCVARIABLE Region}",
        );
        assert_eq!(
            found,
            vec![r"MERGEFIELD FirstName \* Upper", "DOCVARIABLE Region", "«Plan»"]
        );
    }

    #[test]
    fn test_formula_patterns() {
        let found = matches(GroupKind::Formulas, "{= SUM(ABOVE) \\# \"0.00\"} and {=2*3}");
        assert_eq!(found, vec!["{= SUM(ABOVE) \\# \"0.00\"}", "{=2*3}", "SUM(ABOVE)"]);
    }

    #[test]
    fn test_macro_patterns() {
        let found = matches(GroupKind::Macros, "Private Sub AutoOpen()\nEnd Sub");
        assert_eq!(found, vec!["Private Sub AutoOpen(", "AutoOpen"]);
        let found = matches(GroupKind::Macros, "Option Explicit\n  Function Total(x)\n");
        assert_eq!(found, vec!["  Function Total("]);
        assert!(matches(GroupKind::Macros, "a submarine (yellow)").is_empty());
        assert!(matches(GroupKind::Macros, "Add the Sub Total (net) to the invoice").is_empty());
    }

    #[test]
    fn test_table_pattern_needs_two_tabbed_lines() {
        let table = "Name\tQty\tPrice\nApple\t2\t0.50\nPear\t1\t0.70\n\nText after";
        assert_eq!(matches(GroupKind::Tables, table).len(), 1);
        assert!(matches(GroupKind::Tables, "one\ttab\tline\nplain line").is_empty());
    }

    #[test]
    fn test_activex_patterns() {
        let found = matches(
            GroupKind::Activex,
            "CONTROL Forms.CheckBox.1 {8BD21D40-EC42-11CE-9E0D-00AA006002F3}",
        );
        assert!(found.contains(&"Forms.CheckBox.1".to_string()));
        assert!(found.contains(&"CONTROL Forms.CheckBox".to_string()));
        assert!(found.contains(&"{8BD21D40-EC42-11CE-9E0D-00AA006002F3}".to_string()));
    }

    #[test]
    fn test_field_code_patterns() {
        let found = matches(GroupKind::FieldCodes, "{ REF Total \\h } {PAGE} {MERGEFIELD x}");
        assert_eq!(found, vec!["{ REF Total \\h }", "{PAGE}"]);
    }

    #[test]
    fn test_if_start_lookahead() {
        assert_eq!(matches(GroupKind::IfStart, "{IF a} {   if b} {    IF c}").len(), 2);
        assert!(matches(GroupKind::IfStart, "{IFFY} {MERGEFIELD IF}").is_empty());
    }

    #[test]
    fn test_builder_overrides() {
        let custom = PatternGroup::from_patterns(GroupKind::Tables, &[r"\|"], 10).unwrap();
        let registry = PatternRegistry::builder()
            .with_group(custom)
            .with_pattern(GroupKind::Macros, r"\bShell\(")
            .build()
            .unwrap();

        assert_eq!(registry.group(GroupKind::Tables).matchers().len(), 1);
        assert_eq!(
            registry.group(GroupKind::Macros).matchers().len(),
            MACRO_PATTERNS.len() + 1
        );
    }

    #[test]
    fn test_builder_errors() {
        let err = PatternRegistry::builder()
            .with_group(PatternGroup::new(GroupKind::Activex))
            .build()
            .unwrap_err();
        assert!(matches!(err, PatternError::EmptyGroup(ref name) if name == "activex"));

        let err = PatternRegistry::builder()
            .with_pattern(GroupKind::Formulas, "[")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            PatternError::InvalidPattern { ref group, .. } if group == "formulas"
        ));
    }
}
