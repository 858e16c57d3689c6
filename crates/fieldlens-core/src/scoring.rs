//! Complexity scoring
//!
//! Each detector records its findings on a [`ScoreCard`]; a finding above its
//! threshold appends one [`ComplexityIssue`] and adds its weight. The card
//! reduces to a score, a level and the review decision in
//! [`ScoreCard::finalize`].

use crate::config::ComplexityConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Issue type names, as they appear in reports
pub mod issue_types {
    /// IF fields nested beyond a threshold
    pub const NESTED_CONDITIONALS: &str = "nested_conditionals";
    /// Many IF fields
    pub const CONDITIONAL_VOLUME: &str = "conditional_volume";
    /// Merge fields with formatting switches
    pub const COMPLEX_MERGE_FIELDS: &str = "complex_merge_fields";
    /// Many merge fields
    pub const MERGE_FIELD_VOLUME: &str = "merge_field_volume";
    /// VBA macros
    pub const MACROS: &str = "macros";
    /// Formula fields
    pub const FORMULAS: &str = "formulas";
    /// Tables inside tables
    pub const NESTED_TABLES: &str = "nested_tables";
    /// Many tables
    pub const TABLE_VOLUME: &str = "table_volume";
    /// ActiveX / form controls
    pub const ACTIVEX: &str = "activex";
    /// Auxiliary field codes
    pub const FIELD_CODES: &str = "field_codes";
}

/// Severity of one issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Worth noting
    Low,
    /// Needs attention during conversion
    Medium,
    /// Needs a human
    High,
}

/// One finding that contributed to the score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityIssue {
    /// Issue type, one of [`issue_types`]
    #[serde(rename = "type")]
    pub issue_type: String,
    /// Human-readable description with counts
    pub description: String,
    /// Severity
    pub severity: Severity,
}

impl ComplexityIssue {
    /// Create an issue
    #[inline]
    #[must_use]
    pub fn new(issue_type: &str, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            issue_type: issue_type.to_string(),
            description: description.into(),
            severity,
        }
    }
}

/// Discrete complexity level
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityLevel {
    /// Below the medium cutoff
    #[default]
    Low,
    /// From the medium cutoff
    Medium,
    /// From the high cutoff
    High,
    /// From the critical cutoff
    Critical,
}

impl ComplexityLevel {
    /// Level of a score under the configured cutoffs
    #[must_use]
    pub const fn from_score(score: u32, config: &ComplexityConfig) -> Self {
        if score >= config.critical_cutoff {
            Self::Critical
        } else if score >= config.high_cutoff {
            Self::High
        } else if score >= config.medium_cutoff {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Lowercase name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final reduction of a [`ScoreCard`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Score after the noise discount
    pub score: u32,
    /// Level of the score
    pub level: ComplexityLevel,
    /// Whether a human must review the document
    pub needs_review: bool,
}

/// Findings gathered by the detectors of one analysis
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreCard {
    raw_score: u32,
    issues: Vec<ComplexityIssue>,
    force_review: bool,
    /// Deepest IF nesting
    pub nested_if_depth: usize,
    /// IF statements
    pub if_statements: usize,
    /// Merge fields
    pub merge_fields: usize,
    /// Merge fields with formatting switches
    pub complex_merge_fields: usize,
    /// Whether macros were found
    pub macros: bool,
    /// Formulas accepted by the validator
    pub valid_formulas: usize,
    /// Formula matches rejected by the validator
    pub invalid_formulas: usize,
    /// Tables
    pub tables: usize,
    /// Deepest table nesting
    pub max_table_depth: usize,
    /// ActiveX hints
    pub activex: usize,
    /// Auxiliary field codes
    pub field_codes: usize,
    /// Non-fatal errors met during extraction and analysis
    pub parse_errors: usize,
}

impl ScoreCard {
    /// Issues in detection order
    #[inline]
    #[must_use]
    pub fn issues(&self) -> &[ComplexityIssue] {
        &self.issues
    }

    /// Score before the noise discount
    #[inline]
    #[must_use]
    pub const fn raw_score(&self) -> u32 {
        self.raw_score
    }

    fn add(&mut self, points: u32, issue: ComplexityIssue) {
        self.raw_score = self.raw_score.saturating_add(points);
        self.issues.push(issue);
    }

    /// IF nesting depth
    pub fn score_nesting(&mut self, depth: usize, config: &ComplexityConfig) {
        self.nested_if_depth = depth;
        let weights = &config.weights;
        if depth > config.nesting_high_threshold {
            self.force_review = true;
            self.add(
                times(depth, weights.nesting_high_per_level),
                ComplexityIssue::new(
                    issue_types::NESTED_CONDITIONALS,
                    format!(
                        "IF fields nested {depth} levels deep (high threshold {})",
                        config.nesting_high_threshold
                    ),
                    Severity::High,
                ),
            );
        } else if depth > config.nesting_medium_threshold {
            self.add(
                times(depth, weights.nesting_medium_per_level),
                ComplexityIssue::new(
                    issue_types::NESTED_CONDITIONALS,
                    format!(
                        "IF fields nested {depth} levels deep (medium threshold {})",
                        config.nesting_medium_threshold
                    ),
                    Severity::Medium,
                ),
            );
        }
    }

    /// IF statement volume; `simple` counts IFs without nested fields
    pub fn score_conditionals(&mut self, total: usize, simple: usize, config: &ComplexityConfig) {
        self.if_statements = total;
        if total >= config.if_count_threshold {
            self.add(
                times(total, config.weights.conditional_per_statement),
                ComplexityIssue::new(
                    issue_types::CONDITIONAL_VOLUME,
                    format!("{total} conditional fields ({simple} without nested fields)"),
                    Severity::Medium,
                ),
            );
        }
    }

    /// Merge field volume and formatting switches
    pub fn score_merge_fields(&mut self, total: usize, complex: usize, config: &ComplexityConfig) {
        self.merge_fields = total;
        self.complex_merge_fields = complex;
        if complex > 0 {
            self.add(
                times(complex, config.weights.complex_merge_field),
                ComplexityIssue::new(
                    issue_types::COMPLEX_MERGE_FIELDS,
                    format!("{complex} merge fields with formatting switches"),
                    Severity::Medium,
                ),
            );
        }
        if total > config.merge_field_high_threshold {
            self.add(
                times(total, config.weights.merge_field_volume_per_field),
                ComplexityIssue::new(
                    issue_types::MERGE_FIELD_VOLUME,
                    format!(
                        "{total} merge fields (threshold {})",
                        config.merge_field_high_threshold
                    ),
                    Severity::Low,
                ),
            );
        }
    }

    /// Macro presence; `samples` counts valid macro matches
    pub fn score_macros(&mut self, samples: usize, has_project: bool, config: &ComplexityConfig) {
        if samples == 0 && !has_project {
            return;
        }
        self.macros = true;
        self.force_review = true;
        let description = if has_project {
            format!("VBA project present ({samples} macro indicators in text)")
        } else {
            format!("{samples} macro indicators found")
        };
        self.add(
            config.weights.macros,
            ComplexityIssue::new(issue_types::MACROS, description, Severity::High),
        );
    }

    /// Formula matches, split by the validator
    pub fn score_formulas(&mut self, valid: usize, invalid: usize, config: &ComplexityConfig) {
        self.valid_formulas = valid;
        self.invalid_formulas = invalid;
        if valid > 0 {
            self.add(
                times(valid, config.weights.formula),
                ComplexityIssue::new(
                    issue_types::FORMULAS,
                    format!("{valid} formula fields"),
                    Severity::Medium,
                ),
            );
        }
    }

    /// Table count and nesting
    pub fn score_tables(&mut self, count: usize, max_depth: usize, config: &ComplexityConfig) {
        self.tables = count;
        self.max_table_depth = max_depth;
        if max_depth >= 2 {
            self.add(
                config.weights.nested_tables,
                ComplexityIssue::new(
                    issue_types::NESTED_TABLES,
                    format!("Tables nested {max_depth} levels deep"),
                    Severity::Medium,
                ),
            );
        }
        if count > config.table_count_threshold {
            self.add(
                config.weights.table_volume,
                ComplexityIssue::new(
                    issue_types::TABLE_VOLUME,
                    format!("{count} tables (threshold {})", config.table_count_threshold),
                    Severity::Low,
                ),
            );
        }
    }

    /// ActiveX hints
    pub fn score_activex(&mut self, hints: &[String], config: &ComplexityConfig) {
        self.activex = hints.len();
        if hints.is_empty() {
            return;
        }
        self.force_review = true;
        self.add(
            config.weights.activex,
            ComplexityIssue::new(
                issue_types::ACTIVEX,
                format!("ActiveX controls: {}", hints.join(", ")),
                Severity::High,
            ),
        );
    }

    /// Auxiliary field codes
    pub fn score_field_codes(&mut self, count: usize, config: &ComplexityConfig) {
        self.field_codes = count;
        if count > 0 {
            self.add(
                times(count, config.weights.field_code),
                ComplexityIssue::new(
                    issue_types::FIELD_CODES,
                    format!("{count} auxiliary field codes"),
                    Severity::Low,
                ),
            );
        }
    }

    /// Reduce to score, level and review decision
    ///
    /// When invalid formula matches outnumber valid ones more than two to
    /// one, the text is probably mis-decoded binary and the score is scaled
    /// by `valid / (valid + invalid + 1)`.
    #[must_use]
    pub fn finalize(&self, config: &ComplexityConfig) -> Outcome {
        let mut score = self.raw_score;
        if self.invalid_formulas > self.valid_formulas.saturating_mul(2) {
            let valid = self.valid_formulas as u64;
            let total = valid + self.invalid_formulas as u64 + 1;
            let scaled = u64::from(score) * valid / total;
            score = u32::try_from(scaled).unwrap_or(u32::MAX);
            log::debug!(
                "Noise discount: {} valid / {} invalid formulas, score {} -> {score}",
                self.valid_formulas,
                self.invalid_formulas,
                self.raw_score
            );
        }

        let level = ComplexityLevel::from_score(score, config);
        let needs_review = self.force_review
            || self.issues.iter().any(|i| i.severity == Severity::High)
            || level >= ComplexityLevel::High;

        Outcome {
            score,
            level,
            needs_review,
        }
    }
}

/// `count × weight`, saturating
fn times(count: usize, weight: u32) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX).saturating_mul(weight)
}
