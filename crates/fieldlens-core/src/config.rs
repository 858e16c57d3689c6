//! Analysis configuration
//!
//! [`ComplexityConfig`] is a plain value. Every field has a documented
//! default and deserializes with `#[serde(default)]`, so a partial TOML or
//! JSON document only overrides what it names.

use crate::error::ConfigError;
use crate::patterns::PatternRegistry;
use fieldlens_extract::ContentValidator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Points added by each detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Per nesting level, when depth exceeds the high threshold
    pub nesting_high_per_level: u32,
    /// Per nesting level, when depth exceeds the medium threshold
    pub nesting_medium_per_level: u32,
    /// Per IF statement, when the statement count reaches its threshold
    pub conditional_per_statement: u32,
    /// Per merge field carrying a formatting switch
    pub complex_merge_field: u32,
    /// Per merge field, when the merge field count exceeds its threshold
    pub merge_field_volume_per_field: u32,
    /// Flat, when macros are present
    pub macros: u32,
    /// Per valid formula
    pub formula: u32,
    /// Flat, when tables are nested
    pub nested_tables: u32,
    /// Flat, when the table count exceeds its threshold
    pub table_volume: u32,
    /// Flat, when ActiveX controls are present
    pub activex: u32,
    /// Per auxiliary field code
    pub field_code: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            nesting_high_per_level: 15,
            nesting_medium_per_level: 8,
            conditional_per_statement: 3,
            complex_merge_field: 6,
            merge_field_volume_per_field: 1,
            macros: 40,
            formula: 5,
            nested_tables: 20,
            table_volume: 8,
            activex: 35,
            field_code: 2,
        }
    }
}

/// Thresholds, weights, caps and feature toggles of one analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityConfig {
    /// IF nesting deeper than this is a medium issue
    pub nesting_medium_threshold: usize,
    /// IF nesting deeper than this is a high issue and forces review
    pub nesting_high_threshold: usize,
    /// IF statement count at which conditional volume is scored
    pub if_count_threshold: usize,
    /// Merge field count above which volume is scored
    pub merge_field_high_threshold: usize,
    /// Table count above which volume is scored
    pub table_count_threshold: usize,
    /// Lowest score of the medium level
    pub medium_cutoff: u32,
    /// Lowest score of the high level
    pub high_cutoff: u32,
    /// Lowest score of the critical level
    pub critical_cutoff: u32,
    /// Detector weights
    pub weights: ScoreWeights,
    /// Cap on merge field, macro and formula samples
    pub max_samples: usize,
    /// Cap on reported field codes
    pub max_field_codes: usize,
    /// Run the macro detector
    pub detect_macros: bool,
    /// Run the formula detector
    pub detect_formulas: bool,
    /// Run the table detector
    pub detect_tables: bool,
    /// Run the ActiveX detector
    pub detect_activex: bool,
    /// Run the field code detector
    pub detect_field_codes: bool,
    /// Gate samples through the content validator
    pub validate_content: bool,
    /// Validator thresholds
    pub validator: ContentValidator,
    /// Custom pattern registry; the built-in one when `None`
    #[serde(skip)]
    pub patterns: Option<Arc<PatternRegistry>>,
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            nesting_medium_threshold: 2,
            nesting_high_threshold: 3,
            if_count_threshold: 10,
            merge_field_high_threshold: 50,
            table_count_threshold: 10,
            medium_cutoff: 20,
            high_cutoff: 50,
            critical_cutoff: 100,
            weights: ScoreWeights::default(),
            max_samples: 20,
            max_field_codes: 50,
            detect_macros: true,
            detect_formulas: true,
            detect_tables: true,
            detect_activex: true,
            detect_field_codes: true,
            validate_content: true,
            validator: ContentValidator::default(),
            patterns: None,
        }
    }
}

impl ComplexityConfig {
    /// Set both nesting thresholds
    #[inline]
    #[must_use = "returns config with nesting thresholds configured"]
    pub fn with_nesting_thresholds(mut self, medium: usize, high: usize) -> Self {
        self.nesting_medium_threshold = medium;
        self.nesting_high_threshold = high;
        self
    }

    /// Set the three level cutoffs
    #[inline]
    #[must_use = "returns config with score cutoffs configured"]
    pub fn with_cutoffs(mut self, medium: u32, high: u32, critical: u32) -> Self {
        self.medium_cutoff = medium;
        self.high_cutoff = high;
        self.critical_cutoff = critical;
        self
    }

    /// Set detector weights
    #[inline]
    #[must_use = "returns config with weights configured"]
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Set the sample cap
    #[inline]
    #[must_use = "returns config with sample cap configured"]
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Set the field code cap
    #[inline]
    #[must_use = "returns config with field code cap configured"]
    pub fn with_max_field_codes(mut self, max_field_codes: usize) -> Self {
        self.max_field_codes = max_field_codes;
        self
    }

    /// Enable or disable content validation
    #[inline]
    #[must_use = "returns config with validation configured"]
    pub fn with_validation(mut self, validate_content: bool) -> Self {
        self.validate_content = validate_content;
        self
    }

    /// Use a custom pattern registry
    #[inline]
    #[must_use = "returns config with pattern registry configured"]
    pub fn with_patterns(mut self, patterns: Arc<PatternRegistry>) -> Self {
        self.patterns = Some(patterns);
        self
    }

    /// The registry analyses run with
    #[inline]
    #[must_use]
    pub fn patterns(&self) -> &PatternRegistry {
        match self.patterns.as_deref() {
            Some(registry) => registry,
            None => PatternRegistry::default_registry(),
        }
    }

    /// The validator, when validation is enabled
    #[inline]
    #[must_use]
    pub const fn active_validator(&self) -> Option<&ContentValidator> {
        if self.validate_content {
            Some(&self.validator)
        } else {
            None
        }
    }

    /// Check that thresholds and cutoffs ascend and caps are non-zero
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.nesting_medium_threshold >= self.nesting_high_threshold {
            return Err(ConfigError::ThresholdOrder {
                medium: self.nesting_medium_threshold,
                high: self.nesting_high_threshold,
            });
        }
        if self.medium_cutoff >= self.high_cutoff || self.high_cutoff >= self.critical_cutoff {
            return Err(ConfigError::CutoffOrder {
                medium: self.medium_cutoff,
                high: self.high_cutoff,
                critical: self.critical_cutoff,
            });
        }
        if self.max_samples == 0 {
            return Err(ConfigError::ZeroCap("max_samples"));
        }
        if self.max_field_codes == 0 {
            return Err(ConfigError::ZeroCap("max_field_codes"));
        }
        Ok(())
    }
}
