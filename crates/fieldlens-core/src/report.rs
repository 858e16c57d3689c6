//! The complexity report

use crate::scoring::{ComplexityIssue, ComplexityLevel, Severity};
use fieldlens_extract::DocumentFormat;
use serde::{Deserialize, Serialize};

/// Result of analyzing one document
///
/// Serializes to the stable JSON form consumed downstream; field order
/// follows declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityReport {
    /// Score after the noise discount
    pub complexity_score: u32,
    /// Level of the score
    pub complexity_level: ComplexityLevel,
    /// Whether a human must review the document
    pub needs_human_review: bool,
    /// Deepest IF nesting
    pub nested_if_depth: usize,
    /// IF statements
    pub total_if_statements: usize,
    /// Unique merge fields
    pub total_merge_fields: usize,
    /// Merge fields with formatting switches (capped)
    pub complex_merge_fields: Vec<String>,
    /// Macro indicators (capped, deduplicated)
    pub macros_found: Vec<String>,
    /// Valid formulas (capped)
    pub formulas_found: Vec<String>,
    /// Issues in detection order
    pub potential_issues: Vec<ComplexityIssue>,
    /// Guidance in fixed check order
    pub recommendations: Vec<String>,
    /// Non-fatal extraction and detector errors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parse_errors: Vec<String>,
    /// Auxiliary field codes (capped)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field_codes: Vec<String>,
    /// Formula matches accepted by the validator
    pub valid_formulas_count: usize,
    /// Formula matches rejected by the validator
    pub invalid_formulas_count: usize,
    /// Detected container format
    #[serde(default)]
    pub document_format: DocumentFormat,
    /// Tables found in structure or text
    #[serde(default)]
    pub table_count: usize,
}

impl ComplexityReport {
    /// Compact JSON
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Indented JSON
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Whether an issue of this type was recorded
    #[must_use]
    pub fn has_issue(&self, issue_type: &str) -> bool {
        self.potential_issues
            .iter()
            .any(|i| i.issue_type == issue_type)
    }

    /// Highest severity among the issues
    #[must_use]
    pub fn max_severity(&self) -> Option<Severity> {
        self.potential_issues.iter().map(|i| i.severity).max()
    }

    /// Whether analysis stopped early on cancellation
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.parse_errors.iter().any(|e| e == crate::analyzer::CANCELLED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::issue_types;

    #[test]
    fn test_empty_lists_are_omitted() {
        let json = ComplexityReport::default().to_json().unwrap();
        assert!(!json.contains("parse_errors"));
        assert!(!json.contains("field_codes"));
        assert!(json.starts_with(r#"{"complexity_score":0,"complexity_level":"low""#));
        assert!(json.contains(r#""document_format":"unknown""#));
    }

    #[test]
    fn test_json_round_trip() {
        let report = ComplexityReport {
            complexity_score: 75,
            complexity_level: ComplexityLevel::High,
            needs_human_review: true,
            potential_issues: vec![ComplexityIssue::new(
                issue_types::MACROS,
                "1 macro indicators found",
                Severity::High,
            )],
            parse_errors: vec!["analysis cancelled".to_string()],
            ..ComplexityReport::default()
        };
        let json = report.to_json_pretty().unwrap();
        let back: ComplexityReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
        assert!(back.was_cancelled());
        assert!(back.has_issue(issue_types::MACROS));
        assert_eq!(back.max_severity(), Some(Severity::High));
    }
}
