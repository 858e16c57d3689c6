//! Human-readable guidance derived from a score card
//!
//! Checks run in a fixed order so the same document always yields the same
//! list.

use crate::config::ComplexityConfig;
use crate::scoring::ScoreCard;

/// Line emitted when no check fires
pub const NO_ISSUES: &str = "Document is suitable for automated conversion";

/// Recommendations for a finished score card
#[must_use]
pub fn recommendations(card: &ScoreCard, config: &ComplexityConfig) -> Vec<String> {
    let mut out = Vec::new();
    let depth = card.nested_if_depth;

    if depth > config.nesting_high_threshold {
        out.push(format!(
            "Review nested conditional logic manually: IF fields are nested {depth} levels deep"
        ));
    } else if depth > config.nesting_medium_threshold {
        out.push(format!(
            "Review nested conditional logic ({depth} levels) for simplification"
        ));
    }
    if card.if_statements >= config.if_count_threshold {
        out.push(format!(
            "Consolidate the {} conditional fields into data-driven rules where possible",
            card.if_statements
        ));
    }
    if card.complex_merge_fields > 0 {
        out.push(format!(
            "Verify that the formatting switches of {} merge fields are reproduced by the target system",
            card.complex_merge_fields
        ));
    }
    if card.merge_fields > config.merge_field_high_threshold {
        out.push(format!(
            "Prepare a complete field mapping for the {} merge fields before migration",
            card.merge_fields
        ));
    }
    if card.macros {
        out.push(
            "Macros will not convert: reimplement or remove the VBA code before migration"
                .to_string(),
        );
    }
    if card.valid_formulas > 0 {
        out.push(format!(
            "Verify the results of {} formula fields after conversion",
            card.valid_formulas
        ));
    }
    if card.max_table_depth >= 2 {
        out.push("Check the layout of nested tables after conversion".to_string());
    }
    if card.tables > config.table_count_threshold {
        out.push(format!(
            "Review the layout of the {} tables after conversion",
            card.tables
        ));
    }
    if card.activex > 0 {
        out.push(
            "ActiveX controls require manual replacement with native form elements".to_string(),
        );
    }
    if card.field_codes > 0 {
        out.push(format!(
            "Confirm the target system supports the {} auxiliary field codes",
            card.field_codes
        ));
    }
    if card.parse_errors > 0 {
        out.push("Document could not be fully parsed: manual review recommended".to_string());
    }

    if out.is_empty() {
        out.push(NO_ISSUES.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_card_gets_single_line() {
        let recs = recommendations(&ScoreCard::default(), &ComplexityConfig::default());
        assert_eq!(recs, vec![NO_ISSUES.to_string()]);
    }

    #[test]
    fn test_fixed_order() {
        let config = ComplexityConfig::default();
        let mut card = ScoreCard::default();
        card.parse_errors = 1;
        card.score_activex(&["ActiveX".to_string()], &config);
        card.score_macros(1, false, &config);
        card.score_nesting(3, &config);

        let recs = recommendations(&card, &config);
        assert_eq!(recs.len(), 4);
        assert!(recs[0].starts_with("Review nested conditional logic (3 levels)"));
        assert!(recs[1].starts_with("Macros will not convert"));
        assert!(recs[2].starts_with("ActiveX controls"));
        assert!(recs[3].contains("manual review recommended"));
        assert_eq!(recs, recommendations(&card, &config));
    }

    #[test]
    fn test_deep_nesting_replaces_medium_line() {
        let config = ComplexityConfig::default();
        let mut card = ScoreCard::default();
        card.score_nesting(5, &config);
        let recs = recommendations(&card, &config);
        assert_eq!(recs.len(), 1);
        assert!(recs[0].contains("5 levels deep"));
    }
}
