//! Property-Based Tests
//!
//! Extraction must never panic, whatever the input, and the recovered text
//! must satisfy the run and validator invariants.

use fieldlens_extract::runs::{self, is_noise, MIN_RUN_LENGTH};
use fieldlens_extract::validator::{clean, is_printable_char};
use fieldlens_extract::{extract_auto, rtf, ContentValidator};
use proptest::prelude::*;

// ============================================================================
// Extraction
// ============================================================================

/// Property: any buffer extracts without panic and keeps its detected format
#[test]
fn proptest_extract_never_panics() {
    proptest!(|(bytes in prop::collection::vec(any::<u8>(), 0..4096))| {
        let extraction = extract_auto(&bytes);
        prop_assert_eq!(
            extraction.document.format(),
            fieldlens_extract::detect_format(&bytes)
        );
    });
}

/// Property: every kept run is long enough and passed the noise filter
#[test]
fn proptest_runs_respect_length_and_noise() {
    proptest!(|(bytes in prop::collection::vec(any::<u8>(), 0..4096))| {
        let scanned = runs::scan(&bytes, 0, MIN_RUN_LENGTH);
        for run in &scanned.runs {
            prop_assert!(run.text.chars().count() >= MIN_RUN_LENGTH);
            prop_assert!(!is_noise(&run.text));
            prop_assert_eq!(run.text.trim(), run.text.as_str());
        }
    });
}

/// Property: plain RTF text comes back with normalized whitespace
#[test]
fn proptest_rtf_plain_text() {
    proptest!(|(text in "[a-zA-Z][a-zA-Z ]{0,60}")| {
        let rtf_bytes = format!("{{\\rtf1\\ansi {text}}}");
        let document = rtf::extract(rtf_bytes.as_bytes()).unwrap();
        let expected = text.split_whitespace().collect::<Vec<_>>().join(" ");
        prop_assert_eq!(document.text(), expected.as_str());
    });
}

// ============================================================================
// Validation
// ============================================================================

/// Property: cleaned spans hold only printable characters and whitespace
#[test]
fn proptest_clean_removes_non_printable() {
    proptest!(|(span in any::<String>())| {
        let cleaned = clean(&span);
        prop_assert!(cleaned.chars().all(|c| is_printable_char(c) || c.is_whitespace()));
        prop_assert!(cleaned.chars().count() <= span.chars().count());
    });
}

/// Property: printable ASCII spans of two or more characters are accepted
#[test]
fn proptest_printable_ascii_is_valid() {
    proptest!(|(span in "[!-~]{2,80}")| {
        prop_assert!(ContentValidator::default().is_valid(&span));
    });
}
