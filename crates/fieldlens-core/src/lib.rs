//! # fieldlens-core
//!
//! Complexity analysis for legacy word-processing templates.
//!
//! The engine takes the raw bytes of a template (DOCX, DOC, RTF or plain
//! text), extracts its text with [`fieldlens_extract`] and measures what makes
//! it hard to migrate automatically: merge fields, nested IF fields, macros,
//! formulas, tables, ActiveX controls and auxiliary field codes. The findings
//! fold into a weighted score, a level, a review decision and a list of
//! recommendations.
//!
//! Analysis is a pure function of the input bytes and the configuration. It
//! does no I/O and never fails: extraction and detector errors are reported in
//! [`ComplexityReport::parse_errors`].
//!
//! ## Quick start
//!
//! ```
//! use fieldlens_core::{analyze, ComplexityLevel};
//!
//! let template = br#"{IF a "{IF b "{IF c "{IF d "deep" "d"}" "c"}" "b"}" "a"}"#;
//! let report = analyze(template, None, None);
//!
//! assert_eq!(report.nested_if_depth, 4);
//! assert_eq!(report.complexity_level, ComplexityLevel::High);
//! assert!(report.needs_human_review);
//! ```
//!
//! ## Sharing an analyzer
//!
//! [`Analyzer`] is `Send + Sync` and holds no mutable state, so one instance
//! can serve a thread pool. A [`CancellationToken`] stops an analysis between
//! detector phases and yields the partial report.

pub mod analyzer;
pub mod cancel;
pub mod config;
pub mod error;
pub mod nesting;
pub mod patterns;
pub mod recommend;
pub mod report;
pub mod scoring;

pub use analyzer::{analyze, is_complex_merge_field, Analyzer, CANCELLED};
pub use cancel::CancellationToken;
pub use config::{ComplexityConfig, ScoreWeights};
pub use error::{ConfigError, PatternError};
pub use nesting::{calculate_nesting_depth, scan_conditionals, NestingScan, IF_LOOKAHEAD_CHARS};
pub use patterns::{
    FeatureMatcher, GroupKind, PatternGroup, PatternRegistry, PatternRegistryBuilder, RegexMatcher,
};
pub use recommend::recommendations;
pub use report::ComplexityReport;
pub use scoring::{issue_types, ComplexityIssue, ComplexityLevel, ScoreCard, Severity};

pub use fieldlens_extract::{ContentValidator, DocumentFormat, ExtractedDocument};
