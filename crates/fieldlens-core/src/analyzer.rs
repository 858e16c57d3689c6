//! Report assembly: the analysis pipeline
//!
//! `bytes → detect → extract → detectors → score → recommend → report`.
//! Detectors run in a fixed order; cancellation is checked before each one
//! and a failing detector is recorded without stopping the others.

use crate::cancel::CancellationToken;
use crate::config::ComplexityConfig;
use crate::error::{ConfigError, Result};
use crate::nesting;
use crate::patterns::{count_group, match_group, GroupKind, PatternRegistry};
use crate::recommend;
use crate::report::ComplexityReport;
use crate::scoring::ScoreCard;
use fieldlens_extract::{detect_format, keys, ContentValidator, ExtractedDocument};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Parse error appended when cancellation stops the analysis
pub const CANCELLED: &str = "analysis cancelled";

/// Macro sample reported for a VBA project found in the container
pub const VBA_PROJECT_SAMPLE: &str = "VBA project";

/// Formatting switches that make a merge field complex
static RE_COMPLEX_SWITCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\\[*#@bf]|\bMERGEFORMAT\b|\bCHARFORMAT\b").expect("valid merge switch regex")
});

/// Whether a merge field sample carries a formatting switch
#[inline]
#[must_use]
pub fn is_complex_merge_field(sample: &str) -> bool {
    RE_COMPLEX_SWITCH.is_match(sample)
}

/// Name referenced by a `MERGEFIELD` or `DOCVARIABLE` instruction sample
fn merge_field_name(sample: &str) -> Option<&str> {
    let mut words = sample.split_whitespace();
    let kind = words.next()?;
    if !kind.eq_ignore_ascii_case("MERGEFIELD") && !kind.eq_ignore_ascii_case("DOCVARIABLE") {
        return None;
    }
    words.next().map(|name| name.trim_matches('"'))
}

/// Drop `«Name»` placeholders that are the displayed result of a coded field
fn without_cached_results(samples: Vec<String>) -> Vec<String> {
    let coded: HashSet<String> = samples
        .iter()
        .filter_map(|s| merge_field_name(s))
        .map(str::to_string)
        .collect();
    samples
        .into_iter()
        .filter(|s| {
            let placeholder = s.strip_prefix('«').and_then(|rest| rest.strip_suffix('»'));
            placeholder.map_or(true, |name| !coded.contains(name.trim()))
        })
        .collect()
}

/// Detector phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Nesting,
    Conditionals,
    Macros,
    Formulas,
    Tables,
    Activex,
    FieldCodes,
}

impl Phase {
    const ALL: [Self; 7] = [
        Self::Nesting,
        Self::Conditionals,
        Self::Macros,
        Self::Formulas,
        Self::Tables,
        Self::Activex,
        Self::FieldCodes,
    ];

    const fn as_str(self) -> &'static str {
        match self {
            Self::Nesting => "nesting",
            Self::Conditionals => "conditional",
            Self::Macros => "macro",
            Self::Formulas => "formula",
            Self::Tables => "table",
            Self::Activex => "activex",
            Self::FieldCodes => "field code",
        }
    }

    const fn enabled(self, config: &ComplexityConfig) -> bool {
        match self {
            Self::Nesting | Self::Conditionals => true,
            Self::Macros => config.detect_macros,
            Self::Formulas => config.detect_formulas,
            Self::Tables => config.detect_tables,
            Self::Activex => config.detect_activex,
            Self::FieldCodes => config.detect_field_codes,
        }
    }
}

/// Runs analyses with one configuration
///
/// `Send + Sync`: share one analyzer across worker threads.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: ComplexityConfig,
}

impl Analyzer {
    /// Analyzer with `config`, used as given
    #[inline]
    #[must_use]
    pub fn new(config: ComplexityConfig) -> Self {
        if let Err(e) = config.validate() {
            log::warn!("Inconsistent analysis configuration: {e}");
        }
        Self { config }
    }

    /// Analyzer with `config`, rejecting inconsistent values
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] found by [`ComplexityConfig::validate`].
    pub fn try_new(config: ComplexityConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &ComplexityConfig {
        &self.config
    }

    /// Analyze a buffer
    #[must_use]
    pub fn analyze(&self, bytes: &[u8]) -> ComplexityReport {
        self.run(bytes, None)
    }

    /// Analyze a buffer, stopping early once `cancel` fires
    #[must_use]
    pub fn analyze_with_cancel(
        &self,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> ComplexityReport {
        self.run(bytes, Some(cancel))
    }

    /// Analyze a document that was extracted already
    #[must_use]
    pub fn analyze_document(
        &self,
        document: &ExtractedDocument,
        cancel: Option<&CancellationToken>,
    ) -> ComplexityReport {
        Run::new(&self.config, document, Vec::new()).execute(cancel)
    }

    fn run(&self, bytes: &[u8], cancel: Option<&CancellationToken>) -> ComplexityReport {
        let format = detect_format(bytes);
        log::debug!("Detected {format} ({} bytes)", bytes.len());

        let extraction = fieldlens_extract::extract(bytes, format);
        let parse_errors = extraction.error_messages();
        Run::new(&self.config, &extraction.document, parse_errors).execute(cancel)
    }
}

/// Analyze `bytes` with an optional configuration and cancellation token
#[must_use]
pub fn analyze(
    bytes: &[u8],
    config: Option<&ComplexityConfig>,
    cancel: Option<&CancellationToken>,
) -> ComplexityReport {
    let analyzer = Analyzer::new(config.cloned().unwrap_or_default());
    analyzer.run(bytes, cancel)
}

/// State of one analysis
struct Run<'a> {
    config: &'a ComplexityConfig,
    registry: &'a PatternRegistry,
    validator: Option<&'a ContentValidator>,
    document: &'a ExtractedDocument,
    text: String,
    card: ScoreCard,
    report: ComplexityReport,
}

impl<'a> Run<'a> {
    fn new(
        config: &'a ComplexityConfig,
        document: &'a ExtractedDocument,
        parse_errors: Vec<String>,
    ) -> Self {
        Self {
            config,
            registry: config.patterns(),
            validator: config.active_validator(),
            document,
            text: document.analysis_text(),
            card: ScoreCard::default(),
            report: ComplexityReport {
                parse_errors,
                document_format: document.format(),
                ..ComplexityReport::default()
            },
        }
    }

    fn execute(mut self, cancel: Option<&CancellationToken>) -> ComplexityReport {
        for phase in Phase::ALL {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                log::warn!("Analysis cancelled before {} detection", phase.as_str());
                self.report.parse_errors.push(CANCELLED.to_string());
                break;
            }
            if !phase.enabled(self.config) {
                continue;
            }
            if let Err(e) = self.phase(phase) {
                log::warn!("{} detection failed: {e}", phase.as_str());
                self.report
                    .parse_errors
                    .push(format!("{} detection failed: {e}", phase.as_str()));
            }
        }
        self.finish()
    }

    fn phase(&mut self, phase: Phase) -> Result<()> {
        match phase {
            Phase::Nesting => {
                self.nesting();
                Ok(())
            }
            Phase::Conditionals => self.conditionals(),
            Phase::Macros => self.macros(),
            Phase::Formulas => self.formulas(),
            Phase::Tables => self.tables(),
            Phase::Activex => self.activex(),
            Phase::FieldCodes => self.field_codes(),
        }
    }

    fn nesting(&mut self) {
        let scan = nesting::scan_conditionals(&self.text);
        self.report.nested_if_depth = scan.max_depth;
        self.card.score_nesting(scan.max_depth, self.config);
    }

    /// IF volume and merge fields
    fn conditionals(&mut self) -> Result<()> {
        let total = count_group(&self.text, self.registry.group(GroupKind::IfStart))?;
        let simple = count_group(&self.text, self.registry.group(GroupKind::IfFull))?;
        self.report.total_if_statements = total;
        self.card.score_conditionals(total, simple, self.config);

        // Uncapped so that every complex field is counted
        let merges = match_group(
            &self.text,
            self.registry.group(GroupKind::MergeFields),
            usize::MAX,
            self.validator,
        )?;
        let merges = without_cached_results(merges.samples);
        let complex: Vec<String> = merges
            .iter()
            .filter(|s| is_complex_merge_field(s))
            .cloned()
            .collect();

        self.report.total_merge_fields = merges.len();
        self.card
            .score_merge_fields(merges.len(), complex.len(), self.config);
        self.report.complex_merge_fields =
            complex.into_iter().take(self.config.max_samples).collect();
        Ok(())
    }

    fn macros(&mut self) -> Result<()> {
        let found = match_group(
            &self.text,
            self.registry.group(GroupKind::Macros),
            self.config.max_samples,
            self.validator,
        )?;
        let mut samples = found.samples;
        let has_project = self.document.has_macros();
        if has_project && samples.len() < self.config.max_samples {
            samples.push(VBA_PROJECT_SAMPLE.to_string());
        }

        self.card.score_macros(found.valid_count, has_project, self.config);
        self.report.macros_found = samples;
        Ok(())
    }

    fn formulas(&mut self) -> Result<()> {
        let found = match_group(
            &self.text,
            self.registry.group(GroupKind::Formulas),
            self.config.max_samples,
            self.validator,
        )?;
        self.card
            .score_formulas(found.valid_count, found.invalid_count, self.config);
        self.report.formulas_found = found.samples;
        self.report.valid_formulas_count = found.valid_count;
        self.report.invalid_formulas_count = found.invalid_count;
        Ok(())
    }

    /// Structural tables from the extractor, tab-separated blocks from text
    fn tables(&mut self) -> Result<()> {
        let blocks = count_group(&self.text, self.registry.group(GroupKind::Tables))?;
        let structural = self.document.meta_usize(keys::TABLE_COUNT).unwrap_or(0);
        let count = structural.max(blocks);
        let depth = self
            .document
            .meta_usize(keys::MAX_TABLE_DEPTH)
            .unwrap_or(0)
            .max(usize::from(count > 0));

        self.report.table_count = count;
        self.card.score_tables(count, depth, self.config);
        Ok(())
    }

    fn activex(&mut self) -> Result<()> {
        let found = match_group(
            &self.text,
            self.registry.group(GroupKind::Activex),
            self.config.max_samples,
            self.validator,
        )?;
        let mut hints = found.samples;
        let structural = self
            .document
            .meta(keys::ACTIVEX)
            .into_iter()
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|h| !h.is_empty());
        for hint in structural {
            if hints.len() >= self.config.max_samples {
                break;
            }
            if !hints.iter().any(|h| h == hint) {
                hints.push(hint.to_string());
            }
        }
        self.card.score_activex(&hints, self.config);
        Ok(())
    }

    /// Auxiliary fields; bare keywords already inside a braced code are dropped
    fn field_codes(&mut self) -> Result<()> {
        let found = match_group(
            &self.text,
            self.registry.group(GroupKind::FieldCodes),
            usize::MAX,
            self.validator,
        )?;
        let braced: HashSet<&str> = found
            .samples
            .iter()
            .filter(|code| code.starts_with('{'))
            .flat_map(|code| code.split(|c: char| c.is_whitespace() || c == '{' || c == '}'))
            .filter(|word| !word.is_empty())
            .collect();
        let mut count = 0;
        let mut codes = Vec::new();
        for code in &found.samples {
            if !code.starts_with('{') && braced.contains(code.as_str()) {
                continue;
            }
            count += 1;
            if codes.len() < self.config.max_field_codes {
                codes.push(code.clone());
            }
        }

        self.card.score_field_codes(count, self.config);
        self.report.field_codes = codes;
        Ok(())
    }

    fn finish(mut self) -> ComplexityReport {
        self.card.parse_errors = self.report.parse_errors.len();
        let outcome = self.card.finalize(self.config);

        log::debug!(
            "Score {} ({}), review={}",
            outcome.score,
            outcome.level,
            outcome.needs_review
        );

        self.report.recommendations = recommend::recommendations(&self.card, self.config);
        self.report.complexity_score = outcome.score;
        self.report.complexity_level = outcome.level;
        self.report.needs_human_review = outcome.needs_review;
        self.report.potential_issues = self.card.issues().to_vec();
        self.report
    }
}
