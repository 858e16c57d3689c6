//! The extracted, read-only view of an input buffer

use crate::error::ExtractError;
use crate::format::DocumentFormat;
use serde::Serialize;
use std::collections::BTreeMap;

/// Well-known metadata keys set by the extractors
pub mod keys {
    /// Comma-separated names of the ZIP parts that contributed text
    pub const PARTS: &str = "parts";
    /// Number of tables seen in the document structure
    pub const TABLE_COUNT: &str = "table_count";
    /// Deepest table nesting seen (1 = top-level table only)
    pub const MAX_TABLE_DEPTH: &str = "max_table_depth";
    /// Comma-separated ActiveX / embedded control hints
    pub const ACTIVEX: &str = "activex";
    /// Number of printable runs recovered from a binary buffer
    pub const TEXT_RUNS: &str = "text_runs";
    /// Set when the text came from the printable-run fallback
    pub const FALLBACK: &str = "fallback";
}

/// Text and structural signals recovered from one input buffer
///
/// Produced once per buffer by [`crate::extract`] and consumed read-only by
/// every analyzer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedDocument {
    format: DocumentFormat,
    text: String,
    field_codes: Vec<String>,
    #[serde(skip)]
    codes_inline: bool,
    has_macros: bool,
    metadata: BTreeMap<String, String>,
}

impl ExtractedDocument {
    /// Create a document holding only text
    #[inline]
    #[must_use]
    pub fn new(format: DocumentFormat, text: impl Into<String>) -> Self {
        Self {
            format,
            text: text.into(),
            ..Self::default()
        }
    }

    /// Attach field codes
    #[inline]
    #[must_use = "returns document with field codes attached"]
    pub fn with_field_codes(mut self, field_codes: Vec<String>) -> Self {
        self.field_codes = field_codes;
        self
    }

    /// Mark every field code as already present in the text
    #[inline]
    #[must_use = "returns document with inline field codes marked"]
    pub fn with_inline_field_codes(mut self) -> Self {
        self.codes_inline = true;
        self
    }

    /// Mark the document as carrying macros
    #[inline]
    #[must_use = "returns document with macro flag configured"]
    pub fn with_macros(mut self, has_macros: bool) -> Self {
        self.has_macros = has_macros;
        self
    }

    /// Attach one metadata entry
    #[inline]
    #[must_use = "returns document with metadata entry attached"]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Format the document was extracted as
    #[inline]
    #[must_use]
    pub const fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Best-effort plain text
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Field instructions recovered by the extractor
    #[inline]
    #[must_use]
    pub fn field_codes(&self) -> &[String] {
        &self.field_codes
    }

    /// Whether the container carries a macro project
    #[inline]
    #[must_use]
    pub const fn has_macros(&self) -> bool {
        self.has_macros
    }

    /// All metadata entries, ordered by key
    #[inline]
    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Look up one metadata value
    #[inline]
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Look up a numeric metadata value
    #[inline]
    #[must_use]
    pub fn meta_usize(&self, key: &str) -> Option<usize> {
        self.meta(key).and_then(|v| v.parse().ok())
    }

    /// Text handed to the pattern analyzers
    ///
    /// The extracted text followed by every field code that does not already
    /// occur in it, one per line. Documents built
    /// [`with_inline_field_codes`](Self::with_inline_field_codes) return the
    /// text alone, so the ZIP and RTF codes are neither counted twice nor
    /// searched for.
    #[must_use]
    pub fn analysis_text(&self) -> String {
        let mut out = self.text.clone();
        if self.codes_inline {
            return out;
        }
        for code in &self.field_codes {
            if !self.text.contains(code.as_str()) {
                out.push('\n');
                out.push_str(code);
            }
        }
        out
    }
}

/// Result of extraction: a document plus the non-fatal errors met on the way
#[derive(Debug)]
pub struct Extraction {
    /// The recovered document (possibly from the fallback extractor)
    pub document: ExtractedDocument,
    /// Recovered failures, in the order they happened
    pub errors: Vec<ExtractError>,
}

impl Extraction {
    /// Extraction that met no errors
    #[inline]
    #[must_use]
    pub fn clean(document: ExtractedDocument) -> Self {
        Self {
            document,
            errors: Vec::new(),
        }
    }

    /// Error messages, suitable for a report's `parse_errors`
    #[must_use]
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}
