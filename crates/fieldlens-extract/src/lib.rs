//! # fieldlens-extract
//!
//! Format detection and best-effort text extraction for legacy
//! word-processing templates.
//!
//! Each supported container gets a lightweight extractor that recovers text
//! and field instructions without implementing the container format in full:
//!
//! | Format | Extractor |
//! |--------|-----------|
//! | ZIP (DOCX/DOTX/DOCM) | [`ooxml`]: `quick_xml` over the word-processing parts |
//! | OLE2 (DOC/DOT) | [`ole`]: printable-run scan plus field keyword windows |
//! | RTF | [`rtf`]: `rtf_parser` lexer driving field reconstruction |
//! | Plain text | lossy UTF-8 decode |
//! | Unknown | lossy decode, printable runs when the decode is garbage |
//!
//! [`extract`] never fails. A failing extractor is recorded on the returned
//! [`Extraction`] and the printable-run scan takes over.
//!
//! ```
//! use fieldlens_extract::{extract_auto, DocumentFormat};
//!
//! let extraction = extract_auto(b"Dear {MERGEFIELD Name}, welcome aboard.");
//! assert_eq!(extraction.document.format(), DocumentFormat::PlainText);
//! assert!(extraction.errors.is_empty());
//! ```

pub mod document;
pub mod error;
pub mod format;
pub mod ole;
pub mod ooxml;
pub mod rtf;
pub mod runs;
pub mod validator;

pub use document::{keys, ExtractedDocument, Extraction};
pub use error::ExtractError;
pub use format::{detect_format, DocumentFormat};
pub use validator::{ContentValidator, Rejection, SpanAssessment};

/// Value of [`keys::FALLBACK`] when the printable-run scan produced the text
pub const PRINTABLE_RUNS_FALLBACK: &str = "printable_runs";

/// Extract a document from a buffer already classified as `format`
///
/// Never fails: extractor errors end up in [`Extraction::errors`].
#[must_use]
pub fn extract(bytes: &[u8], format: DocumentFormat) -> Extraction {
    log::debug!("Extracting {} bytes as {format}", bytes.len());

    let result = match format {
        DocumentFormat::ZipContainer => ooxml::extract(bytes),
        DocumentFormat::OleContainer => ole::extract(bytes).map(Extraction::clean),
        DocumentFormat::Rtf => rtf::extract(bytes).map(Extraction::clean),
        DocumentFormat::PlainText => Ok(Extraction::clean(plain_text(bytes))),
        DocumentFormat::Unknown => Ok(Extraction::clean(unknown(bytes))),
    };

    match result {
        Ok(extraction) => extraction,
        Err(e) => {
            log::warn!("{format} extraction failed, falling back to printable runs: {e}");
            Extraction {
                document: printable_runs(bytes, format),
                errors: vec![e],
            }
        }
    }
}

/// Detect the format and extract in one step
#[must_use]
pub fn extract_auto(bytes: &[u8]) -> Extraction {
    extract(bytes, detect_format(bytes))
}

fn plain_text(bytes: &[u8]) -> ExtractedDocument {
    ExtractedDocument::new(DocumentFormat::PlainText, String::from_utf8_lossy(bytes))
}

/// Lossy decode, replaced by printable runs when the decode is not text
fn unknown(bytes: &[u8]) -> ExtractedDocument {
    let decoded = String::from_utf8_lossy(bytes);
    if ContentValidator::default().is_valid(&decoded) {
        ExtractedDocument::new(DocumentFormat::Unknown, decoded)
    } else {
        printable_runs(bytes, DocumentFormat::Unknown)
    }
}

/// Last-resort extraction; keeps the detected format
fn printable_runs(bytes: &[u8], format: DocumentFormat) -> ExtractedDocument {
    let scanned = runs::scan(bytes, 0, runs::MIN_RUN_LENGTH);
    ExtractedDocument::new(format, scanned.joined())
        .with_metadata(keys::TEXT_RUNS, scanned.runs.len().to_string())
        .with_metadata(keys::FALLBACK, PRINTABLE_RUNS_FALLBACK)
}
