//! Error types for extraction operations

use thiserror::Error;

/// Errors a format extractor can hit
///
/// None of these escape [`crate::extract`]: each one is recorded on the
/// [`crate::Extraction`] and the printable-run fallback takes over.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// IO error while reading an in-memory part
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Corrupt or truncated ZIP container
    #[error("Invalid ZIP container: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Malformed XML inside one ZIP part
    #[error("Malformed XML in '{part}': {message}")]
    Xml {
        /// Name of the part inside the archive
        part: String,
        /// Parser message
        message: String,
    },

    /// ZIP part larger than the extraction limit
    #[error("Part '{part}' is too large ({size} bytes, max {max} bytes)")]
    PartTooLarge {
        /// Name of the part inside the archive
        part: String,
        /// Declared or read size in bytes
        size: u64,
        /// Maximum allowed part size in bytes
        max: u64,
    },

    /// ZIP container without any word-processing part
    #[error("No document parts found in ZIP container")]
    NoDocumentParts,

    /// Container shorter than its fixed header
    #[error("Truncated {format} container ({len} bytes, header needs {needed})")]
    Truncated {
        /// Format name
        format: &'static str,
        /// Actual buffer length
        len: usize,
        /// Minimum length of a well-formed container
        needed: usize,
    },

    /// RTF with unbalanced groups or truncated content
    #[error("Malformed RTF: {0}")]
    MalformedRtf(String),
}

impl ExtractError {
    /// Create an XML error for a part
    #[inline]
    pub(crate) fn xml(part: &str, err: impl std::fmt::Display) -> Self {
        Self::Xml {
            part: part.to_string(),
            message: err.to_string(),
        }
    }
}
