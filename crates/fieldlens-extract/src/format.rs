//! Container format detection from magic numbers
//!
//! Detection looks only at the leading bytes of a buffer. It is a total
//! function: every input, including empty and truncated buffers, maps to a
//! [`DocumentFormat`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// ZIP local file header signature (`PK\x03\x04`), used by DOCX/DOTX/DOCM
pub const ZIP_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// CFB (Compound File Binary) / OLE2 magic signature
///
/// All OLE-based Microsoft Office formats (DOC, DOT, XLS) start with these 8 bytes.
/// The signature is `D0 CF 11 E0 A1 B1 1A E1` - a mnemonic for "DOC FILE".
pub const OLE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// ASCII prefix of every RTF document
pub const RTF_SIGNATURE: &[u8] = b"{\\rtf";

/// Signatures are only trusted on buffers at least this long
const MIN_SIGNATURE_BUFFER: usize = OLE_SIGNATURE.len();

/// Number of leading bytes sampled by the printable-ratio heuristic
pub const PLAIN_TEXT_SAMPLE: usize = 1000;

/// Printable fraction above which a sample is classified as plain text
pub const PLAIN_TEXT_MIN_RATIO: f64 = 0.90;

/// Container format of an input buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    /// Nothing recognizable
    #[default]
    Unknown,
    /// Mostly printable text
    PlainText,
    /// ZIP archive (OOXML: .docx, .dotx, .docm)
    ZipContainer,
    /// OLE2 compound file (.doc, .dot)
    OleContainer,
    /// Rich Text Format
    Rtf,
}

impl DocumentFormat {
    /// Stable lowercase name used in reports and logs
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::PlainText => "plain_text",
            Self::ZipContainer => "zip_container",
            Self::OleContainer => "ole_container",
            Self::Rtf => "rtf",
        }
    }

    /// Whether the format is a binary container (ZIP or OLE)
    #[inline]
    #[must_use]
    pub const fn is_binary_container(&self) -> bool {
        matches!(self, Self::ZipContainer | Self::OleContainer)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a buffer by its leading bytes
///
/// Order: ZIP signature, OLE signature, `{\rtf` prefix, then the
/// printable-ratio heuristic over the first [`PLAIN_TEXT_SAMPLE`] bytes.
/// Buffers shorter than the longest signature skip the signature checks and
/// can only be `PlainText` or `Unknown`.
///
/// # Examples
///
/// ```
/// use fieldlens_extract::{detect_format, DocumentFormat};
///
/// assert_eq!(detect_format(b"{\\rtf1\\ansi Hello}"), DocumentFormat::Rtf);
/// assert_eq!(detect_format(b"Dear customer,"), DocumentFormat::PlainText);
/// assert_eq!(detect_format(&[]), DocumentFormat::Unknown);
/// ```
#[must_use]
pub fn detect_format(bytes: &[u8]) -> DocumentFormat {
    if bytes.len() >= MIN_SIGNATURE_BUFFER {
        if bytes.starts_with(&ZIP_SIGNATURE) {
            return DocumentFormat::ZipContainer;
        }
        if bytes.starts_with(&OLE_SIGNATURE) {
            return DocumentFormat::OleContainer;
        }
        if bytes.starts_with(RTF_SIGNATURE) {
            return DocumentFormat::Rtf;
        }
    }

    if printable_ratio(&bytes[..bytes.len().min(PLAIN_TEXT_SAMPLE)]) > PLAIN_TEXT_MIN_RATIO {
        DocumentFormat::PlainText
    } else {
        DocumentFormat::Unknown
    }
}

/// Fraction of printable bytes in a sample (0.0 for an empty sample)
///
/// When the sample decodes as UTF-8 (a character cut off by the sample
/// boundary is tolerated), bytes of non-control multi-byte characters count
/// as printable; otherwise only ASCII text bytes do.
#[must_use]
pub fn printable_ratio(sample: &[u8]) -> f64 {
    if sample.is_empty() {
        return 0.0;
    }

    let utf8_prefix = match std::str::from_utf8(sample) {
        Ok(s) => Some(s),
        // A multi-byte character truncated at the end of the sample
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&sample[..e.valid_up_to()]).ok(),
        Err(_) => None,
    };

    let printable = utf8_prefix.map_or_else(
        || sample.iter().filter(|&&b| is_text_byte(b)).count(),
        |text| {
            text.chars()
                .filter(|&c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
                .map(char::len_utf8)
                .sum()
        },
    );

    #[allow(clippy::cast_precision_loss)] // sample is at most PLAIN_TEXT_SAMPLE bytes
    let ratio = printable as f64 / sample.len() as f64;
    ratio
}

/// Printable ASCII or common text whitespace
#[inline]
pub(crate) const fn is_text_byte(b: u8) -> bool {
    matches!(b, 0x20..=0x7E | b'\t' | b'\n' | b'\r')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_zip() {
        let mut bytes = ZIP_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0x14, 0x00, 0x06, 0x00, 0x08, 0x00]);
        assert_eq!(detect_format(&bytes), DocumentFormat::ZipContainer);
    }

    #[test]
    fn test_detect_ole() {
        let mut bytes = OLE_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0x00; 512]);
        assert_eq!(detect_format(&bytes), DocumentFormat::OleContainer);
    }

    #[test]
    fn test_detect_rtf() {
        assert_eq!(
            detect_format(br"{\rtf1\ansi\deff0 Hello}"),
            DocumentFormat::Rtf
        );
    }

    #[test]
    fn test_detect_plain_text() {
        assert_eq!(
            detect_format(b"Dear {MERGEFIELD Name}, thank you."),
            DocumentFormat::PlainText
        );
        assert_eq!(
            detect_format("Grüße aus München, schöne Grüße".as_bytes()),
            DocumentFormat::PlainText
        );
    }

    #[test]
    fn test_detect_unknown_binary() {
        let bytes: Vec<u8> = (0u8..=255).cycle().take(2048).collect();
        assert_eq!(detect_format(&bytes), DocumentFormat::Unknown);
    }

    #[test]
    fn test_short_buffers_never_match_signatures() {
        assert_eq!(detect_format(&[]), DocumentFormat::Unknown);
        assert_eq!(detect_format(&ZIP_SIGNATURE[..2]), DocumentFormat::PlainText);
        assert_eq!(detect_format(&ZIP_SIGNATURE), DocumentFormat::Unknown);
        assert_eq!(detect_format(&OLE_SIGNATURE[..7]), DocumentFormat::Unknown);
        assert_eq!(detect_format(b"{\\rtf"), DocumentFormat::PlainText);
    }

    #[test]
    fn test_only_first_sample_is_inspected() {
        let mut bytes = vec![b'a'; PLAIN_TEXT_SAMPLE];
        bytes.extend_from_slice(&[0u8; 4096]);
        assert_eq!(detect_format(&bytes), DocumentFormat::PlainText);
    }

    #[test]
    fn test_truncated_utf8_tail_is_tolerated() {
        let mut bytes = vec![b'a'; PLAIN_TEXT_SAMPLE - 1];
        bytes.extend_from_slice("ü".as_bytes());
        assert!(printable_ratio(&bytes[..PLAIN_TEXT_SAMPLE]) > PLAIN_TEXT_MIN_RATIO);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(DocumentFormat::OleContainer.to_string(), "ole_container");
        assert_eq!(
            serde_json::to_string(&DocumentFormat::ZipContainer).unwrap(),
            "\"zip_container\""
        );
    }
}
