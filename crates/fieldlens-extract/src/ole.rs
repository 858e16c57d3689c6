//! OLE2 compound file (.doc / .dot) extraction
//!
//! The compound-file directory is not parsed. Text is recovered by scanning
//! the whole body for printable runs (see [`crate::runs`]), and field
//! instructions are recovered by a keyword search that emits a bounded
//! context window around every hit.

use crate::document::{keys, ExtractedDocument};
use crate::error::ExtractError;
use crate::format::DocumentFormat;
use crate::runs::{self, map_byte, map_utf16_unit, MIN_RUN_LENGTH};
use crate::validator::{self, ContentValidator};

/// Size of the fixed CFB header preceding the first sector
pub const OLE_HEADER_SIZE: usize = 512;

/// Field keywords searched for in the raw buffer
pub const FIELD_KEYWORDS: &[&str] = &[
    "MERGEFIELD",
    "DOCVARIABLE",
    "IF",
    "FORMTEXT",
    "FORMCHECKBOX",
    "FORMDROPDOWN",
    "INCLUDETEXT",
    "INCLUDEPICTURE",
    "MACROBUTTON",
    "ASK",
    "FILLIN",
    "REF",
    "SET",
];

/// Bytes kept before a keyword hit
const CONTEXT_BEFORE: usize = 16;

/// Bytes kept from the keyword hit onwards
const CONTEXT_AFTER: usize = 96;

/// Upper bound on keyword hits turned into field codes
pub const MAX_KEYWORD_HITS: usize = 200;

/// Stream names and source markers that only exist in macro-enabled files
const MACRO_MARKERS: &[&str] = &["_VBA_PROJECT", "Attribute VB_Name"];

/// Storage names of a VBA project, matched against directory entries only
const MACRO_STORAGE_NAMES: &[&str] = &["_VBA_PROJECT", "Macros"];

/// Size of one compound-file directory entry
pub const DIRECTORY_ENTRY_SIZE: usize = 128;

/// Offset of the UTF-16LE name length (terminator included) in an entry
const ENTRY_NAME_LEN_OFFSET: usize = 64;

/// Extract text, field codes and macro presence from an OLE buffer
///
/// # Errors
///
/// Returns [`ExtractError::Truncated`] when the buffer does not even hold a
/// complete header.
pub fn extract(bytes: &[u8]) -> Result<ExtractedDocument, ExtractError> {
    if bytes.len() <= OLE_HEADER_SIZE {
        return Err(ExtractError::Truncated {
            format: "OLE",
            len: bytes.len(),
            needed: OLE_HEADER_SIZE + 1,
        });
    }

    let scanned = runs::scan(bytes, OLE_HEADER_SIZE, MIN_RUN_LENGTH);
    let field_codes = keyword_field_codes(&bytes[OLE_HEADER_SIZE..]);
    let has_macros = has_macro_markers(bytes);

    log::debug!(
        "OLE: {} runs kept, {} dropped as noise, {} field codes, macros={}",
        scanned.runs.len(),
        scanned.dropped,
        field_codes.len(),
        has_macros
    );

    Ok(ExtractedDocument::new(DocumentFormat::OleContainer, scanned.joined())
        .with_field_codes(field_codes)
        .with_macros(has_macros)
        .with_metadata(keys::TEXT_RUNS, scanned.runs.len().to_string()))
}

/// Search for field keywords and return validated context windows
///
/// Both 8-bit and UTF-16LE encodings are searched. Windows are clipped at the
/// first byte that cannot be text, deduplicated, and capped at
/// [`MAX_KEYWORD_HITS`].
#[must_use]
pub fn keyword_field_codes(body: &[u8]) -> Vec<String> {
    let validator = ContentValidator::default();
    let mut codes: Vec<String> = Vec::new();
    let mut hits = 0usize;

    'keywords: for keyword in FIELD_KEYWORDS {
        for encoding in [Encoding::Ascii, Encoding::Utf16Le] {
            let needle = encoding.encode(keyword);
            for hit in find_all(body, &needle) {
                if !encoding.is_keyword_boundary(body, hit, needle.len()) {
                    continue;
                }
                hits += 1;
                if hits > MAX_KEYWORD_HITS {
                    break 'keywords;
                }
                let window = encoding.context_window(body, hit);
                let window = validator::clean(window.trim());
                if validator.is_valid(&window) && !codes.contains(&window) {
                    codes.push(window);
                }
            }
        }
    }
    codes
}

/// Whether the buffer carries a VBA project
///
/// Storage names only count as the name of a directory entry: body text
/// mentioning "Macros" is not a macro storage.
#[must_use]
pub fn has_macro_markers(bytes: &[u8]) -> bool {
    MACRO_MARKERS
        .iter()
        .any(|m| find_all(bytes, m.as_bytes()).next().is_some())
        || MACRO_STORAGE_NAMES
            .iter()
            .any(|name| has_directory_entry(bytes, name))
}

/// Whether a 128-byte aligned directory entry is named `name`
///
/// Directory sectors start on a sector boundary and sectors are multiples of
/// [`DIRECTORY_ENTRY_SIZE`], so entries sit at aligned offsets.
fn has_directory_entry(bytes: &[u8], name: &str) -> bool {
    let encoded = Encoding::Utf16Le.encode(name);
    let Ok(expected_len) = u16::try_from(encoded.len() + 2) else {
        return false;
    };
    bytes.chunks_exact(DIRECTORY_ENTRY_SIZE).any(|entry| {
        let declared = u16::from_le_bytes([
            entry[ENTRY_NAME_LEN_OFFSET],
            entry[ENTRY_NAME_LEN_OFFSET + 1],
        ]);
        declared == expected_len
            && entry.starts_with(&encoded)
            && entry[encoded.len()..encoded.len() + 2] == [0, 0]
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Ascii,
    Utf16Le,
}

impl Encoding {
    const fn stride(self) -> usize {
        match self {
            Self::Ascii => 1,
            Self::Utf16Le => 2,
        }
    }

    fn encode(self, keyword: &str) -> Vec<u8> {
        match self {
            Self::Ascii => keyword.as_bytes().to_vec(),
            Self::Utf16Le => keyword.bytes().flat_map(|b| [b, 0]).collect(),
        }
    }

    /// Character at `pos`, if it is text in this encoding
    fn char_at(self, body: &[u8], pos: usize) -> Option<char> {
        match self {
            Self::Ascii => body.get(pos).copied().and_then(map_byte),
            Self::Utf16Le => {
                let lo = *body.get(pos)?;
                let hi = *body.get(pos + 1)?;
                map_utf16_unit(lo, hi)
            }
        }
    }

    /// A hit must be preceded by a field opener or whitespace and followed
    /// by whitespace
    fn is_keyword_boundary(self, body: &[u8], hit: usize, len: usize) -> bool {
        let before = hit
            .checked_sub(self.stride())
            .and_then(|p| self.char_at(body, p));
        let after = self.char_at(body, hit + len);
        let before_ok = matches!(before, Some('{' | ' ' | '\t' | '\n' | '"'));
        let after_ok = matches!(after, Some(' ' | '\t'));
        before_ok && after_ok
    }

    fn context_window(self, body: &[u8], hit: usize) -> String {
        let stride = self.stride();

        let mut start = hit;
        for _ in 0..CONTEXT_BEFORE / stride {
            match start
                .checked_sub(stride)
                .filter(|&p| self.char_at(body, p).is_some())
            {
                Some(p) => start = p,
                None => break,
            }
        }

        let mut window = String::new();
        let mut pos = start;
        let limit = hit + CONTEXT_AFTER * stride;
        while pos < limit {
            match self.char_at(body, pos) {
                Some(c) => window.push(c),
                None => break,
            }
            pos += stride;
        }
        window
    }
}

/// Offsets of every occurrence of `needle` in `haystack`
fn find_all<'a>(haystack: &'a [u8], needle: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    let windows = if needle.is_empty() || needle.len() > haystack.len() {
        None
    } else {
        Some(haystack.windows(needle.len()))
    };
    windows
        .into_iter()
        .flatten()
        .enumerate()
        .filter(move |(_, w)| *w == needle)
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OLE_SIGNATURE;

    fn ole_buffer(body: &[u8]) -> Vec<u8> {
        let mut bytes = OLE_SIGNATURE.to_vec();
        bytes.resize(OLE_HEADER_SIZE, 0);
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn test_truncated_buffer_is_an_error() {
        let result = extract(&OLE_SIGNATURE);
        assert!(matches!(result, Err(ExtractError::Truncated { len: 8, .. })));
    }

    #[test]
    fn test_extracts_body_text_and_skips_header() {
        let mut body = vec![0u8; 32];
        body.extend_from_slice(b"Dear customer, thank you for your order");
        body.extend_from_slice(&[0u8; 32]);
        let doc = extract(&ole_buffer(&body)).unwrap();

        assert_eq!(doc.format(), DocumentFormat::OleContainer);
        assert_eq!(doc.text(), "Dear customer, thank you for your order");
        assert_eq!(doc.meta_usize(keys::TEXT_RUNS), Some(1));
        assert!(!doc.has_macros());
    }

    #[test]
    fn test_keyword_windows_become_field_codes() {
        let mut body = vec![0u8; 8];
        body.push(0x13);
        body.extend_from_slice(b" MERGEFIELD Total \\# \"0.00\" ");
        body.push(0x15);
        body.extend_from_slice(&[0u8; 8]);
        let doc = extract(&ole_buffer(&body)).unwrap();

        assert_eq!(
            doc.field_codes(),
            &["{ MERGEFIELD Total \\# \"0.00\" }".to_string()]
        );
    }

    #[test]
    fn test_keyword_needs_boundaries() {
        let body = b"\0\0XMERGEFIELDS are not fields\0\0IFFY\0";
        assert!(keyword_field_codes(body).is_empty());
    }

    #[test]
    fn test_utf16_keyword_windows() {
        let mut body = vec![0u8; 4];
        for b in b"{ IF x = 1 \"yes\" \"no\" }" {
            body.push(*b);
            body.push(0);
        }
        body.extend_from_slice(&[0xFF, 0xFF]);
        let codes = keyword_field_codes(&body);
        assert_eq!(codes, vec!["{ IF x = 1 \"yes\" \"no\" }".to_string()]);
    }

    #[test]
    fn test_keyword_hits_are_capped() {
        let mut body = Vec::new();
        for i in 0..(MAX_KEYWORD_HITS + 50) {
            body.extend_from_slice(format!("\0{{ REF bookmark{i} }}\0").as_bytes());
        }
        let codes = keyword_field_codes(&body);
        assert_eq!(codes.len(), MAX_KEYWORD_HITS);
    }

    /// One directory entry named `name`
    fn directory_entry(name: &str) -> Vec<u8> {
        let mut entry = Encoding::Utf16Le.encode(name);
        entry.resize(DIRECTORY_ENTRY_SIZE, 0);
        let len = u16::try_from(name.len() * 2 + 2).unwrap();
        entry[ENTRY_NAME_LEN_OFFSET..ENTRY_NAME_LEN_OFFSET + 2].copy_from_slice(&len.to_le_bytes());
        entry
    }

    #[test]
    fn test_macro_markers() {
        let mut body = directory_entry("Root Entry");
        body.extend(directory_entry("Macros"));
        let doc = extract(&ole_buffer(&body)).unwrap();
        assert!(doc.has_macros());

        assert!(has_macro_markers(&ole_buffer(&directory_entry("_VBA_PROJECT"))));
        assert!(has_macro_markers(b"\0\0Attribute VB_Name = \"Module1\"\0"));
        assert!(!has_macro_markers(b"\0\0plain document\0"));
    }

    #[test]
    fn test_macros_in_body_text_are_not_a_storage() {
        let mut body = vec![0u8; 30];
        body.extend(Encoding::Utf16Le.encode("Recorded Macros are listed below"));
        body.resize(DIRECTORY_ENTRY_SIZE * 4, 0);
        // aligned but without the entry's name length
        body.extend(Encoding::Utf16Le.encode("Macros"));
        body.resize(DIRECTORY_ENTRY_SIZE * 6, 0);

        let doc = extract(&ole_buffer(&body)).unwrap();
        assert!(!doc.has_macros());
        assert!(doc.text().contains("Recorded Macros are listed below"));
    }

    #[test]
    fn test_find_all_handles_edges() {
        assert_eq!(find_all(b"abcabc", b"bc").collect::<Vec<_>>(), vec![1, 4]);
        assert_eq!(find_all(b"ab", b"abc").count(), 0);
        assert_eq!(find_all(b"ab", b"").count(), 0);
    }
}
