//! Printable-run scanning over raw binary buffers
//!
//! Used directly for OLE compound files (no directory parsing is attempted)
//! and as the last-resort extractor whenever a structured extractor fails.
//!
//! Two encodings are scanned:
//! - 8-bit text, as Word stores "compressed" runs
//! - UTF-16LE text restricted to the Latin-1 range, as Word stores Unicode runs
//!
//! Word's binary field markers are mapped onto brace syntax so that native
//! fields look like the field codes the ZIP and RTF extractors produce:
//! `0x13` (field begin) becomes `{`, `0x14` (separator) a space, and
//! `0x15` (field end) `}`.

/// Minimum number of characters a run must have to be kept
pub const MIN_RUN_LENGTH: usize = 4;

/// All-hex runs longer than this are treated as hex dumps
const MAX_HEX_RUN: usize = 8;

/// A run recovered from a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    /// Byte offset where the run starts
    pub offset: usize,
    /// Decoded, trimmed text
    pub text: String,
}

/// Runs recovered from a buffer, in offset order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrintableRuns {
    /// Runs that passed the noise filter
    pub runs: Vec<TextRun>,
    /// Number of runs long enough but dropped as noise
    pub dropped: usize,
}

impl PrintableRuns {
    /// Runs joined by newlines
    #[must_use]
    pub fn joined(&self) -> String {
        self.runs
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Map one byte of Word 8-bit text to a character
///
/// Returns `None` for bytes that end a run.
#[inline]
#[must_use]
pub const fn map_byte(b: u8) -> Option<char> {
    match b {
        0x20..=0x7E => Some(b as char),
        b'\t' | 0x07 => Some('\t'),
        b'\n' | b'\r' | 0x0B | 0x0C => Some('\n'),
        0x13 => Some('{'),
        0x14 => Some(' '),
        0x15 => Some('}'),
        _ => None,
    }
}

/// Map one UTF-16LE code unit (Latin-1 range only) to a character
#[inline]
pub(crate) const fn map_utf16_unit(lo: u8, hi: u8) -> Option<char> {
    if hi != 0 {
        return None;
    }
    match lo {
        // Latin-1 letters
        0xC0..=0xD6 | 0xD8..=0xF6 | 0xF8..=0xFF => Some(lo as char),
        _ => map_byte(lo),
    }
}

/// Scan a buffer for printable runs in both encodings
///
/// `skip` leading bytes are ignored (the OLE header). Runs shorter than
/// `min_len` characters after trimming are discarded, and runs classified by
/// [`is_noise`] are counted in [`PrintableRuns::dropped`].
#[must_use]
pub fn scan(bytes: &[u8], skip: usize, min_len: usize) -> PrintableRuns {
    let body = bytes.get(skip..).unwrap_or_default();
    let mut candidates = scan_8bit(body, skip);
    candidates.extend(scan_utf16le(body, skip));
    candidates.sort_by_key(|run| run.offset);

    let mut result = PrintableRuns::default();
    for run in candidates {
        if run.text.chars().count() < min_len {
            continue;
        }
        if is_noise(&run.text) {
            result.dropped += 1;
        } else {
            result.runs.push(run);
        }
    }
    result
}

fn scan_8bit(body: &[u8], base: usize) -> Vec<TextRun> {
    let mut runs = Vec::new();
    let mut current = String::new();
    let mut start = 0usize;

    for (i, &b) in body.iter().enumerate() {
        if let Some(c) = map_byte(b) {
            if current.is_empty() {
                start = i;
            }
            current.push(c);
        } else if !current.is_empty() {
            push_run(&mut runs, base + start, &mut current);
        }
    }
    if !current.is_empty() {
        push_run(&mut runs, base + start, &mut current);
    }
    runs
}

fn scan_utf16le(body: &[u8], base: usize) -> Vec<TextRun> {
    let mut runs = Vec::new();
    let mut current = String::new();
    let mut start = 0usize;

    for (i, pair) in body.chunks_exact(2).enumerate() {
        if let Some(c) = map_utf16_unit(pair[0], pair[1]) {
            if current.is_empty() {
                start = i * 2;
            }
            current.push(c);
        } else if !current.is_empty() {
            push_utf16_run(&mut runs, base + start, &mut current);
        }
    }
    if !current.is_empty() {
        push_utf16_run(&mut runs, base + start, &mut current);
    }
    runs
}

fn push_run(runs: &mut Vec<TextRun>, offset: usize, current: &mut String) {
    let text = current.trim();
    if !text.is_empty() {
        runs.push(TextRun {
            offset,
            text: text.to_string(),
        });
    }
    current.clear();
}

/// UTF-16 runs of a single character are ASCII bytes followed by a zero
/// byte, which the 8-bit scan already covers
fn push_utf16_run(runs: &mut Vec<TextRun>, offset: usize, current: &mut String) {
    if current.chars().count() > 1 {
        push_run(runs, offset, current);
    } else {
        current.clear();
    }
}

/// Whether a run looks like structure bytes rather than text
///
/// Noise: an all-hex run longer than 8 characters, a `0x`-prefixed token, or
/// a run where more than half of the non-whitespace characters are not
/// alphabetic.
#[must_use]
pub fn is_noise(run: &str) -> bool {
    let trimmed = run.trim();
    if trimmed.len() > MAX_HEX_RUN && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return true;
    }
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        return true;
    }

    let mut total = 0usize;
    let mut alphabetic = 0usize;
    for c in trimmed.chars().filter(|c| !c.is_whitespace()) {
        total += 1;
        if c.is_alphabetic() {
            alphabetic += 1;
        }
    }
    total == 0 || (total - alphabetic) * 2 > total
}
