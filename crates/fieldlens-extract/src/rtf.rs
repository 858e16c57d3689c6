//! RTF extraction
//!
//! Tokens come from `rtf_parser`'s lexer and drive one state machine with a
//! group stack. Every group inherits its parent's destination; destination
//! control words switch it:
//!
//! - ignorable destinations (`{\*...}`, font/colour/style tables, pictures,
//!   embedded object data) drop their content
//! - `\fldinst` routes characters into the innermost open field, which is
//!   emitted as `{instruction}` when its `\field` group closes; a field
//!   nested in another field's instruction lands inside the outer braces
//! - `\fldrslt` keeps the cached result as display text
//!
//! Tables are counted from `\trowd` row definitions: consecutive rows form
//! one table until a paragraph outside the table intervenes. Nested table
//! rows are described inside `\nesttableprops`, so they only raise the depth
//! reported by `\itapN`.
//!
//! The lexer works on text, so buffers carrying `\binN` payloads, and input
//! the lexer rejects, are fed to the same state machine by a byte scanner.

use crate::document::{keys, ExtractedDocument};
use crate::error::ExtractError;
use crate::format::DocumentFormat;
use rtf_parser::lexer::Lexer;
use rtf_parser::tokens::{ControlWord, Property, Token};

/// Destinations whose content is never text
const IGNORED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "objdata",
    "themedata",
    "colorschememapping",
    "datastore",
    "xmlnstbl",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "generator",
    "latentstyles",
    "filetbl",
    "revtbl",
    "nonshppict",
    "nonesttables",
    "userprops",
];

/// Control words longer than this are truncated by the byte scanner
const MAX_CONTROL_WORD: usize = 32;

/// Extract text, field codes and table structure from an RTF buffer
///
/// # Errors
///
/// Returns [`ExtractError::MalformedRtf`] on unbalanced group braces or a
/// dangling escape at the end of input.
pub fn extract(bytes: &[u8]) -> Result<ExtractedDocument, ExtractError> {
    let source = String::from_utf8_lossy(bytes);
    let source = normalize(source.trim_end_matches('\0'));

    let mut scanner = Scanner::default();
    match lex(bytes, &source) {
        Some(tokens) => scanner.run_tokens(&tokens)?,
        None => scanner.run_bytes(bytes)?,
    }

    log::debug!(
        "RTF: {} field codes, {} tables (depth {})",
        scanner.field_codes.len(),
        scanner.tables,
        scanner.max_table_depth
    );
    Ok(scanner.finish())
}

/// Lex `source`, or `None` when the byte scanner has to take over
fn lex<'a>(bytes: &[u8], source: &'a str) -> Option<Vec<Token<'a>>> {
    if has_binary_payload(bytes) {
        log::debug!("RTF: \\bin payload present, scanning bytes");
        return None;
    }
    match Lexer::scan(source) {
        Ok(tokens) => Some(tokens),
        Err(e) => {
            log::debug!("RTF: lexer rejected input, scanning bytes: {e}");
            None
        }
    }
}

/// Whether a `\binN` control word announces raw binary data
fn has_binary_payload(bytes: &[u8]) -> bool {
    bytes
        .windows(5)
        .any(|w| w.starts_with(br"\bin") && w[4].is_ascii_digit())
}

/// Rewrite input the lexer would lose text on as equivalent hex escapes
///
/// - `\~` (non-breaking space) becomes `\'a0` and `\_` (non-breaking
///   hyphen) `\'2d`; `\-` (optional hyphen) is removed
/// - spaces between a group brace and the next delimiter become `\'20`
///
/// Escaped backslashes and braces are copied unchanged.
fn normalize(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + 16);
    let mut chars = source.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next().map(|(_, next)| next) {
                Some('~') => out.push_str(r"\'a0"),
                Some('_') => out.push_str(r"\'2d"),
                Some('-') => {}
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            '{' | '}' => {
                out.push(c);
                let rest = &source[i + 1..];
                let spaces = rest.len() - rest.trim_start_matches(' ').len();
                let delimited = matches!(
                    rest[spaces..].chars().next(),
                    Some('{' | '}' | '\\' | '\n' | '\r')
                );
                if spaces > 0 && delimited {
                    for _ in 0..spaces {
                        out.push_str(r"\'20");
                    }
                    chars.nth(spaces - 1);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Split a raw control word into name, parameter and glued text
///
/// The lexer only ends a control word at whitespace or a delimiter, so
/// `\u8364?text` arrives as one word.
fn split_control_word(raw: &str) -> (&str, Option<i32>, &str) {
    let word = raw.strip_prefix('\\').unwrap_or(raw);
    let name_end = word
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(word.len());
    let (name, rest) = word.split_at(name_end);

    let unsigned = rest.strip_prefix('-').unwrap_or(rest);
    let digits = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    if digits == 0 {
        return (name, None, rest);
    }
    let (param, text) = rest.split_at(rest.len() - unsigned.len() + digits);
    (name, param.parse().ok(), text)
}

/// Name of a control word the lexer recognises, `""` for formatting words
const fn known_name(word: &ControlWord<'_>) -> &'static str {
    match word {
        ControlWord::Rtf => "rtf",
        ControlWord::Ansi => "ansi",
        ControlWord::UnicodeIgnoreCount => "uc",
        ControlWord::FontTable => "fonttbl",
        ControlWord::ColorTable => "colortbl",
        ControlWord::FileTable => "filetbl",
        ControlWord::StyleSheet => "stylesheet",
        ControlWord::Par => "par",
        ControlWord::Pard => "pard",
        ControlWord::Tab => "tab",
        ControlWord::Line => "line",
        ControlWord::Emdash => "emdash",
        ControlWord::Endash => "endash",
        ControlWord::Bullet => "bullet",
        ControlWord::LeftSingleQuote => "lquote",
        ControlWord::RightSingleQuote => "rquote",
        ControlWord::LeftDoubleQuote => "ldblquote",
        ControlWord::RightDoubleQuote => "rdblquote",
        _ => "",
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Destination {
    #[default]
    Text,
    Skip,
    Instruction,
    Result,
    ObjClass,
}

#[derive(Debug, Clone, Copy)]
struct Group {
    destination: Destination,
    /// A `\field` control word opened this group
    starts_field: bool,
    /// An ancestor group is a field instruction
    under_instruction: bool,
    /// `\ucN`: fallback characters following each `\uN`
    unicode_skip: usize,
    /// Preceded by `\*`, waiting for the destination word
    starred: bool,
}

impl Default for Group {
    fn default() -> Self {
        Self {
            destination: Destination::Text,
            starts_field: false,
            under_instruction: false,
            unicode_skip: 1,
            starred: false,
        }
    }
}

#[derive(Debug, Default)]
struct Scanner {
    groups: Vec<Group>,
    /// Instructions of the open fields, innermost last
    fields: Vec<String>,
    text: String,
    field_codes: Vec<String>,
    activex: Vec<String>,
    objclass: String,
    tables: usize,
    max_table_depth: usize,
    in_table: bool,
    in_table_paragraph: bool,
    after_row: bool,
    left_table: bool,
    pending_skip: usize,
}

impl Scanner {
    fn run_tokens(&mut self, tokens: &[Token<'_>]) -> Result<(), ExtractError> {
        for (index, token) in tokens.iter().enumerate() {
            match token {
                Token::OpeningBracket => self.open_group(),
                Token::ClosingBracket => {
                    if !self.close_group() {
                        return Err(ExtractError::MalformedRtf(format!(
                            "unbalanced closing brace at token {index}"
                        )));
                    }
                }
                Token::IgnorableDestination => self.star(),
                Token::CRLF => self.paragraph_break(),
                Token::PlainText(text) => {
                    for c in text.chars().filter(|c| !matches!(c, '\r' | '\n')) {
                        self.emit_char(c);
                    }
                }
                Token::ControlSymbol((word, property)) => self.control_symbol(word, *property),
                Token::Empty => {}
            }
        }
        self.ensure_closed()
    }

    fn run_bytes(&mut self, bytes: &[u8]) -> Result<(), ExtractError> {
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'{' => {
                    self.open_group();
                    i += 1;
                }
                b'}' => {
                    if !self.close_group() {
                        return Err(ExtractError::MalformedRtf(format!(
                            "unbalanced closing brace at byte {i}"
                        )));
                    }
                    i += 1;
                }
                b'\\' => i = self.control(bytes, i + 1)?,
                b'\r' | b'\n' => i += 1,
                b => {
                    self.emit_char(char::from(b));
                    i += 1;
                }
            }
        }
        self.ensure_closed()
    }

    fn ensure_closed(&self) -> Result<(), ExtractError> {
        if self.groups.is_empty() {
            Ok(())
        } else {
            Err(ExtractError::MalformedRtf(format!(
                "{} unclosed groups at end of input",
                self.groups.len()
            )))
        }
    }

    fn finish(self) -> ExtractedDocument {
        let text = self.text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut document = ExtractedDocument::new(DocumentFormat::Rtf, text)
            .with_field_codes(self.field_codes)
            .with_inline_field_codes()
            .with_metadata(keys::TABLE_COUNT, self.tables.to_string())
            .with_metadata(keys::MAX_TABLE_DEPTH, self.max_table_depth.to_string());
        if !self.activex.is_empty() {
            document = document.with_metadata(keys::ACTIVEX, self.activex.join(","));
        }
        document
    }

    fn open_group(&mut self) {
        self.pending_skip = 0;
        let group = self.groups.last().map_or_else(Group::default, |parent| Group {
            starts_field: false,
            starred: false,
            under_instruction: parent.under_instruction
                || parent.destination == Destination::Instruction,
            ..*parent
        });
        self.groups.push(group);
    }

    /// Close the innermost group; `false` when no group is open
    fn close_group(&mut self) -> bool {
        let Some(group) = self.groups.pop() else {
            return false;
        };
        self.pending_skip = 0;

        let parent = self.groups.last().map(|g| g.destination);
        if group.destination == Destination::ObjClass && parent != Some(Destination::ObjClass) {
            let class = std::mem::take(&mut self.objclass);
            let class = class.trim();
            if !class.is_empty() {
                self.activex.push(class.to_string());
            }
        }
        if group.starts_field {
            self.close_field(parent);
        }
        true
    }

    /// `\*`: the next control word names an ignorable destination
    fn star(&mut self) {
        if let Some(group) = self.groups.last_mut() {
            group.starred = true;
        }
    }

    fn control_symbol(&mut self, word: &ControlWord<'_>, property: Property) {
        let param = match property {
            Property::Value(value) => Some(value),
            Property::On => Some(1),
            Property::Off => Some(0),
            Property::None => None,
        };
        match word {
            ControlWord::Unicode => self.unicode_escape(param),
            ControlWord::Unknown(raw) => {
                let (name, glued, text) = split_control_word(raw);
                self.control_word(name, param.or(glued));
                for c in text.chars() {
                    self.emit_char(c);
                }
            }
            known => self.control_word(known_name(known), param),
        }
    }

    /// `\uN` and `\'hh` both lex as [`ControlWord::Unicode`]
    ///
    /// Values beyond a byte are `\uN` and start the fallback skip; byte
    /// values are hex escapes, which may be that fallback.
    fn unicode_escape(&mut self, value: Option<i32>) {
        let Some(value) = value else {
            return;
        };
        match u8::try_from(value) {
            Ok(byte) => self.emit_char(char::from(byte)),
            Err(_) => self.control_word("u", Some(value)),
        }
    }

    /// Emit the innermost field as `{instruction}`
    fn close_field(&mut self, parent: Option<Destination>) {
        let Some(instruction) = self.fields.pop() else {
            return;
        };
        let instruction = instruction.split_whitespace().collect::<Vec<_>>().join(" ");
        if instruction.is_empty() {
            return;
        }
        let code = format!("{{{instruction}}}");

        match (parent, self.fields.last_mut()) {
            (Some(Destination::Instruction), Some(outer)) => {
                outer.push(' ');
                outer.push_str(&code);
                outer.push(' ');
            }
            (Some(Destination::Skip), _) => {}
            _ => {
                self.text.push(' ');
                self.text.push_str(&code);
                self.text.push(' ');
                if self.fields.is_empty() {
                    self.field_codes.push(code);
                }
            }
        }
    }

    /// Handle one escape starting after the backslash; returns the next offset
    fn control(&mut self, bytes: &[u8], start: usize) -> Result<usize, ExtractError> {
        let Some(&c) = bytes.get(start) else {
            return Err(ExtractError::MalformedRtf(
                "dangling backslash at end of input".to_string(),
            ));
        };

        if !c.is_ascii_alphabetic() {
            match c {
                b'\'' => {
                    let value = bytes
                        .get(start + 1..start + 3)
                        .and_then(|hex| std::str::from_utf8(hex).ok())
                        .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                    if let Some(value) = value {
                        self.emit_char(char::from(value));
                        return Ok(start + 3);
                    }
                }
                b'{' | b'}' | b'\\' => self.emit_char(char::from(c)),
                b'~' => self.emit_char(' '),
                b'_' => self.emit_char('-'),
                b'*' => self.star(),
                b'\r' | b'\n' => self.paragraph_break(),
                _ => {}
            }
            return Ok(start + 1);
        }

        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_alphabetic() && end - start < MAX_CONTROL_WORD
        {
            end += 1;
        }
        let word = std::str::from_utf8(&bytes[start..end]).unwrap_or_default();

        let mut param_end = end;
        if bytes.get(end) == Some(&b'-') && bytes.get(end + 1).is_some_and(u8::is_ascii_digit) {
            param_end += 1;
        }
        while bytes.get(param_end).is_some_and(u8::is_ascii_digit) {
            param_end += 1;
        }
        let param = std::str::from_utf8(&bytes[end..param_end])
            .ok()
            .and_then(|p| p.parse::<i32>().ok());

        let mut next = param_end;
        if bytes.get(next) == Some(&b' ') {
            next += 1;
        }
        if word == "bin" {
            let skip = usize::try_from(param.unwrap_or(0)).unwrap_or(0);
            return Ok(next.saturating_add(skip).min(bytes.len()));
        }

        self.control_word(word, param);
        Ok(next)
    }

    fn control_word(&mut self, word: &str, param: Option<i32>) {
        let Some(group) = self.groups.last_mut() else {
            return;
        };
        if group.destination == Destination::Skip {
            return;
        }
        let starred = std::mem::take(&mut group.starred);
        let unicode_skip = group.unicode_skip;
        let under_instruction = group.under_instruction;

        match word {
            "fldinst" => {
                if self.fields.is_empty() {
                    group.starts_field = true;
                    self.fields.push(String::new());
                }
                group.destination = Destination::Instruction;
            }
            "objclass" => group.destination = Destination::ObjClass,
            _ if starred || IGNORED_DESTINATIONS.contains(&word) => {
                group.destination = Destination::Skip;
            }
            "field" => {
                group.starts_field = true;
                self.fields.push(String::new());
            }
            "fldrslt" => {
                group.destination = if under_instruction {
                    Destination::Skip
                } else {
                    Destination::Result
                };
            }
            "uc" => {
                group.unicode_skip = usize::try_from(param.unwrap_or(1)).unwrap_or(0);
            }
            "u" => {
                if let Some(n) = param {
                    let code = if n < 0 { n + 65536 } else { n };
                    if let Some(c) = u32::try_from(code).ok().and_then(char::from_u32) {
                        self.route(c);
                    }
                    self.pending_skip = unicode_skip;
                }
            }
            "par" => self.paragraph_break(),
            "line" | "tab" | "cell" | "nestcell" | "sect" | "page" | "column" => {
                self.route(' ');
            }
            "row" | "nestrow" => {
                self.route(' ');
                self.after_row = true;
                self.left_table = false;
            }
            "trowd" => {
                if !self.in_table || self.left_table {
                    self.tables += 1;
                }
                self.in_table = true;
                self.after_row = false;
                self.left_table = false;
                self.max_table_depth = self.max_table_depth.max(1);
            }
            "pard" => self.in_table_paragraph = false,
            "intbl" => self.in_table_paragraph = true,
            "itap" => {
                let depth = usize::try_from(param.unwrap_or(1)).unwrap_or(0);
                self.in_table_paragraph = depth > 0;
                self.max_table_depth = self.max_table_depth.max(depth);
            }
            "objocx" => self.activex.push("objocx".to_string()),
            "emdash" | "endash" => self.route('-'),
            "bullet" => self.route('*'),
            "lquote" | "rquote" => self.route('\''),
            "ldblquote" | "rdblquote" => self.route('"'),
            _ => {}
        }
    }

    fn paragraph_break(&mut self) {
        if self.routes_to_text() {
            self.note_outside_table();
        }
        self.route(' ');
    }

    fn note_outside_table(&mut self) {
        if self.after_row && !self.in_table_paragraph {
            self.left_table = true;
        }
    }

    fn routes_to_text(&self) -> bool {
        matches!(
            self.groups.last().map(|g| g.destination),
            Some(Destination::Text | Destination::Result)
        )
    }

    /// Emit a character subject to `\uN` fallback skipping
    fn emit_char(&mut self, c: char) {
        if self.pending_skip > 0 {
            self.pending_skip -= 1;
            return;
        }
        self.route(c);
    }

    fn route(&mut self, c: char) {
        let Some(group) = self.groups.last() else {
            return;
        };
        match group.destination {
            Destination::Skip => {}
            Destination::Instruction => {
                if let Some(instruction) = self.fields.last_mut() {
                    instruction.push(c);
                }
            }
            Destination::ObjClass => self.objclass.push(c),
            Destination::Text | Destination::Result => {
                if !c.is_whitespace() {
                    self.note_outside_table();
                }
                self.text.push(c);
            }
        }
    }
}
