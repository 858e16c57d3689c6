//! OOXML (ZIP container) extraction
//!
//! Manual ZIP + XML parsing, the same approach the DOCX converter uses:
//! word-processing parts are read from the archive and walked with
//! `quick_xml` events.
//!
//! - `w:t` text runs are collected in document order
//! - complex fields (`w:fldChar` begin/separate/end + `w:instrText`) and
//!   simple fields (`w:fldSimple w:instr`) are rebuilt as `{instruction}`,
//!   nested fields nesting their braces, and inlined into the text
//! - `w:tbl` nesting is tracked for table detection
//! - `word/vbaProject.bin` and `word/activeX/*` parts flag macros and controls

use crate::document::{keys, Extraction, ExtractedDocument};
use crate::error::ExtractError;
use crate::format::DocumentFormat;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Main document body part
pub const DOCUMENT_PART: &str = "word/document.xml";

/// Fixed single-instance parts read after the body, headers and footers
const AUXILIARY_PARTS: &[&str] = &[
    "word/footnotes.xml",
    "word/endnotes.xml",
    "word/comments.xml",
];

/// Internal namespace of word-processing parts
const WORD_PREFIX: &str = "word/";

/// VBA project part of macro-enabled documents (.docm / .dotm)
const VBA_PROJECT_SUFFIX: &str = "vbaProject.bin";

/// Folder holding ActiveX control parts
const ACTIVEX_PREFIX: &str = "word/activeX/";

/// Content types part, checked for macro-enabled main documents
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Maximum uncompressed size of a single part (64 MB)
///
/// Larger parts are skipped so that a zip bomb cannot exhaust memory.
pub const MAX_PART_SIZE: u64 = 64 * 1024 * 1024;

/// Extract text and signals from an OOXML buffer
///
/// See [`extract_with_limit`]; parts are capped at [`MAX_PART_SIZE`].
///
/// # Errors
///
/// Returns an error when the buffer is not a readable ZIP archive or holds no
/// word-processing part at all.
pub fn extract(bytes: &[u8]) -> Result<Extraction, ExtractError> {
    extract_with_limit(bytes, MAX_PART_SIZE)
}

/// Extract text and signals, skipping parts larger than `max_part_size`
///
/// A part that cannot be read (corrupt entry, oversized, malformed XML) is
/// recorded on the returned [`Extraction`] and the remaining parts are still
/// read. Text recovered from a malformed part up to the error is kept.
///
/// # Errors
///
/// Returns an error when the buffer is not a readable ZIP archive or holds no
/// word-processing part at all.
pub fn extract_with_limit(bytes: &[u8], max_part_size: u64) -> Result<Extraction, ExtractError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();

    let mut parts = select_parts(&names);
    if parts.is_empty() {
        log::debug!("OOXML: no allow-listed part, scanning every word/*.xml part");
        parts = names
            .iter()
            .filter(|n| n.starts_with(WORD_PREFIX) && n.ends_with(".xml"))
            .cloned()
            .collect();
    }
    if parts.is_empty() {
        return Err(ExtractError::NoDocumentParts);
    }

    let mut content = PartContent::default();
    let mut errors = Vec::new();
    for part in &parts {
        let walked = read_part(&mut archive, part, max_part_size)
            .and_then(|xml| content.walk(part, &xml));
        if let Err(e) = walked {
            log::warn!("OOXML: {e}");
            errors.push(e);
        }
    }

    let has_macros = names.iter().any(|n| n.ends_with(VBA_PROJECT_SUFFIX))
        || read_part(&mut archive, CONTENT_TYPES_PART, max_part_size)
            .map(|types| types.contains("macroEnabled"))
            .unwrap_or(false);

    let mut activex = content.controls.clone();
    activex.extend(
        names
            .iter()
            .filter(|n| n.starts_with(ACTIVEX_PREFIX) && n.ends_with(".xml"))
            .cloned(),
    );

    log::debug!(
        "OOXML: {} parts, {} field codes, {} tables, macros={}",
        parts.len(),
        content.field_codes.len(),
        content.tables,
        has_macros
    );

    let text = content.pieces.join(" ");
    let mut document = ExtractedDocument::new(DocumentFormat::ZipContainer, text)
        .with_field_codes(content.field_codes)
        .with_inline_field_codes()
        .with_macros(has_macros)
        .with_metadata(keys::PARTS, parts.join(","))
        .with_metadata(keys::TABLE_COUNT, content.tables.to_string())
        .with_metadata(keys::MAX_TABLE_DEPTH, content.max_table_depth.to_string());
    if !activex.is_empty() {
        document = document.with_metadata(keys::ACTIVEX, activex.join(","));
    }

    Ok(Extraction { document, errors })
}

/// Allow-listed parts present in the archive, in reading order
fn select_parts(names: &[String]) -> Vec<String> {
    let mut selected: Vec<(usize, &String)> = names
        .iter()
        .filter_map(|name| part_rank(name).map(|rank| (rank, name)))
        .collect();
    selected.sort();
    selected.into_iter().map(|(_, name)| name.clone()).collect()
}

/// Reading order of an allow-listed part, `None` for other parts
fn part_rank(name: &str) -> Option<usize> {
    if name == DOCUMENT_PART {
        return Some(0);
    }
    let file = name.strip_prefix(WORD_PREFIX)?;
    if file.contains('/') || !file.ends_with(".xml") {
        return None;
    }
    if file.starts_with("header") {
        return Some(1);
    }
    if file.starts_with("footer") {
        return Some(2);
    }
    AUXILIARY_PARTS
        .iter()
        .position(|p| *p == name)
        .map(|i| i + 3)
}

/// Read one part as text, refusing parts over `max_size` bytes
///
/// The declared size is checked first; the read itself is bounded as well
/// since the declared size comes from the archive.
fn read_part<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    max_size: u64,
) -> Result<String, ExtractError> {
    let too_large = |size: u64| ExtractError::PartTooLarge {
        part: name.to_string(),
        size,
        max: max_size,
    };

    let file = archive.by_name(name)?;
    if file.size() > max_size {
        return Err(too_large(file.size()));
    }
    let mut raw = Vec::new();
    file.take(max_size.saturating_add(1)).read_to_end(&mut raw)?;
    let read = u64::try_from(raw.len()).unwrap_or(u64::MAX);
    if read > max_size {
        return Err(too_large(read));
    }
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Extract an attribute value by key from an element
#[inline]
fn get_attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .find(|a| a.as_ref().ok().map(|x| x.key.as_ref()) == Some(key))
        .and_then(Result::ok)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// A field being rebuilt
#[derive(Debug, Default)]
struct FieldFrame {
    instruction: String,
    /// Past the separator: text now belongs to the field result
    in_result: bool,
    /// Opened by `w:fldSimple` rather than `w:fldChar`
    simple: bool,
}

/// Signals accumulated across all parts
#[derive(Debug, Default)]
struct PartContent {
    pieces: Vec<String>,
    field_codes: Vec<String>,
    tables: usize,
    max_table_depth: usize,
    controls: Vec<String>,
    fields: Vec<FieldFrame>,
    table_depth: usize,
    in_text: bool,
    in_instr: bool,
}

impl PartContent {
    /// Walk one part, stopping at the first XML error
    fn walk(&mut self, part: &str, xml: &str) -> Result<(), ExtractError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(false);

        // Field and table state never crosses a part boundary
        self.fields.clear();
        self.table_depth = 0;
        self.in_text = false;
        self.in_instr = false;

        let mut buf = Vec::new();
        let result = loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => self.handle_start(&e, false),
                Ok(Event::Empty(e)) => self.handle_start(&e, true),
                Ok(Event::End(e)) => self.handle_end(e.name().as_ref()),
                Ok(Event::Text(e)) => match e.unescape() {
                    Ok(text) => self.handle_text(&text),
                    // Stray `&` or unknown entity: keep the raw text
                    Err(err) => {
                        log::debug!("OOXML: unescape failed in '{part}': {err}");
                        self.handle_text(&String::from_utf8_lossy(&e));
                    }
                },
                Ok(Event::Eof) => break Ok(()),
                Err(e) => break Err(ExtractError::xml(part, e)),
                _ => {}
            }
            buf.clear();
        };

        // Unterminated fields keep whatever instruction they collected
        while !self.fields.is_empty() {
            self.close_field();
        }
        result
    }

    fn handle_start(&mut self, e: &BytesStart, empty: bool) {
        match e.name().as_ref() {
            b"w:t" if !empty => self.in_text = true,
            b"w:instrText" if !empty => self.in_instr = true,
            b"w:fldChar" => match get_attr(e, b"w:fldCharType").as_deref() {
                Some("begin") => self.fields.push(FieldFrame::default()),
                Some("separate") => {
                    if let Some(frame) = self.fields.last_mut() {
                        frame.in_result = true;
                    }
                }
                Some("end") => self.close_field(),
                _ => {}
            },
            b"w:fldSimple" => {
                self.fields.push(FieldFrame {
                    instruction: get_attr(e, b"w:instr").unwrap_or_default(),
                    in_result: true,
                    simple: true,
                });
                if empty {
                    self.close_field();
                }
            }
            b"w:tbl" if !empty => {
                self.tables += 1;
                self.table_depth += 1;
                self.max_table_depth = self.max_table_depth.max(self.table_depth);
            }
            b"w:control" => {
                let name = get_attr(e, b"w:name").unwrap_or_else(|| "unnamed".to_string());
                self.controls.push(format!("control:{name}"));
            }
            _ => {}
        }
    }

    fn handle_end(&mut self, name: &[u8]) {
        match name {
            b"w:t" => self.in_text = false,
            b"w:instrText" => self.in_instr = false,
            b"w:tbl" => self.table_depth = self.table_depth.saturating_sub(1),
            b"w:fldSimple" => {
                if self.fields.last().is_some_and(|f| f.simple) {
                    self.close_field();
                }
            }
            _ => {}
        }
    }

    fn handle_text(&mut self, text: &str) {
        if self.in_instr {
            if let Some(frame) = self.fields.last_mut() {
                frame.instruction.push_str(text);
                return;
            }
        }
        if !self.in_text {
            return;
        }
        let inside_instruction = self.fields.iter().any(|f| !f.in_result);
        match self.fields.last_mut() {
            // Text runs between begin and separate belong to the instruction
            Some(frame) if !frame.in_result => frame.instruction.push_str(text),
            // Cached result of a field nested in an outer instruction
            Some(_) if inside_instruction => {}
            _ => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    self.pieces.push(trimmed.to_string());
                }
            }
        }
    }

    /// Pop the innermost field and emit it as `{instruction}`
    fn close_field(&mut self) {
        let Some(frame) = self.fields.pop() else {
            return;
        };
        let instruction = frame
            .instruction
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if instruction.is_empty() {
            return;
        }
        let code = format!("{{{instruction}}}");

        match self.fields.last_mut() {
            // Nested inside an outer instruction, e.g. IF with a MERGEFIELD condition
            Some(parent) if !parent.in_result => {
                parent.instruction.push(' ');
                parent.instruction.push_str(&code);
                parent.instruction.push(' ');
            }
            Some(_) => self.pieces.push(code),
            None => {
                self.pieces.push(code.clone());
                self.field_codes.push(code);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn body(inner: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{inner}</w:body></w:document>"#
        )
    }

    const RUN: &str = r#"<w:r><w:t xml:space="preserve">"#;
    const END_RUN: &str = "</w:t></w:r>";

    fn text_run(text: &str) -> String {
        format!("{RUN}{text}{END_RUN}")
    }

    fn fld(kind: &str) -> String {
        format!(r#"<w:r><w:fldChar w:fldCharType="{kind}"/></w:r>"#)
    }

    fn instr(text: &str) -> String {
        format!(r#"<w:r><w:instrText xml:space="preserve">{text}</w:instrText></w:r>"#)
    }

    #[test]
    fn test_text_runs_joined_in_order() {
        let xml = body(&format!(
            "<w:p>{}{}</w:p><w:p>{}</w:p>",
            text_run("Dear"),
            text_run("customer,"),
            text_run("thanks.")
        ));
        let zip = build_zip(&[(DOCUMENT_PART, &xml)]);
        let extraction = extract(&zip).unwrap();

        assert!(extraction.errors.is_empty());
        assert_eq!(extraction.document.text(), "Dear customer, thanks.");
        assert_eq!(extraction.document.meta(keys::PARTS), Some(DOCUMENT_PART));
    }

    #[test]
    fn test_complex_fields_rebuilt_with_nesting() {
        let xml = body(&format!(
            "<w:p>{}{}{}{}{}{}{}{}{}{}</w:p>",
            text_run("Hello"),
            fld("begin"),
            instr(r#" IF "#),
            fld("begin"),
            instr(" MERGEFIELD Gender "),
            fld("separate"),
            text_run("F"),
            fld("end"),
            instr(r#" = "F" "Ms." "Mr." "#),
            fld("end"),
        ));
        let zip = build_zip(&[(DOCUMENT_PART, &xml)]);
        let doc = extract(&zip).unwrap().document;

        assert_eq!(
            doc.field_codes(),
            &[r#"{IF {MERGEFIELD Gender} = "F" "Ms." "Mr."}"#.to_string()]
        );
        // the nested cached result "F" stays out of the text
        assert_eq!(doc.text(), r#"Hello {IF {MERGEFIELD Gender} = "F" "Ms." "Mr."}"#);
    }

    #[test]
    fn test_simple_fields() {
        let xml = body(&format!(
            r#"<w:p><w:fldSimple w:instr=" MERGEFIELD City \* Upper ">{}</w:fldSimple><w:fldSimple w:instr="PAGE"/></w:p>"#,
            text_run("«City»")
        ));
        let zip = build_zip(&[(DOCUMENT_PART, &xml)]);
        let doc = extract(&zip).unwrap().document;

        assert_eq!(
            doc.field_codes(),
            &[r"{MERGEFIELD City \* Upper}".to_string(), "{PAGE}".to_string()]
        );
        assert!(doc.text().contains("«City»"));
    }

    #[test]
    fn test_headers_footers_and_order() {
        let zip = build_zip(&[
            ("word/footer1.xml", &body(&text_run("footer"))),
            ("word/comments.xml", &body(&text_run("comment"))),
            (DOCUMENT_PART, &body(&text_run("body"))),
            ("word/header2.xml", &body(&text_run("header"))),
            ("word/styles.xml", &body(&text_run("styles"))),
        ]);
        let doc = extract(&zip).unwrap().document;
        assert_eq!(doc.text(), "body header footer comment");
    }

    #[test]
    fn test_falls_back_to_all_word_parts() {
        let zip = build_zip(&[
            ("word/glossary/document.xml", &body(&text_run("glossary"))),
            ("word/styles.xml", &body(&text_run("styled"))),
        ]);
        let doc = extract(&zip).unwrap().document;
        assert_eq!(doc.text(), "glossary styled");
    }

    #[test]
    fn test_no_word_parts_is_an_error() {
        let zip = build_zip(&[("content.xml", "<office:document/>")]);
        assert!(matches!(extract(&zip), Err(ExtractError::NoDocumentParts)));
    }

    #[test]
    fn test_corrupt_zip_is_an_error() {
        let mut bytes = crate::format::ZIP_SIGNATURE.to_vec();
        bytes.extend_from_slice(b"definitely not a zip archive");
        assert!(matches!(extract(&bytes), Err(ExtractError::Zip(_))));
    }

    #[test]
    fn test_nested_tables_and_signals() {
        let xml = body(&format!(
            "<w:tbl><w:tr><w:tc><w:tbl><w:tr><w:tc>{}</w:tc></w:tr></w:tbl></w:tc></w:tr></w:tbl><w:tbl/><w:p><w:control w:name=\"CheckBox1\"/></w:p>",
            text_run("cell")
        ));
        let zip = build_zip(&[
            (DOCUMENT_PART, &xml),
            ("word/vbaProject.bin", "binary"),
            ("word/activeX/activeX1.xml", "<ax:ocx/>"),
        ]);
        let doc = extract(&zip).unwrap().document;

        assert_eq!(doc.meta_usize(keys::TABLE_COUNT), Some(2));
        assert_eq!(doc.meta_usize(keys::MAX_TABLE_DEPTH), Some(2));
        assert!(doc.has_macros());
        assert_eq!(
            doc.meta(keys::ACTIVEX),
            Some("control:CheckBox1,word/activeX/activeX1.xml")
        );
    }

    #[test]
    fn test_oversized_part_is_skipped_and_recorded() {
        let big = body(&text_run(&"x".repeat(4096)));
        let zip = build_zip(&[
            (DOCUMENT_PART, &body(&text_run("small body"))),
            ("word/footer1.xml", &big),
        ]);
        let extraction = extract_with_limit(&zip, 1024).unwrap();

        assert_eq!(extraction.errors.len(), 1);
        assert!(matches!(
            &extraction.errors[0],
            ExtractError::PartTooLarge { part, max: 1024, .. } if part == "word/footer1.xml"
        ));
        assert_eq!(extraction.document.text(), "small body");
    }

    #[test]
    fn test_unreadable_part_does_not_lose_other_parts() {
        let stored =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, text) in [("word/header1.xml", "header text"), (DOCUMENT_PART, "body text")] {
            writer.start_file(name, stored).unwrap();
            writer.write_all(body(&text_run(text)).as_bytes()).unwrap();
        }
        let mut zip = writer.finish().unwrap().into_inner();
        // flip one stored byte of the header part so its CRC check fails
        let at = zip
            .windows(b"header text".len())
            .position(|w| w == b"header text")
            .unwrap();
        zip[at] = b'H';

        let extraction = extract(&zip).unwrap();
        assert_eq!(extraction.errors.len(), 1);
        assert!(matches!(
            extraction.errors[0],
            ExtractError::Io(_) | ExtractError::Zip(_)
        ));
        assert_eq!(extraction.document.text(), "body text");
        assert_eq!(extraction.document.meta(keys::FALLBACK), None);
    }

    #[test]
    fn test_unescape_failure_keeps_raw_text() {
        let xml = body(&format!("<w:p>{}</w:p>", text_run("AT&T rates")));
        let zip = build_zip(&[(DOCUMENT_PART, &xml)]);
        let extraction = extract(&zip).unwrap();

        assert!(extraction.errors.is_empty());
        assert_eq!(extraction.document.text(), "AT&T rates");
    }

    #[test]
    fn test_malformed_part_keeps_partial_text() {
        let xml = format!("<w:document><w:body>{}</w:bogus></w:document>", text_run("kept"));
        let zip = build_zip(&[(DOCUMENT_PART, &xml)]);
        let extraction = extract(&zip).unwrap();

        assert_eq!(extraction.errors.len(), 1);
        assert!(matches!(extraction.errors[0], ExtractError::Xml { .. }));
        assert_eq!(extraction.document.text(), "kept");
    }
}
