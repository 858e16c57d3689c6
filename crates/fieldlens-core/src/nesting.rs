//! Nesting depth of conditional (IF) fields
//!
//! A brace-balance scan over decoded characters. Only braces that open an IF
//! field add depth; other fields (`{MERGEFIELD x}`) are tracked for balance
//! but never count. Sibling IFs at the same level do not add up.

use serde::Serialize;

/// Maximum distance from `{` to the `I` of an `IF` keyword
///
/// Up to three whitespace characters may separate the brace from the
/// keyword. The `if_start` registry pattern uses the same window.
pub const IF_LOOKAHEAD_CHARS: usize = 4;

/// Result of one conditional scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NestingScan {
    /// Deepest number of simultaneously open IF fields
    pub max_depth: usize,
    /// IF openings seen, nested ones included
    pub if_fields: usize,
    /// Top-level IF fields still open at the end of the text
    pub unterminated: usize,
}

/// Deepest IF nesting in `text`
#[inline]
#[must_use]
pub fn calculate_nesting_depth(text: &str) -> usize {
    scan_conditionals(text).max_depth
}

/// Scan `text` for IF fields and their nesting
#[must_use]
pub fn scan_conditionals(text: &str) -> NestingScan {
    let chars: Vec<char> = text.chars().collect();
    let mut scan = NestingScan::default();

    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '{' && opens_if(&chars, i) {
            let span = measure(&chars, i);
            scan.max_depth = scan.max_depth.max(span.max_depth);
            scan.if_fields += span.if_fields;
            if !span.terminated {
                scan.unterminated += 1;
            }
            // IFs inside the span were measured as part of it
            i = span.end;
        } else {
            i += 1;
        }
    }

    if scan.unterminated > 0 {
        log::debug!("{} unterminated IF fields", scan.unterminated);
    }
    scan
}

struct Span {
    end: usize,
    max_depth: usize,
    if_fields: usize,
    terminated: bool,
}

/// Walk one top-level IF field starting at `open`
fn measure(chars: &[char], open: usize) -> Span {
    // One entry per open brace: whether it opened an IF
    let mut stack = vec![true];
    let mut depth = 1;
    let mut span = Span {
        end: chars.len(),
        max_depth: 1,
        if_fields: 1,
        terminated: false,
    };

    for (j, &c) in chars.iter().enumerate().skip(open + 1) {
        match c {
            '{' => {
                let is_if = opens_if(chars, j);
                if is_if {
                    depth += 1;
                    span.if_fields += 1;
                    span.max_depth = span.max_depth.max(depth);
                }
                stack.push(is_if);
            }
            '}' => {
                if stack.pop() == Some(true) {
                    depth -= 1;
                }
                if stack.is_empty() {
                    span.end = j + 1;
                    span.terminated = true;
                    break;
                }
            }
            _ => {}
        }
    }
    span
}

/// Whether the brace at `open` starts an IF field
fn opens_if(chars: &[char], open: usize) -> bool {
    let mut k = open + 1;
    while k - open < IF_LOOKAHEAD_CHARS && chars.get(k).is_some_and(|&c| is_field_space(c)) {
        k += 1;
    }
    let keyword =
        matches!(chars.get(k), Some('I' | 'i')) && matches!(chars.get(k + 1), Some('F' | 'f'));
    keyword && !chars.get(k + 2).is_some_and(|&c| is_word_char(c))
}

#[inline]
const fn is_field_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

#[inline]
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_conditionals() {
        assert_eq!(calculate_nesting_depth(""), 0);
        assert_eq!(calculate_nesting_depth("plain prose, no fields"), 0);
        assert_eq!(calculate_nesting_depth("{MERGEFIELD Name}"), 0);
    }

    #[test]
    fn test_single_and_nested() {
        assert_eq!(calculate_nesting_depth(r#"{IF a "x" "y"}"#), 1);
        assert_eq!(calculate_nesting_depth(r#"{IF a "{IF b "x" "y"}" "z"}"#), 2);
    }

    #[test]
    fn test_siblings_do_not_sum() {
        assert_eq!(calculate_nesting_depth(r#"{IF a "x" "y"} {IF b "x" "y"}"#), 1);
        assert_eq!(
            calculate_nesting_depth(r#"{IF a "{IF b "1" "2"}" "{IF c "3" "4"}"}"#),
            2
        );
    }

    #[test]
    fn test_non_if_braces_never_add_depth() {
        assert_eq!(calculate_nesting_depth(r#"{MERGEFIELD x} {IF y "a" "b"}"#), 1);
        assert_eq!(
            calculate_nesting_depth(r#"{IF {MERGEFIELD Total} > 10 "{REF big}" "small"}"#),
            1
        );
        assert_eq!(
            calculate_nesting_depth(r#"{IF a "{QUOTE {IF b "x" "y"}}" "z"}"#),
            2
        );
    }

    #[test]
    fn test_lookahead_window() {
        assert_eq!(calculate_nesting_depth("{IF a}"), 1);
        assert_eq!(calculate_nesting_depth("{ \t\nIF a}"), 1);
        assert_eq!(calculate_nesting_depth("{    IF a}"), 0);
        assert_eq!(calculate_nesting_depth("{ if a }"), 1);
    }

    #[test]
    fn test_keyword_boundary() {
        assert_eq!(calculate_nesting_depth("{IFFY}"), 0);
        assert_eq!(calculate_nesting_depth("{IF_x}"), 0);
        assert_eq!(calculate_nesting_depth("{IF"), 1);
        assert_eq!(calculate_nesting_depth("{IF\"a\"}"), 1);
    }

    #[test]
    fn test_scan_counts_and_unterminated() {
        let scan = scan_conditionals(r#"{IF a "{IF b "x" "y"}" "z"} {IF c "open"#);
        assert_eq!(scan.max_depth, 2);
        assert_eq!(scan.if_fields, 3);
        assert_eq!(scan.unterminated, 1);
    }

    #[test]
    fn test_four_levels() {
        let text = r#"{IF a "{IF b "{IF c "{IF d "deep" "d"}" "c"}" "b"}" "a"}"#;
        assert_eq!(calculate_nesting_depth(text), 4);
        assert_eq!(scan_conditionals(text).if_fields, 4);
    }

    #[test]
    fn test_multibyte_text() {
        assert_eq!(calculate_nesting_depth(r#"Grüße {IF ä "ö" "{IF ü "ß" "é"}"}"#), 2);
    }
}
