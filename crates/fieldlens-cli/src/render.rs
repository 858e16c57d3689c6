//! Report rendering for the terminal and for JSON consumers

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use fieldlens_core::{ComplexityLevel, ComplexityReport, Severity};
use serde::Serialize;
use std::fmt::Write;

/// One analyzed file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// Path as given on the command line
    pub file: String,
    /// Engine result
    #[serde(flatten)]
    pub report: ComplexityReport,
}

/// JSON for one or several files
///
/// A single file renders as the bare report; several files render as an
/// array whose entries carry a `file` key.
pub fn json(reports: &[FileReport], compact: bool) -> Result<String> {
    let rendered = match reports {
        [single] if compact => serde_json::to_string(&single.report),
        [single] => serde_json::to_string_pretty(&single.report),
        many if compact => serde_json::to_string(many),
        many => serde_json::to_string_pretty(many),
    };
    rendered.context("Failed to serialize report")
}

fn level(level: ComplexityLevel) -> ColoredString {
    let name = level.as_str().to_uppercase();
    match level {
        ComplexityLevel::Low => name.green(),
        ComplexityLevel::Medium => name.yellow(),
        ComplexityLevel::High => name.red(),
        ComplexityLevel::Critical => name.red().bold(),
    }
}

fn severity(severity: Severity) -> ColoredString {
    match severity {
        Severity::Low => "low".normal(),
        Severity::Medium => "medium".yellow(),
        Severity::High => "high".red(),
    }
}

/// Human-readable summary of every file
pub fn text(reports: &[FileReport]) -> Result<String> {
    let mut out = String::new();
    for (i, entry) in reports.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        summary(&mut out, entry).context("Failed to render report")?;
    }
    Ok(out)
}

fn summary(out: &mut String, entry: &FileReport) -> std::fmt::Result {
    let r = &entry.report;
    writeln!(out, "{}", entry.file.bold())?;
    writeln!(out, "  Format:          {}", r.document_format)?;
    writeln!(
        out,
        "  Score:           {} ({})",
        r.complexity_score,
        level(r.complexity_level)
    )?;
    let review = if r.needs_human_review {
        "required".red().bold()
    } else {
        "not required".green()
    };
    writeln!(out, "  Review:          {review}")?;
    writeln!(
        out,
        "  IF fields:       {} (max depth {})",
        r.total_if_statements, r.nested_if_depth
    )?;
    writeln!(
        out,
        "  Merge fields:    {} ({} with switches)",
        r.total_merge_fields,
        r.complex_merge_fields.len()
    )?;
    writeln!(
        out,
        "  Formulas:        {} valid, {} rejected",
        r.valid_formulas_count, r.invalid_formulas_count
    )?;
    writeln!(out, "  Tables:          {}", r.table_count)?;
    if !r.macros_found.is_empty() {
        writeln!(out, "  Macros:          {}", r.macros_found.join(", "))?;
    }
    if !r.field_codes.is_empty() {
        writeln!(out, "  Field codes:     {}", r.field_codes.len())?;
    }

    if !r.potential_issues.is_empty() {
        writeln!(out, "  {}", "Issues:".cyan().bold())?;
        for issue in &r.potential_issues {
            writeln!(
                out,
                "    [{}] {}: {}",
                severity(issue.severity),
                issue.issue_type,
                issue.description
            )?;
        }
    }
    writeln!(out, "  {}", "Recommendations:".cyan().bold())?;
    for line in &r.recommendations {
        writeln!(out, "    - {line}")?;
    }
    if !r.parse_errors.is_empty() {
        writeln!(out, "  {}", "Parse errors:".yellow().bold())?;
        for error in &r.parse_errors {
            writeln!(out, "    - {error}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldlens_core::analyze;

    fn entry(file: &str, text: &str) -> FileReport {
        FileReport {
            file: file.to_string(),
            report: analyze(text.as_bytes(), None, None),
        }
    }

    #[test]
    fn test_single_file_json_is_bare_report() {
        let json = json(&[entry("a.txt", "Hello there")], true).unwrap();
        assert!(json.starts_with(r#"{"complexity_score":0"#));
        assert!(!json.contains(r#""file""#));
    }

    #[test]
    fn test_several_files_json_is_array() {
        let reports = [entry("a.txt", "Hello there"), entry("b.txt", "Sub AutoOpen()")];
        let rendered = json(&reports, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["file"], "b.txt");
        assert_eq!(items[1]["needs_human_review"], true);
    }

    #[test]
    fn test_text_summary_lists_recommendations() {
        colored::control::set_override(false);
        let text = text(&[entry("letter.txt", "Sub AutoOpen()")]).unwrap();
        assert!(text.starts_with("letter.txt\n"));
        assert!(text.contains("Review:          required"));
        assert!(text.contains("Macros will not convert"));
    }
}
