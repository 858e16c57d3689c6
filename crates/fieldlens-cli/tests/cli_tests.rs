//! Integration tests for all CLI commands
//!
//! Every test runs in its own temporary directory, which also serves as
//! `HOME`, so no real configuration file is picked up.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const DEEP_IF: &str = r#"{IF a "{IF b "{IF c "{IF d "deep" "d"}" "c"}" "b"}" "a"}"#;
const PROSE: &str = "Thank you for your order, it will ship tomorrow.";

/// Helper to create a CLI command isolated in `dir`
fn cli(dir: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_fieldlens"));
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

// ============ ANALYZE COMMAND TESTS ============

#[test]
fn test_analyze_help() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .arg("analyze")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--fail-on-review"));
}

#[test]
fn test_analyze_text_summary() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "deep.txt", DEEP_IF);

    cli(&dir)
        .arg("analyze")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("HIGH"))
        .stdout(predicate::str::contains("Review:          required"))
        .stdout(predicate::str::contains("4 levels deep"));
}

#[test]
fn test_analyze_json_single_file() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "prose.txt", PROSE);

    let output = cli(&dir)
        .args(["analyze", "-f", "json", "--compact"])
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["complexity_score"], 0);
    assert_eq!(report["complexity_level"], "low");
    assert_eq!(report["needs_human_review"], false);
    assert_eq!(report["document_format"], "plain_text");
}

#[test]
fn test_analyze_json_several_files_parallel() {
    let dir = TempDir::new().unwrap();
    let a = write_file(&dir, "a.txt", PROSE);
    let b = write_file(&dir, "b.txt", "Sub AutoOpen()\nEnd Sub");

    let output = cli(&dir)
        .args(["analyze", "--format", "json", "--parallel"])
        .arg(&a)
        .arg(&b)
        .output()
        .unwrap();
    assert!(output.status.success());

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let items = reports.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items[0]["file"].as_str().unwrap().ends_with("a.txt"));
    assert_eq!(items[1]["needs_human_review"], true);
}

#[test]
fn test_analyze_output_file() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "prose.txt", PROSE);
    let out = dir.path().join("report.json");

    cli(&dir)
        .args(["analyze", "-f", "json", "-o"])
        .arg(&out)
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(report["complexity_level"], "low");
}

#[test]
fn test_fail_on_review_exit_code() {
    let dir = TempDir::new().unwrap();
    let deep = write_file(&dir, "deep.txt", DEEP_IF);
    let prose = write_file(&dir, "prose.txt", PROSE);

    cli(&dir)
        .args(["analyze", "--fail-on-review"])
        .arg(&deep)
        .assert()
        .code(2);

    cli(&dir)
        .args(["analyze", "--fail-on-review"])
        .arg(&prose)
        .assert()
        .success();
}

#[test]
fn test_nesting_flag_overrides_threshold() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "deep.txt", DEEP_IF);

    let output = cli(&dir)
        .args(["analyze", "-f", "json", "--nesting-high", "5"])
        .arg(&file)
        .output()
        .unwrap();
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["potential_issues"][0]["severity"], "medium");
}

#[test]
fn test_invalid_threshold_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "deep.txt", DEEP_IF);

    cli(&dir)
        .args(["analyze", "--nesting-high", "1"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid analysis configuration"));
}

#[test]
fn test_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .args(["analyze", "does-not-exist.docx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}

#[test]
fn test_project_config_applies() {
    let dir = TempDir::new().unwrap();
    let file = write_file(&dir, "prose.txt", PROSE);
    write_file(&dir, ".fieldlens.toml", "[output]\nformat = \"json\"\ncompact = true\n");

    cli(&dir)
        .arg("analyze")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::starts_with(r#"{"complexity_score":0"#));
}

// ============ DETECT COMMAND TESTS ============

#[test]
fn test_detect_formats() {
    let dir = TempDir::new().unwrap();
    let rtf = write_file(&dir, "letter.rtf", r"{\rtf1\ansi Hello}");
    let txt = write_file(&dir, "notes.txt", PROSE);

    cli(&dir)
        .arg("detect")
        .arg(&rtf)
        .arg(&txt)
        .assert()
        .success()
        .stdout(predicate::str::contains("letter.rtf\trtf"))
        .stdout(predicate::str::contains("notes.txt\tplain_text"));
}

// ============ CONFIG COMMAND TESTS ============

#[test]
fn test_config_show() {
    let dir = TempDir::new().unwrap();
    cli(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nesting_high_threshold = 3"));
}

#[test]
fn test_config_init_creates_file() {
    let dir = TempDir::new().unwrap();

    cli(&dir).args(["config", "init"]).assert().success();
    let written = fs::read_to_string(dir.path().join(".fieldlens.toml")).unwrap();
    assert!(written.contains("[analysis]"));

    cli(&dir)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    cli(&dir).args(["config", "init", "--force"]).assert().success();
}
