//! Configuration files
//!
//! Loaded in this order, later files overriding earlier ones key by key:
//! 1. User config: `~/.fieldlens.toml`
//! 2. Project config: `./.fieldlens.toml`
//!
//! Command-line flags are applied on top by the caller.

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use fieldlens_core::ComplexityConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of both the user and the project config
pub const CONFIG_FILE: &str = ".fieldlens.toml";

/// Report rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON report (an array when several files are analyzed)
    Json,
}

/// Defaults for the `analyze` command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Default output format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,

    /// Compact JSON (no pretty-printing)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compact: Option<bool>,

    /// Analyze files in parallel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,
}

/// Effective configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Engine thresholds, weights and toggles
    pub analysis: ComplexityConfig,
    /// Output defaults
    pub output: OutputSettings,
}

impl Config {
    /// Discover, merge and decode the user and project configs
    ///
    /// Unreadable or unparsable files are reported and skipped.
    pub fn load() -> Result<Self> {
        let user = dirs::home_dir().and_then(|home| load_table(&home.join(CONFIG_FILE), "user"));
        let project = load_table(&PathBuf::from(CONFIG_FILE), "project");
        Self::from_tables(user, project)
    }

    /// Merge raw tables (project over user) and decode them
    pub fn from_tables(user: Option<toml::Table>, project: Option<toml::Table>) -> Result<Self> {
        let mut merged = user.unwrap_or_default();
        if let Some(project) = project {
            merge_tables(&mut merged, project);
        }
        toml::Value::Table(merged)
            .try_into()
            .context("Invalid configuration values")
    }

    /// Default configuration as a commented TOML file
    pub fn default_file() -> Result<String> {
        let body = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default configuration")?;
        Ok(format!(
            "# fieldlens configuration\n\
             #\n\
             # [analysis] maps onto the engine configuration; [output] holds\n\
             # defaults for `fieldlens analyze` (format = \"text\" | \"json\",\n\
             # compact, parallel).\n\n{body}"
        ))
    }
}

fn load_table(path: &Path, kind: &str) -> Option<toml::Table> {
    if !path.exists() {
        return None;
    }
    match read_table(path) {
        Ok(table) => {
            log::debug!("Loaded {kind} config from {}", path.display());
            Some(table)
        }
        Err(e) => {
            eprintln!(
                "{} Failed to load {kind} config from {}: {e:#}",
                "Warning:".yellow().bold(),
                path.display()
            );
            None
        }
    }
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    content
        .parse::<toml::Table>()
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Recursive key-by-key merge; `over` wins on conflicts
fn merge_tables(base: &mut toml::Table, over: toml::Table) {
    for (key, value) in over {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(text: &str) -> toml::Table {
        text.parse().unwrap()
    }

    #[test]
    fn test_defaults_without_files() {
        let config = Config::from_tables(None, None).unwrap();
        assert_eq!(config.analysis.nesting_high_threshold, 3);
        assert_eq!(config.output, OutputSettings::default());
    }

    #[test]
    fn test_project_overrides_user_per_key() {
        let user = table("[analysis]\nmax_samples = 5\nhigh_cutoff = 60\n[output]\nformat = \"json\"");
        let project = table("[analysis]\nmax_samples = 7\n[analysis.weights]\nmacros = 10");
        let config = Config::from_tables(Some(user), Some(project)).unwrap();

        assert_eq!(config.analysis.max_samples, 7);
        assert_eq!(config.analysis.high_cutoff, 60);
        assert_eq!(config.analysis.weights.macros, 10);
        assert_eq!(config.analysis.weights.formula, 5);
        assert_eq!(config.output.format, Some(OutputFormat::Json));
    }

    #[test]
    fn test_wrong_types_are_rejected() {
        let project = table("[analysis]\nmax_samples = \"many\"");
        assert!(Config::from_tables(None, Some(project)).is_err());
    }

    #[test]
    fn test_default_file_parses_back() {
        let text = Config::default_file().unwrap();
        let config = Config::from_tables(None, Some(table(&text))).unwrap();
        assert_eq!(config.analysis.critical_cutoff, 100);
        assert!(config.analysis.validate_content);
    }
}
