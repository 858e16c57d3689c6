#![allow(
    clippy::needless_pass_by_value, // clap hands over owned values
    clippy::fn_params_excessive_bools, // CLI commands have many boolean flags
)]

//! fieldlens CLI - template complexity analysis
//!
//! Scores DOCX, DOC, RTF and text templates for migration effort and reports
//! what needs a human: deep IF nesting, macros, ActiveX controls, formulas.

mod config;
mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use config::{Config, OutputFormat, CONFIG_FILE};
use fieldlens_core::Analyzer;
use fieldlens_extract::detect_format;
use rayon::prelude::*;
use render::FileReport;
use std::fs;
use std::path::{Path, PathBuf};

/// Exit code of `analyze --fail-on-review` when a file needs review
const EXIT_REVIEW_REQUIRED: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "fieldlens",
    about = "Measure how hard word-processing templates are to migrate",
    long_about = "Measure how hard word-processing templates are to migrate.\n\
                  \n\
                  Reads DOCX/DOTX/DOCM, DOC/DOT, RTF and plain-text templates and reports\n\
                  merge fields, nested IF fields, macros, formulas, tables and ActiveX controls\n\
                  with a complexity score and recommendations.",
    version
)]
struct Args {
    /// Suppress all output except errors and results
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show detailed processing information
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze templates and print a complexity report
    #[command(long_about = "Analyze templates and print a complexity report.\n\
                      \n\
                      Examples:\n\
                        fieldlens analyze letter.docx\n\
                        fieldlens analyze templates/*.doc -f json -o report.json --parallel\n\
                        fieldlens analyze offer.rtf --fail-on-review  # exit code 2 if review is needed")]
    Analyze {
        /// Template files
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,

        /// Output format (default: config, then text)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Compact JSON output (no pretty-printing)
        #[arg(long)]
        compact: bool,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Analyze files in parallel
        #[arg(long)]
        parallel: bool,

        /// Exit with code 2 when any file needs human review
        #[arg(long)]
        fail_on_review: bool,

        /// IF nesting deeper than this is a high issue
        #[arg(long, value_name = "N")]
        nesting_high: Option<usize>,

        /// Cap on merge field, macro and formula samples
        #[arg(long, value_name = "N")]
        max_samples: Option<usize>,
    },

    /// Print the detected container format of each file
    Detect {
        /// Files to classify
        #[arg(value_name = "FILES", required = true)]
        files: Vec<PathBuf>,
    },

    /// Manage configuration files
    #[command(long_about = "Manage fieldlens configuration files.\n\
                      \n\
                      Configuration files are loaded in this order (later overrides earlier):\n\
                        1. User config: ~/.fieldlens.toml\n\
                        2. Project config: ./.fieldlens.toml\n\
                        3. Command-line arguments")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Display the effective configuration
    Show {
        /// Output as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },

    /// Create ./.fieldlens.toml with default values
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

/// Output verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    const fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }

    const fn should_show_output(self) -> bool {
        !matches!(self, Self::Quiet)
    }

    const fn log_filter(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "debug",
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let verbosity = Verbosity::from_flags(args.quiet, args.verbose);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(verbosity.log_filter()),
    )
    .target(env_logger::Target::Stderr)
    .init();

    match args.command {
        Commands::Analyze {
            files,
            format,
            compact,
            output,
            parallel,
            fail_on_review,
            nesting_high,
            max_samples,
        } => {
            let config = Config::load()?;
            let options = AnalyzeOptions {
                format: format.or(config.output.format).unwrap_or_default(),
                compact: compact || config.output.compact.unwrap_or(false),
                parallel: parallel || config.output.parallel.unwrap_or(false),
                output,
                fail_on_review,
            };
            let mut analysis = config.analysis;
            if let Some(high) = nesting_high {
                analysis.nesting_high_threshold = high;
            }
            if let Some(cap) = max_samples {
                analysis.max_samples = cap;
            }
            let analyzer = Analyzer::try_new(analysis).context("Invalid analysis configuration")?;
            analyze_command(&analyzer, &files, &options, verbosity)
        }
        Commands::Detect { files } => detect_command(&files),
        Commands::Config { action } => match action {
            ConfigAction::Show { json } => config_show(json),
            ConfigAction::Init { force } => config_init(force, verbosity),
        },
    }
}

/// Resolved settings of one `analyze` run
#[derive(Debug)]
struct AnalyzeOptions {
    format: OutputFormat,
    compact: bool,
    parallel: bool,
    output: Option<PathBuf>,
    fail_on_review: bool,
}

fn analyze_file(analyzer: &Analyzer, path: &Path) -> Result<FileReport> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    log::debug!("Analyzing {} ({} bytes)", path.display(), bytes.len());
    Ok(FileReport {
        file: path.display().to_string(),
        report: analyzer.analyze(&bytes),
    })
}

fn analyze_command(
    analyzer: &Analyzer,
    files: &[PathBuf],
    options: &AnalyzeOptions,
    verbosity: Verbosity,
) -> Result<()> {
    let reports: Vec<FileReport> = if options.parallel {
        files
            .par_iter()
            .map(|path| analyze_file(analyzer, path))
            .collect::<Result<_>>()?
    } else {
        files
            .iter()
            .map(|path| analyze_file(analyzer, path))
            .collect::<Result<_>>()?
    };

    if options.output.is_some() {
        colored::control::set_override(false);
    }
    let rendered = match options.format {
        OutputFormat::Json => render::json(&reports, options.compact)?,
        OutputFormat::Text => render::text(&reports)?,
    };

    match &options.output {
        Some(path) => {
            fs::write(path, format!("{}\n", rendered.trim_end()))
                .with_context(|| format!("Failed to write report: {}", path.display()))?;
            if verbosity.should_show_output() {
                eprintln!(
                    "{} Wrote {} report(s) to {}",
                    "Success:".green().bold(),
                    reports.len(),
                    path.display()
                );
            }
        }
        None => println!("{}", rendered.trim_end()),
    }

    let flagged = reports
        .iter()
        .filter(|r| r.report.needs_human_review)
        .count();
    if options.fail_on_review && flagged > 0 {
        if verbosity.should_show_output() {
            eprintln!(
                "{} {flagged} of {} file(s) need human review",
                "Review:".yellow().bold(),
                reports.len()
            );
        }
        std::process::exit(EXIT_REVIEW_REQUIRED);
    }
    Ok(())
}

fn detect_command(files: &[PathBuf]) -> Result<()> {
    for path in files {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        println!("{}\t{}", path.display(), detect_format(&bytes));
    }
    Ok(())
}

/// Display the effective configuration
fn config_show(json: bool) -> Result<()> {
    let config = Config::load()?;
    let rendered = if json {
        serde_json::to_string_pretty(&config)?
    } else {
        toml::to_string_pretty(&config)?
    };
    println!("{rendered}");
    Ok(())
}

/// Write a default project configuration file
fn config_init(force: bool, verbosity: Verbosity) -> Result<()> {
    let config_path = PathBuf::from(CONFIG_FILE);

    if config_path.exists() && !force {
        eprintln!(
            "{} Configuration file already exists: {}",
            "Error:".red().bold(),
            config_path.display()
        );
        eprintln!("{} Use --force to overwrite", "Hint:".cyan().bold());
        std::process::exit(1);
    }

    fs::write(&config_path, Config::default_file()?)
        .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

    if verbosity.should_show_output() {
        println!(
            "{} Created configuration file: {}",
            "Success:".green().bold(),
            config_path.display()
        );
    }
    Ok(())
}
