//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// telemetry-report - summarize a vehicle telemetry CSV
///
/// Computes mean/max/min for every numeric column, lists WARNING events
/// and flags rows that cross the configured thresholds. Writes a Markdown
/// (or JSON) report.
///
/// Examples:
///   telemetry-report drive.csv
///   telemetry-report drive.csv -o reports/drive.md
///   telemetry-report drive.csv --config limits.toml --fail-on-breach
///   telemetry-report drive.csv --format json
///   telemetry-report --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to the telemetry CSV file
    #[arg(value_name = "INPUT_CSV", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Output file path for the report
    ///
    /// Defaults to <INPUT_CSV stem>_report.md next to the input file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .telemetry-report.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "TELEMETRY_REPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format (markdown, json)
    ///
    /// Overrides the config file setting. Default: markdown.
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Exit with code 2 when any threshold breach is detected
    ///
    /// Useful for CI pipelines and fleet checks.
    #[arg(long)]
    pub fail_on_breach: bool,

    /// Dry run: parse and validate the CSV without writing a report
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .telemetry-report.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// File extension used for derived output paths.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the input path (empty when only `--init-config` was given).
    pub fn input_path(&self) -> &Path {
        self.input.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        let input = self.input_path();
        if !input.exists() {
            return Err(format!("input file not found: {}", input.display()));
        }
        if !input.is_file() {
            return Err(format!("input path is not a file: {}", input.display()));
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Resolve the report path: `--output` if given, otherwise
    /// `<input dir>/<input stem>_report.<ext>`.
    pub fn output_path(&self, format: OutputFormat) -> PathBuf {
        if let Some(ref output) = self.output {
            return output.clone();
        }
        default_output_path(self.input_path(), format)
    }
}

/// Derive the default report path from the input path.
pub fn default_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "telemetry".to_string());
    let file_name = format!("{}_report.{}", stem, format.extension());

    match input.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}
