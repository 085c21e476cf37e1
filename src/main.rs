//! telemetry-report - vehicle telemetry CSV analyzer
//!
//! Reads a telemetry CSV, computes per-column statistics, extracts WARNING
//! events and flags threshold breaches, then writes a Markdown report.
//!
//! Exit codes:
//!   0 - Success (no breaches, or no --fail-on-breach set)
//!   1 - Runtime error (missing file, missing columns, bad config, etc.)
//!   2 - Threshold breaches found with --fail-on-breach

mod analysis;
mod cli;
mod config;
mod error;
mod ingest;
mod models;
mod report;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use models::{Column, Limit, Summary, ThresholdRule};
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("telemetry-report v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_report(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Report failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .telemetry-report.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default thresholds.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to change limits or the output format.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// A non-empty, valid `RUST_LOG` takes precedence over `-v`/`-q`.
fn init_logging(args: &Args) {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(args.log_level(), directives.as_deref());

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Build the log filter from `RUST_LOG` directives, falling back to `level`.
fn log_filter(level: Level, directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| match EnvFilter::try_new(d) {
            Ok(filter) => Some(filter),
            Err(e) => {
                eprintln!("Ignoring invalid {}: {}", EnvFilter::DEFAULT_ENV, e);
                None
            }
        })
        .unwrap_or_else(|| {
            EnvFilter::default().add_directive(LevelFilter::from_level(level).into())
        })
}

/// Run the complete report workflow. Returns exit code (0 or 2).
fn run_report(args: Args) -> Result<i32> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let rules = config
        .threshold_rules()
        .context("Invalid threshold configuration")?;
    debug!("Threshold rules: {:?}", rules);

    // Step 1: Read and validate the CSV
    let input = args.input_path();
    if !args.quiet {
        println!("📥 Reading telemetry: {}", input.display());
    }
    let rows = ingest::read_csv(input)?;

    if args.dry_run {
        return handle_dry_run(rows.len(), &rules);
    }

    // Step 2: Aggregate
    let summary = analysis::summarize(&rows, &rules);

    // Step 3: Render and write
    let format = config.general.format;
    let output = match format {
        OutputFormat::Markdown => report::generate_markdown_report(&summary),
        OutputFormat::Json => report::generate_json_report(&summary)?,
    };

    let out_path = args.output_path(format);
    report::write_report(&output, &out_path)?;

    if !args.quiet {
        print_summary(&summary);
        println!("\n✅ Report written to: {}", out_path.display());
    }

    if args.fail_on_breach && !summary.breaches.is_empty() {
        eprintln!(
            "\n⛔ {} threshold breach(es) detected. Failing (exit code 2).",
            summary.breaches.len()
        );
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: report what was parsed, write nothing.
fn handle_dry_run(row_count: usize, rules: &[ThresholdRule]) -> Result<i32> {
    println!("\n🔍 Dry run: header valid, {} rows parsed.", row_count);
    println!("   Monitored columns:");
    for rule in rules {
        let limits: Vec<String> = [rule.max.map(Limit::Max), rule.min.map(Limit::Min)]
            .into_iter()
            .flatten()
            .map(|limit| limit.to_string())
            .collect();
        println!("     📏 {} ({})", rule.column, limits.join(", "));
    }
    println!("\n✅ Dry run complete. No report was written.");
    Ok(0)
}

fn print_summary(summary: &Summary) {
    println!("\n📊 Telemetry Summary:");
    println!("   Rows: {}", summary.row_count);
    match summary.speed.mean {
        Some(mean) => println!(
            "   Mean {}: {}",
            Column::SpeedKmh,
            report::format_value(mean)
        ),
        None => println!("   No valid speed data"),
    }
    println!("   Warnings: {}", summary.warnings.len());
    println!("   Threshold breaches: {}", summary.breaches.len());
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default()? {
        Some(config) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}
