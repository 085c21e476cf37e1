//! Markdown report generation.
//!
//! This module renders a [`Summary`] into the fixed four-section Markdown
//! report, or into JSON, and writes it to disk atomically.

use crate::models::{Breach, Column, ColumnStat, Summary, WarningEntry};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Generate the complete Markdown report.
///
/// Lines are joined with `\n`.
pub fn generate_markdown_report(summary: &Summary) -> String {
    let mut lines: Vec<String> = vec!["# Telemetry Analysis Report".to_string(), String::new()];

    lines.extend(generate_speed_section(&summary.speed));
    lines.extend(generate_numeric_section(&summary.columns));
    lines.extend(generate_warnings_section(&summary.warnings));
    lines.extend(generate_breaches_section(&summary.breaches));

    lines.join("\n")
}

/// Magnitude from which every `f64` is a whole number.
const EXACT_INTEGER_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Round to 2 decimals; whole numbers keep a trailing `.0`.
pub fn format_value(value: f64) -> String {
    // scaling by 100 would overflow near f64::MAX
    let rounded = if value.abs() < EXACT_INTEGER_LIMIT {
        (value * 100.0).round() / 100.0
    } else {
        value
    };
    // avoid "-0.0"
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };

    if rounded.fract() == 0.0 {
        format!("{:.1}", rounded)
    } else {
        format!("{}", rounded)
    }
}

fn format_cell(value: Option<f64>) -> String {
    value.map(format_value).unwrap_or_else(|| "n/a".to_string())
}

/// Escape pipes and flatten line breaks so free text stays in one table row.
fn escape_cell(text: &str) -> String {
    text.replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .replace('|', "\\|")
}

fn generate_speed_section(speed: &ColumnStat) -> Vec<String> {
    let mut section = vec!["## 1. Speed statistics".to_string(), String::new()];

    match (speed.mean, speed.max, speed.min) {
        (Some(mean), Some(max), Some(min)) if speed.count > 0 => {
            section.push(format!("- **Mean speed:** {} km/h", format_value(mean)));
            section.push(format!("- **Max speed:** {} km/h", format_value(max)));
            section.push(format!("- **Min speed:** {} km/h", format_value(min)));
            section.push(format!("- **Samples:** {}", speed.count));
        }
        _ => section.push("No valid speed data.".to_string()),
    }
    section.push(String::new());

    section
}

fn generate_numeric_section(columns: &BTreeMap<Column, ColumnStat>) -> Vec<String> {
    let mut section = vec![
        "## 2. Numeric summary (mean, max, min)".to_string(),
        String::new(),
    ];

    if columns.values().all(ColumnStat::is_empty) {
        section.push("No numeric summary available.".to_string());
        section.push(String::new());
        return section;
    }

    section.push("| Column | Mean | Max | Min |".to_string());
    section.push("|--------|------|-----|-----|".to_string());

    for column in Column::ALL {
        let stat = columns.get(&column).copied().unwrap_or_default();
        section.push(format!(
            "| {} | {} | {} | {} |",
            column,
            format_cell(stat.mean),
            format_cell(stat.max),
            format_cell(stat.min)
        ));
    }
    section.push(String::new());

    section
}

fn generate_warnings_section(warnings: &[WarningEntry]) -> Vec<String> {
    let mut section = vec![
        "## 3. Warnings (event_type = WARNING)".to_string(),
        String::new(),
    ];

    if warnings.is_empty() {
        section.push("No WARNING events found.".to_string());
        section.push(String::new());
        return section;
    }

    section.push("| Timestamp | Event description |".to_string());
    section.push("|-----------|--------------------|".to_string());
    for warning in warnings {
        section.push(format!(
            "| {} | {} |",
            escape_cell(&warning.timestamp),
            escape_cell(&warning.description)
        ));
    }
    section.push(String::new());

    section
}

fn generate_breaches_section(breaches: &[Breach]) -> Vec<String> {
    let mut section = vec![
        "## 4. Threshold breaches (with timestamp)".to_string(),
        String::new(),
        "When a value exceeds the configured max or goes below the configured min, the timestamp is recorded below.".to_string(),
        String::new(),
    ];

    if breaches.is_empty() {
        section.push("No threshold breaches detected.".to_string());
        return section;
    }

    section.push("| Timestamp | Column | Value | Limit (max/min) |".to_string());
    section.push("|-----------|--------|-------|-----------------|".to_string());
    for breach in breaches {
        section.push(format!(
            "| {} | {} | {} | {} |",
            escape_cell(&breach.timestamp),
            breach.column,
            format_value(breach.value),
            breach.limit
        ));
    }
    section.push(String::new());

    section
}

/// Generate a JSON report.
pub fn generate_json_report(summary: &Summary) -> Result<String> {
    serde_json::to_string_pretty(summary).map_err(Into::into)
}

/// Write report content to `path` atomically.
///
/// Content goes to a temporary file in the destination directory which is
/// then renamed over `path`; on failure nothing is left at `path`.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create report in {}", dir.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    file.persist(path)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::summarize;
    use crate::config::Config;
    use crate::ingest::read_rows;
    use crate::models::Limit;

    const SAMPLE: &str = include_str!("../../fixtures/sample_telemetry.csv");

    fn sample_summary() -> Summary {
        let rows = read_rows(SAMPLE.as_bytes()).unwrap();
        summarize(&rows, &Config::default().threshold_rules().unwrap())
    }

    fn empty_summary() -> Summary {
        summarize(&[], &[])
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(125.0), "125.0");
        assert_eq!(format_value(43.928571), "43.93");
        assert_eq!(format_value(3.5), "3.5");
        assert_eq!(format_value(0.0), "0.0");
        assert_eq!(format_value(-0.001), "0.0");
        assert_eq!(format_value(-12.346), "-12.35");
        assert_eq!(format_value(12034.996), "12035.0");
    }

    #[test]
    fn test_format_value_huge_magnitudes() {
        for value in [1e307, f64::MAX, -1e300] {
            let text = format_value(value);
            assert!(text.ends_with(".0"), "{}", text);
            assert_eq!(text.parse::<f64>().ok(), Some(value));
        }

        assert!(!format_value(f64::MAX).contains("inf"));
        assert!(format_value(-f64::MAX).starts_with("-1797"));
        assert_eq!(format_value(1e16), "10000000000000000.0");
    }

    #[test]
    fn test_sections_in_fixed_order() {
        let markdown = generate_markdown_report(&sample_summary());

        let positions: Vec<usize> = [
            "# Telemetry Analysis Report",
            "## 1. Speed statistics",
            "## 2. Numeric summary (mean, max, min)",
            "## 3. Warnings (event_type = WARNING)",
            "## 4. Threshold breaches (with timestamp)",
        ]
        .iter()
        .map(|heading| markdown.find(heading).unwrap())
        .collect();

        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_speed_section() {
        let markdown = generate_markdown_report(&sample_summary());

        assert!(markdown.contains("- **Mean speed:** 43.93 km/h\n"));
        assert!(markdown.contains("- **Max speed:** 125.0 km/h\n"));
        assert!(markdown.contains("- **Min speed:** 0.0 km/h\n"));
        assert!(markdown.contains("- **Samples:** 14\n"));
    }

    #[test]
    fn test_numeric_table_uses_canonical_order() {
        let markdown = generate_markdown_report(&sample_summary());
        let table_rows: Vec<&str> = markdown
            .lines()
            .skip_while(|l| !l.starts_with("| Column |"))
            .skip(2)
            .take_while(|l| l.starts_with('|'))
            .collect();

        assert_eq!(table_rows.len(), Column::ALL.len());
        for (line, column) in table_rows.iter().zip(Column::ALL) {
            assert!(line.starts_with(&format!("| {} |", column)), "{}", line);
        }
        assert!(markdown.contains("| speed_kmh | 43.93 | 125.0 | 0.0 |"));
    }

    #[test]
    fn test_breach_table() {
        let markdown = generate_markdown_report(&sample_summary());

        assert!(markdown.contains("| 2025-02-05T08:06:00 | speed_kmh | 125.0 | max=120 |"));
        assert!(markdown.contains("| 2025-02-05T08:25:00 | battery_temp_c | 52.0 | max=50 |"));
        assert!(!markdown.contains("No threshold breaches detected."));
    }

    #[test]
    fn test_warning_table() {
        let markdown = generate_markdown_report(&sample_summary());

        assert!(markdown.contains("| Timestamp | Event description |"));
        assert!(markdown.contains("| 2025-02-05T08:06:00 | Overspeed detected |"));
        assert!(!markdown.contains("No WARNING events found."));
    }

    #[test]
    fn test_empty_summary_has_all_sections() {
        let markdown = generate_markdown_report(&empty_summary());

        assert!(markdown.contains("## 1. Speed statistics\n\nNo valid speed data."));
        assert!(markdown.contains("## 2. Numeric summary (mean, max, min)\n\nNo numeric summary available."));
        assert!(markdown.contains("## 3. Warnings (event_type = WARNING)\n\nNo WARNING events found."));
        assert!(markdown.ends_with("No threshold breaches detected."));
    }

    #[test]
    fn test_partially_empty_column_renders_na() {
        let mut summary = sample_summary();
        summary.columns.insert(Column::MotorRpm, ColumnStat::default());

        let markdown = generate_markdown_report(&summary);
        assert!(markdown.contains("| motor_rpm | n/a | n/a | n/a |"));
    }

    #[test]
    fn test_pipes_escaped() {
        let mut summary = empty_summary();
        summary.warnings.push(WarningEntry {
            timestamp: "t0".to_string(),
            description: "Coolant | pump fault".to_string(),
        });

        let markdown = generate_markdown_report(&summary);
        assert!(markdown.contains("| t0 | Coolant \\| pump fault |"));
    }

    #[test]
    fn test_newlines_flattened_in_cells() {
        let mut summary = empty_summary();
        summary.warnings.push(WarningEntry {
            timestamp: "t0".to_string(),
            description: "Coolant leak\nstop vehicle\r\ncall service\rnow".to_string(),
        });

        let markdown = generate_markdown_report(&summary);
        assert!(markdown.contains("| t0 | Coolant leak stop vehicle call service now |\n"));
        assert!(!markdown.contains('\r'));
        let table_rows = markdown.lines().filter(|l| l.starts_with("| t0 |")).count();
        assert_eq!(table_rows, 1);
    }

    #[test]
    fn test_min_limit_rendering() {
        let mut summary = empty_summary();
        summary.breaches.push(Breach {
            timestamp: "t0".to_string(),
            column: Column::BatterySocPct,
            value: 12.456,
            limit: Limit::Min(15.0),
        });

        let markdown = generate_markdown_report(&summary);
        assert!(markdown.contains("| t0 | battery_soc_pct | 12.46 | min=15 |"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let summary = sample_summary();
        assert_eq!(
            generate_markdown_report(&summary),
            generate_markdown_report(&summary.clone())
        );
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&sample_summary()).unwrap();

        assert!(json.contains("\"row_count\": 14"));
        assert!(json.contains("\"speed_kmh\""));
        assert!(json.contains("\"breaches\""));

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["breaches"].as_array().map(Vec::len), Some(2));
        assert_eq!(parsed["breaches"][0]["limit"]["kind"], "max");
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drive_report.md");

        write_report("# Telemetry Analysis Report", &path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "# Telemetry Analysis Report"
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_report_unwritable_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.md");

        let err = write_report("content", &path).unwrap_err();
        assert!(err.to_string().contains("missing"));
        assert!(!path.exists());
    }
}
