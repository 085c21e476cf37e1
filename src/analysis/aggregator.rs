//! Column aggregation, warning extraction and threshold checks.
//!
//! Every function here is pure: rows and rules in, derived values out.

use crate::models::{Breach, Column, ColumnStat, Row, Summary, ThresholdRule, WarningEntry};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Statistics over the present values of one column.
pub fn column_stat(rows: &[Row], column: Column) -> ColumnStat {
    ColumnStat::from_values(rows.iter().filter_map(|row| row.value(column)))
}

/// Statistics for `speed_kmh`.
pub fn speed_stats(rows: &[Row]) -> ColumnStat {
    column_stat(rows, Column::SpeedKmh)
}

/// Statistics for every numeric column, keyed in canonical order.
pub fn column_stats(rows: &[Row]) -> BTreeMap<Column, ColumnStat> {
    Column::ALL
        .iter()
        .map(|&column| (column, column_stat(rows, column)))
        .collect()
}

/// Rows whose event type is exactly `WARNING`, in input order.
pub fn collect_warnings(rows: &[Row]) -> Vec<WarningEntry> {
    rows.iter()
        .filter(|row| row.is_warning())
        .map(|row| WarningEntry {
            timestamp: row.timestamp.clone(),
            description: row.event_description.clone(),
        })
        .collect()
}

/// Every rule violation, ordered by row and then by the order of `rules`.
///
/// Callers pass rules in canonical column order (see
/// `Config::threshold_rules`) so breaches within a row follow column order.
pub fn detect_breaches(rows: &[Row], rules: &[ThresholdRule]) -> Vec<Breach> {
    let mut breaches = Vec::new();

    for row in rows {
        for rule in rules {
            let Some(value) = row.value(rule.column) else {
                continue;
            };

            if let Some(limit) = rule.check(value) {
                debug!(
                    "Breach at {}: {} = {} ({})",
                    row.timestamp, rule.column, value, limit
                );
                breaches.push(Breach {
                    timestamp: row.timestamp.clone(),
                    column: rule.column,
                    value,
                    limit,
                });
            }
        }
    }

    breaches
}

/// Run the full aggregation for one report.
pub fn summarize(rows: &[Row], rules: &[ThresholdRule]) -> Summary {
    let summary = Summary {
        row_count: rows.len(),
        speed: speed_stats(rows),
        columns: column_stats(rows),
        warnings: collect_warnings(rows),
        breaches: detect_breaches(rows, rules),
    };

    info!(
        "Aggregated {} rows: {} warnings, {} threshold breaches",
        summary.row_count,
        summary.warnings.len(),
        summary.breaches.len()
    );

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ingest::read_rows;
    use crate::models::{EventType, Limit};

    const SAMPLE: &str = include_str!("../../fixtures/sample_telemetry.csv");

    fn sample_rows() -> Vec<Row> {
        read_rows(SAMPLE.as_bytes()).unwrap()
    }

    fn default_rules() -> Vec<ThresholdRule> {
        Config::default().threshold_rules().unwrap()
    }

    fn create_test_row(timestamp: &str, event: &str, speed: Option<f64>) -> Row {
        Row::new(timestamp, EventType::from(event), format!("{} event", event))
            .with_value(Column::SpeedKmh, speed)
    }

    #[test]
    fn test_sample_end_to_end() {
        let summary = summarize(&sample_rows(), &default_rules());

        assert_eq!(summary.row_count, 14);
        assert_eq!(
            summary.breaches,
            vec![
                Breach {
                    timestamp: "2025-02-05T08:06:00".to_string(),
                    column: Column::SpeedKmh,
                    value: 125.0,
                    limit: Limit::Max(120.0),
                },
                Breach {
                    timestamp: "2025-02-05T08:25:00".to_string(),
                    column: Column::BatteryTempC,
                    value: 52.0,
                    limit: Limit::Max(50.0),
                },
            ]
        );

        let mean = summary.speed.mean.unwrap();
        assert_eq!((mean * 100.0).round() / 100.0, 43.93);
        assert_eq!(summary.speed.max, Some(125.0));
        assert_eq!(summary.speed.min, Some(0.0));
        assert_eq!(summary.speed.count, 14);
        assert_eq!(summary.columns[&Column::BatteryTempC].max, Some(52.0));
    }

    #[test]
    fn test_blank_voltage_only_excluded_from_its_column() {
        let stats = column_stats(&sample_rows());

        assert_eq!(stats[&Column::SpeedKmh].count, 14);
        assert_eq!(stats[&Column::BatteryVoltage].count, 13);
        assert_eq!(stats[&Column::BatteryCurrent].count, 14);
    }

    #[test]
    fn test_sample_warnings_in_order() {
        let warnings = collect_warnings(&sample_rows());
        let timestamps: Vec<&str> = warnings.iter().map(|w| w.timestamp.as_str()).collect();

        assert_eq!(
            timestamps,
            vec![
                "2025-02-05T08:06:00",
                "2025-02-05T08:22:00",
                "2025-02-05T08:25:00"
            ]
        );
        assert_eq!(warnings[0].description, "Overspeed detected");
    }

    #[test]
    fn test_mean_between_min_and_max() {
        for (column, stat) in column_stats(&sample_rows()) {
            assert!(stat.count > 0, "{} has no samples", column);
            let (mean, max, min) = (stat.mean.unwrap(), stat.max.unwrap(), stat.min.unwrap());
            assert!(min <= mean && mean <= max, "{}: {} {} {}", column, min, mean, max);
        }
    }

    #[test]
    fn test_empty_input() {
        let summary = summarize(&[], &default_rules());

        assert_eq!(summary.row_count, 0);
        assert_eq!(summary.speed.count, 0);
        assert_eq!(summary.speed.mean, None);
        assert_eq!(summary.columns.len(), Column::ALL.len());
        assert!(summary.columns.values().all(|s| s.count == 0 && s.mean.is_none()));
        assert!(summary.warnings.is_empty());
        assert!(summary.breaches.is_empty());
    }

    #[test]
    fn test_fully_absent_column() {
        let rows = vec![
            create_test_row("t0", "INFO", None),
            create_test_row("t1", "INFO", None),
        ];

        let stat = speed_stats(&rows);
        assert_eq!(stat.count, 0);
        assert_eq!(stat.max, None);
        assert_eq!(stat.min, None);
    }

    #[test]
    fn test_warning_match_is_exact() {
        let rows = vec![
            create_test_row("t0", "WARNING", Some(1.0)),
            create_test_row("t1", "warning", Some(1.0)),
            create_test_row("t2", "WARN", Some(1.0)),
            create_test_row("t3", "WARNING", Some(1.0)),
            create_test_row("t4", "WARNING", Some(1.0)),
        ];

        let warnings = collect_warnings(&rows);
        let timestamps: Vec<&str> = warnings.iter().map(|w| w.timestamp.as_str()).collect();
        assert_eq!(timestamps, vec!["t0", "t3", "t4"]);
    }

    #[test]
    fn test_boundary_values_never_breach() {
        let rules = vec![ThresholdRule {
            column: Column::SpeedKmh,
            max: Some(120.0),
            min: Some(10.0),
        }];
        let rows = vec![
            create_test_row("at-max", "INFO", Some(120.0)),
            create_test_row("at-min", "INFO", Some(10.0)),
            create_test_row("over", "INFO", Some(120.5)),
            create_test_row("under", "INFO", Some(9.5)),
            create_test_row("absent", "INFO", None),
        ];

        let breaches = detect_breaches(&rows, &rules);
        assert_eq!(breaches.len(), 2);
        assert_eq!(breaches[0].timestamp, "over");
        assert_eq!(breaches[0].limit, Limit::Max(120.0));
        assert_eq!(breaches[1].timestamp, "under");
        assert_eq!(breaches[1].limit, Limit::Min(10.0));
    }

    #[test]
    fn test_multiple_breaches_in_one_row_follow_column_order() {
        let rules = default_rules();
        let rows = vec![
            Row::new("t0", EventType::Info, "")
                .with_value(Column::CabinTempC, Some(2.0))
                .with_value(Column::SpeedKmh, Some(130.0))
                .with_value(Column::BatterySocPct, Some(10.0)),
            create_test_row("t1", "INFO", Some(121.0)),
        ];

        let breaches = detect_breaches(&rows, &rules);
        let got: Vec<(&str, Column)> = breaches
            .iter()
            .map(|b| (b.timestamp.as_str(), b.column))
            .collect();

        assert_eq!(
            got,
            vec![
                ("t0", Column::SpeedKmh),
                ("t0", Column::BatterySocPct),
                ("t0", Column::CabinTempC),
                ("t1", Column::SpeedKmh),
            ]
        );
        assert_eq!(breaches[2].limit, Limit::Min(5.0));
    }

    #[test]
    fn test_no_rules_no_breaches() {
        assert!(detect_breaches(&sample_rows(), &[]).is_empty());
    }
}
