//! Data models for the telemetry report.
//!
//! This module contains the typed telemetry row, the numeric column set,
//! and the derived statistics, warnings and breaches produced per run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A numeric telemetry column.
///
/// Variants are declared in the canonical report order, so the derived
/// `Ord` (and any `BTreeMap<Column, _>`) iterates in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    SpeedKmh,
    ThrottlePct,
    BrakePct,
    RegenBrake,
    MotorRpm,
    BatteryVoltage,
    BatteryCurrent,
    BatterySocPct,
    BatteryTempC,
    MotorTempC,
    InverterTempC,
    CabinTempC,
    OdometerKm,
    PowerKw,
    EnergyUsedKw,
}

impl Column {
    /// All numeric columns in canonical order.
    pub const ALL: [Column; 15] = [
        Column::SpeedKmh,
        Column::ThrottlePct,
        Column::BrakePct,
        Column::RegenBrake,
        Column::MotorRpm,
        Column::BatteryVoltage,
        Column::BatteryCurrent,
        Column::BatterySocPct,
        Column::BatteryTempC,
        Column::MotorTempC,
        Column::InverterTempC,
        Column::CabinTempC,
        Column::OdometerKm,
        Column::PowerKw,
        Column::EnergyUsedKw,
    ];

    /// The CSV header name of this column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::SpeedKmh => "speed_kmh",
            Column::ThrottlePct => "throttle_pct",
            Column::BrakePct => "brake_pct",
            Column::RegenBrake => "regen_brake",
            Column::MotorRpm => "motor_rpm",
            Column::BatteryVoltage => "battery_voltage",
            Column::BatteryCurrent => "battery_current",
            Column::BatterySocPct => "battery_soc_pct",
            Column::BatteryTempC => "battery_temp_c",
            Column::MotorTempC => "motor_temp_c",
            Column::InverterTempC => "inverter_temp_c",
            Column::CabinTempC => "cabin_temp_c",
            Column::OdometerKm => "odometer_km",
            Column::PowerKw => "power_kw",
            Column::EnergyUsedKw => "energy_used_kw",
        }
    }

    /// Look up a column by its header name (exact match).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == name)
    }

    /// Position of this column in canonical order.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event type attached to a telemetry row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    System,
    Info,
    Warning,
    /// Any other label, kept verbatim.
    Other(String),
}

impl From<&str> for EventType {
    /// Exact, case-sensitive match; `"warning"` is not a warning.
    fn from(s: &str) -> Self {
        match s {
            "SYSTEM" => EventType::System,
            "INFO" => EventType::Info,
            "WARNING" => EventType::Warning,
            other => EventType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::System => write!(f, "SYSTEM"),
            EventType::Info => write!(f, "INFO"),
            EventType::Warning => write!(f, "WARNING"),
            EventType::Other(s) => write!(f, "{}", s),
        }
    }
}

/// One telemetry sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Timestamp label, preserved verbatim from the input.
    pub timestamp: String,
    /// Numeric fields indexed by `Column::index`; `None` when absent or unparseable.
    values: [Option<f64>; 15],
    /// Event type.
    pub event_type: EventType,
    /// Free-text event description.
    pub event_description: String,
}

impl Row {
    /// Creates a row with every numeric field absent.
    pub fn new(
        timestamp: impl Into<String>,
        event_type: EventType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            values: [None; 15],
            event_type,
            event_description: description.into(),
        }
    }

    /// Builder-style setter for a numeric field.
    pub fn with_value(mut self, column: Column, value: Option<f64>) -> Self {
        self.values[column.index()] = value;
        self
    }

    /// The value of a numeric field, if present.
    pub fn value(&self, column: Column) -> Option<f64> {
        self.values[column.index()]
    }

    /// Whether this row is a `WARNING` event.
    pub fn is_warning(&self) -> bool {
        self.event_type == EventType::Warning
    }
}

/// Aggregate statistics for one numeric column.
///
/// `mean`, `max` and `min` are `None` exactly when `count == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnStat {
    pub mean: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub count: usize,
}

impl ColumnStat {
    /// Computes statistics over the present values.
    ///
    /// The mean is accumulated incrementally so large values cannot overflow
    /// a running sum, and it is kept within `[min, max]`.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut stat = Self::default();
        let mut mean = 0.0;

        for v in values {
            stat.count += 1;
            let n = stat.count as f64;
            mean += v / n - mean / n;
            stat.max = Some(stat.max.map_or(v, |m| m.max(v)));
            stat.min = Some(stat.min.map_or(v, |m| m.min(v)));
        }

        if let (Some(min), Some(max)) = (stat.min, stat.max) {
            // rounding can land one ulp outside the range
            stat.mean = Some(mean.max(min).min(max));
        }

        stat
    }

    /// Whether any value contributed.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// A configured max and/or min limit bound to one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub column: Column,
    pub max: Option<f64>,
    pub min: Option<f64>,
}

impl ThresholdRule {
    /// Returns the violated limit for `value`, if any. Equality never violates.
    pub fn check(&self, value: f64) -> Option<Limit> {
        if let Some(max) = self.max {
            if value > max {
                return Some(Limit::Max(max));
            }
        }
        if let Some(min) = self.min {
            if value < min {
                return Some(Limit::Min(min));
            }
        }
        None
    }
}

/// The limit a breach violated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Limit {
    Max(f64),
    Min(f64),
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Max(v) => write!(f, "max={}", v),
            Limit::Min(v) => write!(f, "min={}", v),
        }
    }
}

/// One row/column/rule combination where a value crossed a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breach {
    pub timestamp: String,
    pub column: Column,
    pub value: f64,
    pub limit: Limit,
}

/// A telemetry row flagged as a `WARNING` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningEntry {
    pub timestamp: String,
    pub description: String,
}

/// Everything the aggregator derives from one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of rows read.
    pub row_count: usize,
    /// Statistics for `speed_kmh`, reported separately.
    pub speed: ColumnStat,
    /// Statistics for every numeric column.
    pub columns: BTreeMap<Column, ColumnStat>,
    /// Warning events in input order.
    pub warnings: Vec<WarningEntry>,
    /// Threshold breaches in input order, then column order.
    pub breaches: Vec<Breach>,
}
