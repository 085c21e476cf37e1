//! Domain error types.

use thiserror::Error;

/// Errors raised while reading telemetry or resolving thresholds.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("CSV missing columns: {missing:?}. Found: {found:?}")]
    MissingColumns {
        missing: Vec<String>,
        found: Vec<String>,
    },

    #[error("Threshold configured for unknown column: {0}")]
    UnknownThresholdColumn(String),

    #[error("Threshold for {column} sets neither max nor min")]
    EmptyThreshold { column: String },

    #[error("Threshold for {column} has min ({min}) greater than max ({max})")]
    InvertedThreshold { column: String, min: f64, max: f64 },

    #[error("Threshold for {column} is not a finite number")]
    NonFiniteThreshold { column: String },

    #[error("CSV decode error: {0}")]
    Csv(#[from] csv::Error),
}
