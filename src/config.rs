//! Configuration file handling.
//!
//! This module handles loading threshold rules and report settings from
//! `.telemetry-report.toml` files and merging them with CLI arguments.

use crate::cli::OutputFormat;
use crate::error::TelemetryError;
use crate::models::{Column, ThresholdRule};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".telemetry-report.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Limits keyed by column name. A table here replaces the defaults.
    #[serde(default = "default_thresholds")]
    pub thresholds: BTreeMap<String, LimitConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            thresholds: default_thresholds(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Report output format.
    #[serde(default)]
    pub format: OutputFormat,
}

/// Upper and/or lower limit for one column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LimitConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
}

impl LimitConfig {
    fn max(max: f64) -> Self {
        Self {
            max: Some(max),
            min: None,
        }
    }

    fn min(min: f64) -> Self {
        Self {
            max: None,
            min: Some(min),
        }
    }
}

fn default_thresholds() -> BTreeMap<String, LimitConfig> {
    [
        (Column::SpeedKmh, LimitConfig::max(120.0)),
        (Column::BatteryTempC, LimitConfig::max(50.0)),
        (Column::MotorTempC, LimitConfig::max(90.0)),
        (Column::InverterTempC, LimitConfig::max(75.0)),
        (Column::BatterySocPct, LimitConfig::min(15.0)),
        (
            Column::CabinTempC,
            LimitConfig {
                max: Some(40.0),
                min: Some(5.0),
            },
        ),
    ]
    .into_iter()
    .map(|(column, limits)| (column.as_str().to_string(), limits))
    .collect()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .threshold_rules()
            .with_context(|| format!("Invalid thresholds in config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.telemetry-report.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(DEFAULT_CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings when given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(format) = args.format {
            self.general.format = format;
        }
    }

    /// Validate the threshold table and convert it into typed rules in
    /// canonical column order.
    pub fn threshold_rules(&self) -> Result<Vec<ThresholdRule>, TelemetryError> {
        let mut rules = Vec::with_capacity(self.thresholds.len());

        for (name, limits) in &self.thresholds {
            let column = Column::from_name(name)
                .ok_or_else(|| TelemetryError::UnknownThresholdColumn(name.clone()))?;

            let bounds = [limits.max, limits.min];
            if bounds.iter().all(Option::is_none) {
                return Err(TelemetryError::EmptyThreshold {
                    column: name.clone(),
                });
            }
            if bounds.iter().flatten().any(|v| !v.is_finite()) {
                return Err(TelemetryError::NonFiniteThreshold {
                    column: name.clone(),
                });
            }
            if let (Some(max), Some(min)) = (limits.max, limits.min) {
                if min > max {
                    return Err(TelemetryError::InvertedThreshold {
                        column: name.clone(),
                        min,
                        max,
                    });
                }
            }

            rules.push(ThresholdRule {
                column,
                max: limits.max,
                min: limits.min,
            });
        }

        rules.sort_by_key(|rule| rule.column);
        Ok(rules)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
