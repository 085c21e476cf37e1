//! Telemetry CSV ingestion.
//!
//! This module reads a telemetry CSV, validates its header against the
//! required column set and builds typed [`Row`] values. Numeric cells that
//! are blank or unparseable become absent values for that column only.

use crate::error::TelemetryError;
use crate::models::{Column, EventType, Row};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

const TIMESTAMP: &str = "timestamp";
const EVENT_TYPE: &str = "event_type";
const EVENT_DESCRIPTION: &str = "event_description";

/// Header spellings accepted in place of a canonical name.
const HEADER_ALIASES: &[(&str, &str)] = &[("event_descirption", EVENT_DESCRIPTION)];

/// Every header the input must carry, in report order.
pub fn required_columns() -> Vec<&'static str> {
    let mut cols = vec![TIMESTAMP];
    cols.extend(Column::ALL.iter().map(|c| c.as_str()));
    cols.push(EVENT_TYPE);
    cols.push(EVENT_DESCRIPTION);
    cols
}

/// Field positions resolved from the header row.
#[derive(Debug, Clone)]
struct HeaderLayout {
    timestamp: usize,
    event_type: usize,
    event_description: usize,
    numeric: [usize; 15],
}

impl HeaderLayout {
    fn resolve(headers: &[String]) -> Result<Self, TelemetryError> {
        let names: Vec<&str> = headers.iter().map(|h| canonical_header(h)).collect();
        let position = |name: &str| names.iter().position(|h| *h == name);

        let missing: Vec<String> = required_columns()
            .into_iter()
            .filter(|name| position(*name).is_none())
            .map(String::from)
            .collect();

        if !missing.is_empty() {
            return Err(TelemetryError::MissingColumns {
                missing,
                found: headers.to_vec(),
            });
        }

        let mut numeric = [0usize; 15];
        for column in Column::ALL {
            numeric[column.index()] = position(column.as_str()).unwrap_or_default();
        }

        Ok(Self {
            timestamp: position(TIMESTAMP).unwrap_or_default(),
            event_type: position(EVENT_TYPE).unwrap_or_default(),
            event_description: position(EVENT_DESCRIPTION).unwrap_or_default(),
            numeric,
        })
    }
}

/// Maps an aliased header to its canonical name.
fn canonical_header(name: &str) -> &str {
    HEADER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

/// Parse a numeric cell. Blank, non-numeric and non-finite cells are absent.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Decode a text cell, replacing invalid UTF-8 sequences.
fn text_field(record: &csv::ByteRecord, idx: usize) -> String {
    record
        .get(idx)
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default()
}

/// Read telemetry rows from any reader.
///
/// Fails with [`TelemetryError::MissingColumns`] before reading any data row
/// when the header lacks a required column. Cells are decoded one by one, so
/// invalid UTF-8 in a numeric cell only makes that value absent.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<Row>, TelemetryError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .byte_headers()?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();
    debug!("CSV header: {:?}", headers);
    let layout = HeaderLayout::resolve(&headers)?;

    let mut rows = Vec::new();
    let mut invalid = [0usize; 15];

    for record in csv_reader.byte_records() {
        let record = record?;

        let event_type = text_field(&record, layout.event_type);
        let mut row = Row::new(
            text_field(&record, layout.timestamp),
            EventType::from(event_type.as_str()),
            text_field(&record, layout.event_description),
        );

        for column in Column::ALL {
            let raw = record.get(layout.numeric[column.index()]).unwrap_or_default();
            let value = std::str::from_utf8(raw).ok().and_then(parse_numeric);
            if value.is_none() && !raw.iter().all(u8::is_ascii_whitespace) {
                debug!(
                    "Row {}: non-numeric {} value {:?}",
                    rows.len() + 1,
                    column,
                    String::from_utf8_lossy(raw)
                );
                invalid[column.index()] += 1;
            }
            row = row.with_value(column, value);
        }

        rows.push(row);
    }

    for column in Column::ALL {
        let count = invalid[column.index()];
        if count > 0 {
            warn!("{} non-numeric value(s) ignored in {}", count, column);
        }
    }

    Ok(rows)
}

/// Read telemetry rows from a CSV file.
pub fn read_csv(path: &Path) -> Result<Vec<Row>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open telemetry CSV: {}", path.display()))?;

    let rows = read_rows(file)
        .with_context(|| format!("Failed to read telemetry CSV: {}", path.display()))?;

    info!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}
