//! Analysis modules.
//!
//! Aggregation of telemetry rows into the report summary.

pub mod aggregator;

pub use aggregator::*;
