//! Streaming windowed aggregation over web access logs
//!
//! Records flow from a file or tailed log through a circular per-second
//! window store, an interval scheduler with a late-arrival buffer and a
//! hysteresis traffic alarm, out to text, JSONL or SQLite reports.

pub mod aggregator_core;
pub mod config;
pub mod pipeline;
pub mod report_core;
