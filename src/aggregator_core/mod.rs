//! Aggregator Core - per-second traffic window and record intake
//!
//! # Architecture
//!
//! ```text
//! access log → TailReader / read_file_records → LogRecord
//!     ↓
//! WindowStore (circular per-second slots, section counts)
//!     ↓
//! TrafficAlarm (rolling hits over the alarm horizon)
//! ```

pub mod alarm;
pub mod normalizer;
pub mod reader;
pub mod window;

pub use alarm::TrafficAlarm;
pub use normalizer::{AccessLogEntry, LogRecord, ParseError};
pub use reader::{follow_file_records, read_file_records, SourceStats, TailReader};
pub use window::{TimeSlot, WindowStore};
