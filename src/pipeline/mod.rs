//! # Aggregation Pipeline
//!
//! Turns a stream of parsed access-log records into reporting events:
//! periodic window reports over settled intervals, and alarm transitions
//! whenever the rolling hit count crosses the configured limit.
//!
//! ## Architecture
//!
//! ```text
//! record source ──(bounded mpsc<LogRecord>)──→ run_pipeline
//!                                                  │
//!                                      AggregationPipeline
//!                                      ├─ WindowStore + TrafficAlarm
//!                                      └─ IntervalScheduler
//!                                                  │
//!                       (bounded mpsc<TrafficEvent>, InFlightEvents)
//!                                                  ↓
//!                                          run_report_sink
//! ```
//!
//! Closing the record queue triggers a final flush of the unreported tail.
//! The runtime then waits for `InFlightEvents` to drain before closing the
//! event queue.
//!
//! ## Module Organization
//!
//! - `engine`: synchronous per-record aggregation (`AggregationPipeline`)
//! - `events`: `TrafficEvent` definitions
//! - `ingestion`: async driver loop and completion counter
//! - `scheduler`: interval readiness with a late-arrival buffer

pub mod engine;
pub mod events;
pub mod ingestion;
pub mod scheduler;

pub use engine::{AggregationPipeline, PipelineStats};
pub use events::TrafficEvent;
pub use ingestion::{run_pipeline, EventSender, InFlightEvents};
pub use scheduler::{IntervalScheduler, ScheduleStatus};
