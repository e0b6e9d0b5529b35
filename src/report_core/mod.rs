//! Report Core - output side of the traffic pipeline
//!
//! # Architecture
//!
//! ```text
//! mpsc<TrafficEvent> → run_report_sink → ReportWriter
//!                                          ├─ TextReportWriter (stdout / file)
//!                                          ├─ JsonlReportWriter
//!                                          └─ SqliteReportWriter
//! ```

pub mod jsonl_writer;
pub mod sqlite_writer;
pub mod summary;
pub mod text_writer;
pub mod writer;
pub mod writer_backend;

pub use jsonl_writer::JsonlReportWriter;
pub use sqlite_writer::SqliteReportWriter;
pub use summary::{SectionHits, SectionSummary, DEFAULT_TOP_SECTIONS};
pub use text_writer::TextReportWriter;
pub use writer::ReportWriter;
pub use writer_backend::{ReportWriterBackend, ReportWriterError};

use crate::pipeline::{InFlightEvents, TrafficEvent};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Counters for one sink run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub reports: u64,
    pub alarms: u64,
    pub failed: u64,
}

/// Write events until the queue closes
///
/// A failed write is logged and the event still counts as completed, so a
/// broken output cannot stall shutdown. Output is flushed whenever the queue
/// runs dry and once more at the end.
pub async fn run_report_sink(
    mut rx: mpsc::Receiver<TrafficEvent>,
    mut writer: ReportWriter,
    in_flight: Arc<InFlightEvents>,
) -> SinkStats {
    log::info!("📝 Report sink started ({} backend)", writer.backend_type());
    let mut stats = SinkStats::default();

    while let Some(event) = rx.recv().await {
        match &event {
            TrafficEvent::WindowReport { .. } => stats.reports += 1,
            TrafficEvent::AlarmTransition { .. } => stats.alarms += 1,
        }

        if let Err(e) = writer.write_event(&event).await {
            stats.failed += 1;
            log::error!("❌ Failed to write {}: {}", event.kind(), e);
        }

        if rx.is_empty() {
            if let Err(e) = writer.flush().await {
                log::error!("❌ Failed to flush {} output: {}", writer.backend_type(), e);
            }
        }

        in_flight.completed();
    }

    if let Err(e) = writer.flush().await {
        log::error!("❌ Final flush failed: {}", e);
    }

    log::info!(
        "✅ Report sink finished: {} reports, {} alarm transitions, {} failed",
        stats.reports,
        stats.alarms,
        stats.failed
    );
    stats
}
