//! JSONL writer for traffic events - one JSON object per line

use super::summary::{SectionSummary, DEFAULT_TOP_SECTIONS};
use super::writer_backend::{ReportWriterBackend, ReportWriterError};
use crate::pipeline::TrafficEvent;
use async_trait::async_trait;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};

/// Serialized line: the event itself plus a ranked summary for window reports
#[derive(Debug, Serialize)]
pub struct JsonlReportLine<'a> {
    #[serde(flatten)]
    pub event: &'a TrafficEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range_start_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SectionSummary>,
}

impl<'a> JsonlReportLine<'a> {
    pub fn new(event: &'a TrafficEvent) -> Self {
        let summary = match event {
            TrafficEvent::WindowReport { slots, .. } => {
                Some(SectionSummary::from_slots(slots, DEFAULT_TOP_SECTIONS))
            }
            TrafficEvent::AlarmTransition { .. } => None,
        };
        Self {
            event,
            range_start_time: event.range_start_time(),
            summary,
        }
    }
}

pub struct JsonlReportWriter {
    writer: BufWriter<Box<dyn Write + Send>>,
    last_flush: Instant,
}

impl JsonlReportWriter {
    pub fn stdout() -> Self {
        Self::from_writer(Box::new(std::io::stdout()))
    }

    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;

        log::info!("📝 Writing JSONL reports to: {}", path.as_ref().display());
        Ok(Self::from_writer(Box::new(file)))
    }

    pub fn from_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            writer: BufWriter::new(out),
            last_flush: Instant::now(),
        }
    }
}

impl Drop for JsonlReportWriter {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

#[async_trait]
impl ReportWriterBackend for JsonlReportWriter {
    async fn write_event(&mut self, event: &TrafficEvent) -> Result<(), ReportWriterError> {
        let json = serde_json::to_string(&JsonlReportLine::new(event))?;
        writeln!(self.writer, "{}", json)?;

        // Flush every 5 seconds
        if self.last_flush.elapsed() > Duration::from_secs(5) {
            self.writer.flush()?;
            self.last_flush = Instant::now();
        }

        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ReportWriterError> {
        self.writer.flush()?;
        self.last_flush = Instant::now();
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "JSONL"
    }
}
