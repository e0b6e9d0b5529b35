//! Human-readable report output (stdout or a file)

use super::summary::{SectionSummary, DEFAULT_TOP_SECTIONS};
use super::writer_backend::{ReportWriterBackend, ReportWriterError};
use crate::pipeline::TrafficEvent;
use async_trait::async_trait;
use chrono::DateTime;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct TextReportWriter {
    out: BufWriter<Box<dyn Write + Send>>,
    top_n: usize,
}

impl TextReportWriter {
    pub fn stdout() -> Self {
        Self::from_writer(Box::new(std::io::stdout()))
    }

    /// Append to `path`, creating it if needed
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        log::info!("📝 Writing text reports to: {}", path.as_ref().display());
        Ok(Self::from_writer(Box::new(file)))
    }

    pub fn from_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: BufWriter::new(out),
            top_n: DEFAULT_TOP_SECTIONS,
        }
    }

    pub fn with_top_sections(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }
}

/// Render one event as text lines, newline-terminated
pub fn render_event(event: &TrafficEvent, top_n: usize) -> String {
    match event {
        TrafficEvent::AlarmTransition {
            triggered: true,
            rolling_hits,
            at_time,
        } => format!(
            "High traffic generated an alert - hits = {}, triggered at {}\n",
            rolling_hits,
            format_time(*at_time)
        ),
        TrafficEvent::AlarmTransition {
            triggered: false,
            rolling_hits,
            at_time,
        } => format!(
            "Recovered from high traffic alert - hits = {}, recovered at {}\n",
            rolling_hits,
            format_time(*at_time)
        ),
        TrafficEvent::WindowReport {
            range_end_time,
            slots,
        } => {
            let summary = SectionSummary::from_slots(slots, top_n);
            let begin = event.range_start_time().unwrap_or(*range_end_time);

            let mut output = format!(
                "Stats for time range {} - {}\n\ttotal hits for this window {}\n",
                format_time(begin),
                format_time(*range_end_time),
                summary.total_hits
            );
            for entry in &summary.top_sections {
                output.push_str(&format!("\t {} -> hits: {}\n", entry.section, entry.hits));
            }
            output
        }
    }
}

pub fn format_time(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

#[async_trait]
impl ReportWriterBackend for TextReportWriter {
    async fn write_event(&mut self, event: &TrafficEvent) -> Result<(), ReportWriterError> {
        self.out.write_all(render_event(event, self.top_n).as_bytes())?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ReportWriterError> {
        self.out.flush()?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "Text"
    }
}
