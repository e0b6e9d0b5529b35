//! Unified writer interface for traffic reports
//!
//! Routes writes to the text, JSONL or SQLite backend based on configuration.

use super::jsonl_writer::JsonlReportWriter;
use super::sqlite_writer::SqliteReportWriter;
use super::text_writer::TextReportWriter;
use super::writer_backend::{ReportWriterBackend, ReportWriterError};
use crate::config::ReportBackend;
use crate::pipeline::TrafficEvent;
use std::path::Path;

pub enum ReportWriter {
    Text(TextReportWriter),
    Jsonl(JsonlReportWriter),
    Sqlite(SqliteReportWriter),
}

impl ReportWriter {
    /// Create a writer for `backend`; text and JSONL default to stdout
    pub fn new(backend: ReportBackend, output: Option<&Path>) -> Result<Self, ReportWriterError> {
        match (backend, output) {
            (ReportBackend::Text, Some(path)) => Ok(ReportWriter::Text(TextReportWriter::open(path)?)),
            (ReportBackend::Text, None) => Ok(ReportWriter::Text(TextReportWriter::stdout())),
            (ReportBackend::Jsonl, Some(path)) => {
                Ok(ReportWriter::Jsonl(JsonlReportWriter::open(path)?))
            }
            (ReportBackend::Jsonl, None) => Ok(ReportWriter::Jsonl(JsonlReportWriter::stdout())),
            (ReportBackend::Sqlite, Some(path)) => {
                Ok(ReportWriter::Sqlite(SqliteReportWriter::new(path)?))
            }
            (ReportBackend::Sqlite, None) => Err(ReportWriterError::Database(
                "sqlite backend requires an output path".to_string(),
            )),
        }
    }

    fn backend(&mut self) -> &mut dyn ReportWriterBackend {
        match self {
            ReportWriter::Text(w) => w,
            ReportWriter::Jsonl(w) => w,
            ReportWriter::Sqlite(w) => w,
        }
    }

    /// Write one event to the configured backend
    pub async fn write_event(&mut self, event: &TrafficEvent) -> Result<(), ReportWriterError> {
        self.backend().write_event(event).await
    }

    /// Flush pending writes to storage
    pub async fn flush(&mut self) -> Result<(), ReportWriterError> {
        self.backend().flush().await
    }

    /// Get backend type for logging
    pub fn backend_type(&self) -> &'static str {
        match self {
            ReportWriter::Text(w) => w.backend_type(),
            ReportWriter::Jsonl(w) => w.backend_type(),
            ReportWriter::Sqlite(w) => w.backend_type(),
        }
    }
}
