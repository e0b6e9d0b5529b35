//! Writer backend trait for traffic reports
//!
//! Defines the interface for writing pipeline events to different backends.

use crate::pipeline::TrafficEvent;
use async_trait::async_trait;

#[derive(Debug)]
pub enum ReportWriterError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Database(String),
}

impl From<std::io::Error> for ReportWriterError {
    fn from(err: std::io::Error) -> Self {
        ReportWriterError::Io(err)
    }
}

impl From<serde_json::Error> for ReportWriterError {
    fn from(err: serde_json::Error) -> Self {
        ReportWriterError::Serialization(err)
    }
}

impl From<rusqlite::Error> for ReportWriterError {
    fn from(err: rusqlite::Error) -> Self {
        ReportWriterError::Database(err.to_string())
    }
}

impl std::fmt::Display for ReportWriterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportWriterError::Io(e) => write!(f, "IO error: {}", e),
            ReportWriterError::Serialization(e) => write!(f, "Serialization error: {}", e),
            ReportWriterError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for ReportWriterError {}

/// Backend trait for writing traffic events
#[async_trait]
pub trait ReportWriterBackend: Send {
    /// Write a single event
    async fn write_event(&mut self, event: &TrafficEvent) -> Result<(), ReportWriterError>;

    /// Flush pending writes to storage
    async fn flush(&mut self) -> Result<(), ReportWriterError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}
