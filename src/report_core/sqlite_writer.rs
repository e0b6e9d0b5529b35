//! SQLite writer for traffic events
//!
//! Window reports and alarm transitions go to separate tables; per-slot
//! section counts are kept as a JSON column so a report row is self-contained.

use super::summary::{SectionSummary, DEFAULT_TOP_SECTIONS};
use super::writer_backend::{ReportWriterBackend, ReportWriterError};
use crate::pipeline::TrafficEvent;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::time::Instant;

pub struct SqliteReportWriter {
    conn: Connection,
    batch: Vec<TrafficEvent>,
    batch_size: usize,
    last_flush: Instant,
    flush_interval_secs: u64,
}

impl SqliteReportWriter {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, ReportWriterError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path.as_ref())?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS window_reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                range_start_time INTEGER NOT NULL,
                range_end_time INTEGER NOT NULL,
                total_hits INTEGER NOT NULL,
                top_sections TEXT NOT NULL,
                slots TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS alarm_transitions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                triggered INTEGER NOT NULL,
                rolling_hits INTEGER NOT NULL,
                at_time INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_window_reports_end ON window_reports(range_end_time DESC)",
            [],
        )?;

        log::info!(
            "✅ SQLite report database initialized: {}",
            db_path.as_ref().display()
        );

        Ok(Self {
            conn,
            batch: Vec::with_capacity(32),
            batch_size: 32,
            last_flush: Instant::now(),
            flush_interval_secs: 2,
        })
    }

    fn flush_batch(&mut self) -> Result<(), ReportWriterError> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let tx = self.conn.transaction()?;

        for event in &self.batch {
            match event {
                TrafficEvent::WindowReport {
                    range_end_time,
                    slots,
                } => {
                    let summary = SectionSummary::from_slots(slots, DEFAULT_TOP_SECTIONS);
                    tx.execute(
                        "INSERT INTO window_reports
                         (range_start_time, range_end_time, total_hits, top_sections, slots)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            event.range_start_time().unwrap_or(*range_end_time) as i64,
                            *range_end_time as i64,
                            summary.total_hits as i64,
                            serde_json::to_string(&summary.top_sections)?,
                            serde_json::to_string(slots)?,
                        ],
                    )?;
                }
                TrafficEvent::AlarmTransition {
                    triggered,
                    rolling_hits,
                    at_time,
                } => {
                    tx.execute(
                        "INSERT INTO alarm_transitions (triggered, rolling_hits, at_time)
                         VALUES (?1, ?2, ?3)",
                        params![triggered, *rolling_hits as i64, *at_time as i64],
                    )?;
                }
            }
        }

        tx.commit()?;

        log::debug!("✅ Flushed {} events to SQLite", self.batch.len());
        self.batch.clear();
        self.last_flush = Instant::now();

        Ok(())
    }
}

#[async_trait]
impl ReportWriterBackend for SqliteReportWriter {
    async fn write_event(&mut self, event: &TrafficEvent) -> Result<(), ReportWriterError> {
        self.batch.push(event.clone());

        // Auto-flush if batch full or time elapsed
        if self.batch.len() >= self.batch_size
            || self.last_flush.elapsed().as_secs() >= self.flush_interval_secs
        {
            self.flush_batch()?;
        }

        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ReportWriterError> {
        self.flush_batch()
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
