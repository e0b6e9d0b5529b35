//! Pipeline Engine - per-record orchestration of window store and scheduler
//!
//! ## Architecture
//!
//! ```text
//! LogRecord
//!     ↓
//! AggregationPipeline::process()
//!     ├─ IntervalScheduler::ready_to_process() → WindowReport
//!     └─ WindowStore::add_entry() → AlarmTransition (on flip)
//!     ↓
//! Vec<TrafficEvent> (report first, then alarm)
//! ```
//!
//! The engine is synchronous and owns all aggregation state. The async
//! ingestion loop in `ingestion` drives it and forwards its events.

use super::events::TrafficEvent;
use super::scheduler::IntervalScheduler;
use crate::aggregator_core::{LogRecord, WindowStore};
use crate::config::{ConfigError, TrafficConfig};

/// Counters exposed for logging and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub records: u64,
    pub reports: u64,
    pub alarm_transitions: u64,
}

/// Single-consumer aggregation state: one window store, one schedule
pub struct AggregationPipeline {
    store: WindowStore,
    scheduler: IntervalScheduler,
    stats: PipelineStats,
}

impl AggregationPipeline {
    /// Pair a store with a schedule validated against the same window length
    pub fn new(store: WindowStore, scheduler: IntervalScheduler) -> Result<Self, ConfigError> {
        if scheduler.window_retention_secs() != store.window_secs() {
            return Err(ConfigError::InvalidValue(format!(
                "scheduler validated against a {}s window but the store retains {}s",
                scheduler.window_retention_secs(),
                store.window_secs()
            )));
        }

        Ok(Self {
            store,
            scheduler,
            stats: PipelineStats::default(),
        })
    }

    pub fn from_config(config: &TrafficConfig) -> Result<Self, ConfigError> {
        let store = WindowStore::new(
            config.window_retention_secs,
            config.alarm_threshold,
            config.alarm_horizon_secs,
        )?;
        let scheduler = IntervalScheduler::new(
            config.interval_secs,
            config.late_buffer_secs,
            config.window_retention_secs,
        )?;
        Self::new(store, scheduler)
    }

    pub fn store(&self) -> &WindowStore {
        &self.store
    }

    pub fn scheduler(&self) -> &IntervalScheduler {
        &self.scheduler
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Process one record, appending any events it produced to `out`
    ///
    /// A settled interval is reported before the record is added, so the
    /// report never includes the record that triggered it and always precedes
    /// that record's alarm transition.
    pub fn process(&mut self, record: &LogRecord, out: &mut Vec<TrafficEvent>) {
        self.stats.records += 1;

        if self.scheduler.ready_to_process(record.timestamp) {
            if let Some((end, span)) = self.scheduler.pending_range() {
                out.push(self.report(end, span.min(self.max_periodic_span())));
            }
            self.scheduler.mark_processed();
        }

        if let Some(triggered) = self.store.add_entry(&record.section, record.timestamp) {
            self.stats.alarm_transitions += 1;
            log::debug!(
                "Alarm {} at {} ({} hits)",
                if triggered { "triggered" } else { "recovered" },
                self.store.latest_time(),
                self.store.rolling_hits()
            );
            out.push(TrafficEvent::AlarmTransition {
                triggered,
                rolling_hits: self.store.rolling_hits(),
                at_time: self.store.latest_time(),
            });
        }
    }

    /// Final flush once input is exhausted
    ///
    /// Reports whatever followed the last processed second, capped to one
    /// interval of data.
    pub fn finish(&mut self) -> Option<TrafficEvent> {
        let last = self.scheduler.last_processed_time()?;
        let latest = self.store.latest_time();
        if last >= latest {
            return None;
        }

        let span = (latest - last).min(self.scheduler.interval_secs());
        Some(self.report(latest, span))
    }

    // Keeps the start of a report inside the retained window even when the
    // newest record is a full late buffer ahead of the reported range
    fn max_periodic_span(&self) -> u64 {
        self.store
            .window_secs()
            .saturating_sub(self.scheduler.late_buffer_secs())
    }

    fn report(&mut self, end: u64, span: u64) -> TrafficEvent {
        self.stats.reports += 1;
        log::debug!("Window report ending at {} ({}s)", end, span);
        TrafficEvent::WindowReport {
            range_end_time: end,
            slots: self.store.range_query(end, span),
        }
    }
}
