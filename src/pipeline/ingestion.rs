//! Pipeline ingestion - async loop driving the aggregation pipeline
//!
//! Records arrive on a bounded queue from the source task. Every event the
//! pipeline produces is counted in `InFlightEvents` before it is queued, and
//! the report sink marks it completed once written. The runtime waits for the
//! counter to drain before closing the event queue, so no report is lost on
//! shutdown.

use super::engine::{AggregationPipeline, PipelineStats};
use super::events::TrafficEvent;
use crate::aggregator_core::LogRecord;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::time::{Duration, Instant};

/// Count of events emitted but not yet handled by the sink
#[derive(Debug, Default)]
pub struct InFlightEvents {
    pending: AtomicUsize,
    idle: Notify,
}

impl InFlightEvents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn emitted(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    pub fn completed(&self) {
        let previous = self.pending.fetch_sub(1, Ordering::SeqCst);
        if previous <= 1 {
            self.idle.notify_waiters();
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Resolve once every emitted event has been completed
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before checking, so a completion in between still wakes us
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Event queue sender paired with its in-flight counter
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<TrafficEvent>,
    in_flight: Arc<InFlightEvents>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<TrafficEvent>, in_flight: Arc<InFlightEvents>) -> Self {
        Self { tx, in_flight }
    }

    pub fn in_flight(&self) -> &Arc<InFlightEvents> {
        &self.in_flight
    }

    /// Queue one event; false if the sink has gone away
    pub async fn send(&self, event: TrafficEvent) -> bool {
        self.in_flight.emitted();
        if self.tx.send(event).await.is_err() {
            self.in_flight.completed();
            log::error!("❌ Report queue closed, dropping event");
            return false;
        }
        true
    }
}

/// Consume records until the source closes the queue, then flush
///
/// Runs on a single task, so records are aggregated in arrival order and
/// events leave in the order the pipeline produced them.
pub async fn run_pipeline(
    mut pipeline: AggregationPipeline,
    mut rx: mpsc::Receiver<LogRecord>,
    events: EventSender,
) -> PipelineStats {
    log::info!("🚀 Starting aggregation pipeline");
    log::info!("   ├─ Window retention: {}s", pipeline.store().window_secs());
    log::info!("   ├─ Report interval: {}s", pipeline.scheduler().interval_secs());
    log::info!("   └─ Late buffer: {}s", pipeline.scheduler().late_buffer_secs());

    let mut out = Vec::new();
    let mut record_count = 0u64;
    let mut last_log_time = Instant::now();

    while let Some(record) = rx.recv().await {
        pipeline.process(&record, &mut out);
        for event in out.drain(..) {
            if let TrafficEvent::AlarmTransition { triggered, rolling_hits, at_time } = &event {
                log::info!(
                    "🚨 Alarm {} at {} ({} hits over {}s)",
                    if *triggered { "triggered" } else { "recovered" },
                    at_time,
                    rolling_hits,
                    pipeline.store().alarm().horizon_secs()
                );
            }
            events.send(event).await;
        }

        record_count += 1;

        // Log throughput every 10 seconds
        if last_log_time.elapsed() >= Duration::from_secs(10) {
            let records_per_sec = record_count as f64 / last_log_time.elapsed().as_secs_f64();
            log::info!(
                "📊 Ingestion rate: {:.1} records/sec (total: {}, queued: {})",
                records_per_sec,
                pipeline.stats().records,
                rx.len()
            );
            last_log_time = Instant::now();
            record_count = 0;
        }
    }

    log::info!("📭 Record queue closed, flushing final interval");
    if let Some(event) = pipeline.finish() {
        events.send(event).await;
    }

    let stats = pipeline.stats();
    log::info!(
        "✅ Pipeline finished: {} records, {} reports, {} alarm transitions",
        stats.records,
        stats.reports,
        stats.alarm_transitions
    );
    stats
}
