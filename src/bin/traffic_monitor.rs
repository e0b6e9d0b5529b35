//! Traffic Monitor Binary - access log → windowed stats → reports
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin traffic_monitor -- --input access.csv
//! cargo run --release --bin traffic_monitor -- --input /var/log/access.csv --follow
//! cargo run --release --bin traffic_monitor -- --backend sqlite --output data/traffic.db
//! ```
//!
//! ## Environment Variables
//!
//! - TRAFFIC_INPUT_PATH - Access log to read (default: input_files/sample_csv.txt)
//! - TRAFFIC_OUTPUT_PATH - Report destination (default: stdout; required for sqlite)
//! - REPORT_BACKEND - text | jsonl | sqlite (default: text)
//! - REPORT_INTERVAL_SECS - Seconds per report (default: 10)
//! - WINDOW_RETENTION_SECS - Seconds of per-second slots kept (default: 120)
//! - ALARM_THRESHOLD - Average hits/sec that raises the alarm (default: 10)
//! - ALARM_HORIZON_SECS - Seconds the alarm average is taken over (default: 120)
//! - LATE_BUFFER_SECS - Grace period for out-of-order records (default: 5)
//! - RECORD_CHANNEL_BUFFER - Record queue capacity (default: 100)
//! - FOLLOW_INPUT - Tail the input until Ctrl-C (default: false)
//! - RUST_LOG - Logging level (optional, default: info)
//!
//! Every variable has a matching `--flag value` that takes precedence.

use std::error::Error;
use tokio::sync::mpsc;
use trafficwatch::aggregator_core::{follow_file_records, read_file_records};
use trafficwatch::config::TrafficConfig;
use trafficwatch::pipeline::{run_pipeline, AggregationPipeline, EventSender, InFlightEvents};
use trafficwatch::report_core::{run_report_sink, ReportWriter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let config = TrafficConfig::load()?;
    config.validate()?;

    log::info!("🚀 Starting Traffic Monitor");
    log::info!("   Input: {}", config.input_path().display());
    match &config.output_path {
        Some(path) => log::info!("   Output: {}", path.display()),
        None => log::info!("   Output: stdout"),
    }
    log::info!("   Report interval: {}s", config.interval_secs);
    log::info!("   Window retention: {}s", config.window_retention_secs);
    log::info!(
        "   Alarm: > {} hits/s over {}s",
        config.alarm_threshold,
        config.alarm_horizon_secs
    );
    log::info!("   Late buffer: {}s", config.late_buffer_secs);
    log::info!("   Follow: {}", config.follow);

    let pipeline = AggregationPipeline::from_config(&config)?;
    let writer = ReportWriter::new(config.backend, config.output_path.as_deref())?;
    log::info!("📊 Backend: {}", writer.backend_type());

    let (record_tx, record_rx) = mpsc::channel(config.channel_buffer);
    let (event_tx, event_rx) = mpsc::channel(config.channel_buffer);
    let in_flight = InFlightEvents::new();

    let sink = tokio::spawn(run_report_sink(event_rx, writer, in_flight.clone()));

    let input = config.input_path().to_path_buf();
    let source = if config.follow {
        tokio::spawn(follow_file_records(input, record_tx, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("❌ Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }))
    } else {
        tokio::spawn(read_file_records(input, record_tx))
    };

    let events = EventSender::new(event_tx, in_flight.clone());
    let pipeline_stats = run_pipeline(pipeline, record_rx, events.clone()).await;

    // Every emitted event must be written before the event queue is closed
    in_flight.wait_idle().await;
    drop(events);
    let sink_stats = sink.await?;

    let source_stats = match source.await? {
        Ok(stats) => stats,
        Err(e) => {
            log::error!("❌ Record source failed: {}", e);
            return Err(e.into());
        }
    };

    log::info!("✅ Traffic Monitor finished");
    log::info!(
        "   Lines read: {} ({} skipped)",
        source_stats.lines,
        source_stats.skipped
    );
    log::info!("   Records processed: {}", pipeline_stats.records);
    log::info!("   Reports written: {}", sink_stats.reports);
    log::info!("   Alarm transitions: {}", sink_stats.alarms);
    if sink_stats.failed > 0 {
        log::warn!("⚠️  {} events failed to write", sink_stats.failed);
    }

    Ok(())
}
