//! Integration tests: access log file → pipeline → report sink
//!
//! Wires the same tasks as the traffic_monitor binary over temporary files
//! and checks the reports that come out the other end.

#[cfg(test)]
mod pipeline_integration_tests {
    use rusqlite::Connection;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use tokio::sync::mpsc;
    use trafficwatch::aggregator_core::read_file_records;
    use trafficwatch::config::{ReportBackend, TrafficConfig};
    use trafficwatch::pipeline::{
        run_pipeline, AggregationPipeline, EventSender, InFlightEvents, PipelineStats,
    };
    use trafficwatch::report_core::{run_report_sink, ReportWriter, SinkStats};

    const HEADER: &str = "\"remotehost\",\"rfc931\",\"authuser\",\"date\",\"request\",\"status\",\"bytes\"";

    fn log_line(timestamp: u64, path: &str) -> String {
        format!(
            "\"10.0.0.2\",\"-\",\"apache\",{},\"GET {} HTTP/1.0\",200,1234",
            timestamp, path
        )
    }

    /// One /api hit per second over 1000..=1025, plus a burst of 20 /report
    /// hits at 1005 that trips a 20-hit alarm until it ages out at 1015
    fn write_access_log(dir: &Path) -> PathBuf {
        let path = dir.join("access.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        for t in 1000..=1025 {
            writeln!(file, "{}", log_line(t, "/api/user")).unwrap();
            if t == 1005 {
                for _ in 0..20 {
                    writeln!(file, "{}", log_line(t, "/report")).unwrap();
                }
            }
        }
        writeln!(file, "garbage line").unwrap();
        path
    }

    fn config(input: PathBuf, backend: ReportBackend, output: PathBuf) -> TrafficConfig {
        TrafficConfig {
            input_path: input,
            output_path: Some(output),
            backend,
            interval_secs: 10,
            window_retention_secs: 120,
            alarm_threshold: 2,
            alarm_horizon_secs: 10,
            late_buffer_secs: 0,
            channel_buffer: 4,
            follow: false,
        }
    }

    async fn run_monitor(config: &TrafficConfig) -> (PipelineStats, SinkStats) {
        config.validate().unwrap();
        let pipeline = AggregationPipeline::from_config(config).unwrap();
        let writer = ReportWriter::new(config.backend, config.output_path.as_deref()).unwrap();

        let (record_tx, record_rx) = mpsc::channel(config.channel_buffer);
        let (event_tx, event_rx) = mpsc::channel(config.channel_buffer);
        let in_flight = InFlightEvents::new();

        let sink = tokio::spawn(run_report_sink(event_rx, writer, in_flight.clone()));
        let source = tokio::spawn(read_file_records(config.input_path.clone(), record_tx));

        let events = EventSender::new(event_tx, in_flight.clone());
        let pipeline_stats = run_pipeline(pipeline, record_rx, events.clone()).await;

        in_flight.wait_idle().await;
        drop(events);
        let sink_stats = sink.await.unwrap();

        let source_stats = source.await.unwrap().unwrap();
        assert_eq!(source_stats.skipped, 1);

        (pipeline_stats, sink_stats)
    }

    #[tokio::test]
    async fn test_csv_to_jsonl_reports() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_access_log(dir.path());
        let output = dir.path().join("reports.jsonl");

        let (pipeline_stats, sink_stats) =
            run_monitor(&config(input, ReportBackend::Jsonl, output.clone())).await;

        assert_eq!(pipeline_stats.records, 46);
        assert_eq!(sink_stats, SinkStats { reports: 3, alarms: 2, failed: 0 });

        let content = std::fs::read_to_string(&output).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let kinds: Vec<&str> = lines.iter().map(|l| l["type"].as_str().unwrap()).collect();
        assert_eq!(
            kinds,
            vec![
                "alarm_transition",
                "window_report",
                "alarm_transition",
                "window_report",
                "window_report"
            ]
        );

        assert_eq!(lines[0]["triggered"], true);
        assert_eq!(lines[0]["at_time"], 1005);
        assert_eq!(lines[0]["rolling_hits"], 21);

        assert_eq!(lines[1]["range_start_time"], 1000);
        assert_eq!(lines[1]["range_end_time"], 1009);
        assert_eq!(lines[1]["summary"]["total_hits"], 30);
        assert_eq!(lines[1]["summary"]["top_sections"][0]["section"], "/report");

        assert_eq!(lines[2]["triggered"], false);
        assert_eq!(lines[2]["at_time"], 1015);

        assert_eq!(lines[3]["range_end_time"], 1019);
        assert_eq!(lines[3]["summary"]["total_hits"], 10);

        // Final flush: the six seconds after the last periodic report
        assert_eq!(lines[4]["range_start_time"], 1020);
        assert_eq!(lines[4]["range_end_time"], 1025);
        assert_eq!(lines[4]["summary"]["total_hits"], 6);
    }

    #[tokio::test]
    async fn test_csv_to_sqlite_reports() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_access_log(dir.path());
        let db_path = dir.path().join("data").join("traffic.db");

        run_monitor(&config(input, ReportBackend::Sqlite, db_path.clone())).await;

        let conn = Connection::open(&db_path).unwrap();
        let reported: i64 = conn
            .query_row("SELECT SUM(total_hits) FROM window_reports", [], |row| row.get(0))
            .unwrap();
        assert_eq!(reported, 46);

        let transitions: Vec<(bool, i64)> = conn
            .prepare("SELECT triggered, at_time FROM alarm_transitions ORDER BY id")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(transitions, vec![(true, 1005), (false, 1015)]);
    }

    #[tokio::test]
    async fn test_independent_pipelines_in_parallel() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_access_log(dir.path());

        let runs = (0..4).map(|i| {
            let cfg = config(
                input.clone(),
                ReportBackend::Jsonl,
                dir.path().join(format!("reports_{}.jsonl", i)),
            );
            tokio::spawn(async move { run_monitor(&cfg).await })
        });

        for run in runs.collect::<Vec<_>>() {
            let (pipeline_stats, sink_stats) = run.await.unwrap();
            assert_eq!(pipeline_stats.records, 46);
            assert_eq!(sink_stats.reports, 3);
            assert_eq!(sink_stats.alarms, 2);
        }
    }
}
