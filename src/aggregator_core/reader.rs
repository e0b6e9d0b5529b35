//! Record sources: one-shot file reader and tailing reader with rotation detection
//!
//! Both parse lines into `LogRecord`s and push them onto the record queue.
//! Dropping the sender when done is what tells the pipeline input has ended.

use super::normalizer::LogRecord;
use std::future::Future;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::sleep;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

/// Line counters for one source run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub lines: u64,
    pub records: u64,
    pub skipped: u64,
}

impl SourceStats {
    /// Parse and forward one line; false once the pipeline has hung up
    async fn forward(&mut self, line: &str, tx: &mpsc::Sender<LogRecord>) -> bool {
        self.lines += 1;
        match LogRecord::from_line(line) {
            Ok(Some(record)) => {
                if tx.send(record).await.is_err() {
                    log::warn!("⚠️  Record queue closed, stopping source");
                    return false;
                }
                self.records += 1;
            }
            Ok(None) => {}
            Err(e) => {
                self.skipped += 1;
                log::warn!("Skipping line {}: {} ({})", self.lines, e, line);
            }
        }
        true
    }
}

/// Read a finite log file from the start and close the queue at EOF
pub async fn read_file_records(
    path: PathBuf,
    tx: mpsc::Sender<LogRecord>,
) -> std::io::Result<SourceStats> {
    let file = File::open(&path).await?;
    let mut lines = BufReader::new(file).lines();
    let mut stats = SourceStats::default();

    log::info!("📖 Reading access log: {}", path.display());

    while let Some(line) = lines.next_line().await? {
        if !stats.forward(&line, &tx).await {
            break;
        }
    }

    log::info!(
        "✅ Finished {}: {} records, {} skipped",
        path.display(),
        stats.records,
        stats.skipped
    );
    Ok(stats)
}

/// Tail a growing log file until `shutdown` resolves
///
/// Stopping closes the record queue; the pipeline then drains and performs
/// its final flush instead of being aborted mid-stream.
pub async fn follow_file_records<F>(
    path: PathBuf,
    tx: mpsc::Sender<LogRecord>,
    shutdown: F,
) -> std::io::Result<SourceStats>
where
    F: Future<Output = ()>,
{
    let mut reader = TailReader::new(path);
    reader.start().await?;
    let mut stats = SourceStats::default();

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("🛑 Shutdown requested, closing record queue");
                break;
            }
            line = reader.read_line() => {
                if let Some(line) = line? {
                    if !stats.forward(&line, &tx).await {
                        break;
                    }
                }
            }
        }
    }

    Ok(stats)
}

pub struct TailReader {
    path: PathBuf,
    file: Option<BufReader<File>>,
    inode: Option<u64>,
    poll_interval: Duration,
    /// Bytes of a line whose newline has not been written yet
    partial: String,
}

impl TailReader {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: None,
            inode: None,
            poll_interval: Duration::from_millis(100),
            partial: String::new(),
        }
    }

    /// Start tailing the file (seeks to end)
    pub async fn start(&mut self) -> std::io::Result<()> {
        let file = File::open(&self.path).await?;
        let metadata = file.metadata().await?;

        #[cfg(unix)]
        {
            self.inode = Some(metadata.ino());
        }
        #[cfg(not(unix))]
        {
            let _ = metadata;
        }

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::End(0)).await?;
        self.file = Some(reader);

        log::info!("📖 Started tailing: {}", self.path.display());
        Ok(())
    }

    /// Reopen from the beginning after rotation, so no new lines are missed
    async fn reopen(&mut self) -> std::io::Result<()> {
        let file = File::open(&self.path).await?;

        #[cfg(unix)]
        {
            self.inode = Some(file.metadata().await?.ino());
        }

        if !self.partial.is_empty() {
            log::warn!("⚠️  Discarding unterminated line from rotated file: {}", self.partial.trim());
            self.partial.clear();
        }
        self.file = Some(BufReader::new(file));
        Ok(())
    }

    /// Read the next complete line, waiting if necessary
    ///
    /// A line is only returned once its newline has been written. Partial
    /// data is kept across calls, so dropping this future mid-read loses
    /// nothing.
    pub async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            if self.detect_rotation().await? {
                log::info!("🔄 File rotation detected, reopening: {}", self.path.display());
                self.reopen().await?;
            }

            if let Some(reader) = self.file.as_mut() {
                match reader.read_line(&mut self.partial).await? {
                    0 => {
                        // No new data, sleep and retry
                        sleep(self.poll_interval).await;
                        continue;
                    }
                    _ => {
                        // Writer is mid-line; wait for the rest
                        if !self.partial.ends_with('\n') {
                            continue;
                        }
                        let line = std::mem::take(&mut self.partial);
                        if !line.trim().is_empty() {
                            return Ok(Some(line.trim().to_string()));
                        }
                        continue;
                    }
                }
            } else {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "File not opened",
                ));
            }
        }
    }

    /// Detect if the file has been rotated (inode changed)
    async fn detect_rotation(&mut self) -> std::io::Result<bool> {
        #[cfg(unix)]
        {
            let metadata = match tokio::fs::metadata(&self.path).await {
                Ok(m) => m,
                // Mid-rotation: old file moved away, new one not created yet
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(e),
            };
            let current_inode = metadata.ino();
            Ok(self.inode.map_or(false, |old| old != current_inode))
        }

        #[cfg(not(unix))]
        {
            // On non-Unix systems, check file size decrease as heuristic
            if let Some(ref mut file) = self.file {
                let current_pos = file.stream_position().await?;
                let metadata = tokio::fs::metadata(&self.path).await?;
                Ok(metadata.len() < current_pos)
            } else {
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    const HEADER: &str = "\"remotehost\",\"rfc931\",\"authuser\",\"date\",\"request\",\"status\",\"bytes\"\n";

    #[tokio::test]
    async fn test_read_file_records_skips_bad_lines() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("access.csv");

        let content = format!(
            "{}{}{}{}",
            HEADER,
            "\"10.0.0.2\",\"-\",\"apache\",1549573860,\"GET /api/user HTTP/1.0\",200,1234\n",
            "not,a,log,line\n",
            "\"10.0.0.4\",\"-\",\"apache\",1549573861,\"GET /report HTTP/1.0\",200,1136\n",
        );
        tokio::fs::write(&file_path, content).await.unwrap();

        let (tx, mut rx) = mpsc::channel(10);
        let stats = read_file_records(file_path, tx).await.unwrap();

        assert_eq!(stats.lines, 4);
        assert_eq!(stats.records, 2);
        assert_eq!(stats.skipped, 1);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.section, "/api");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.timestamp, 1549573861);

        // Sender dropped by the source: queue reports end of input
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_tail_reader_basic() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("test.csv");

        let mut file = tokio::fs::File::create(&file_path).await.unwrap();
        file.write_all(b"line1\nline2\n").await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        // Create reader and start (should seek to end)
        let mut reader = TailReader::new(file_path.clone());
        reader.start().await.unwrap();

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&file_path)
            .await
            .unwrap();
        file.write_all(b"line3\n").await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        // Should only read the new line (line3)
        let line = tokio::time::timeout(Duration::from_secs(2), reader.read_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(line, "line3");
    }

    #[tokio::test]
    async fn test_tail_reader_waits_for_line_end() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("split.csv");
        tokio::fs::write(&file_path, b"").await.unwrap();

        let mut reader = TailReader::new(file_path.clone());
        reader.start().await.unwrap();

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&file_path)
            .await
            .unwrap();
        file.write_all(b"\"10.0.0.1\",\"-\",\"apache\",15495").await.unwrap();
        file.flush().await.unwrap();

        // Half a line is not a line
        let pending = tokio::time::timeout(Duration::from_millis(300), reader.read_line()).await;
        assert!(pending.is_err());

        file.write_all(b"73862,\"GET /api/help HTTP/1.0\",200,1234\n").await.unwrap();
        file.flush().await.unwrap();

        let line = tokio::time::timeout(Duration::from_secs(2), reader.read_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(
            line,
            "\"10.0.0.1\",\"-\",\"apache\",1549573862,\"GET /api/help HTTP/1.0\",200,1234"
        );
        let record = LogRecord::from_line(&line).unwrap().unwrap();
        assert_eq!(record.timestamp, 1549573862);
    }

    #[tokio::test]
    async fn test_follow_stops_on_shutdown() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("live.csv");
        tokio::fs::write(&file_path, HEADER).await.unwrap();

        let (tx, mut rx) = mpsc::channel(10);
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let source = tokio::spawn(follow_file_records(file_path.clone(), tx, async move {
            let _ = stop_rx.await;
        }));

        // Give the reader time to seek to the end before appending
        sleep(Duration::from_millis(200)).await;
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&file_path)
            .await
            .unwrap();
        file.write_all(b"\"10.0.0.1\",\"-\",\"apache\",1549573862,\"GET /api/help HTTP/1.0\",200,1234\n")
            .await
            .unwrap();
        file.flush().await.unwrap();

        let record = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.section, "/api");

        stop_tx.send(()).unwrap();
        let stats = source.await.unwrap().unwrap();
        assert_eq!(stats.records, 1);
        assert!(rx.recv().await.is_none());
    }
}
