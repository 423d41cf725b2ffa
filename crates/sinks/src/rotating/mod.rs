//! Rotating Sink - hourly bucketed, compressed record files
//!
//! Writes each record as one line to `<path>/<YYYY.MM.DD_HH>.gz`, where the
//! bucket is taken from the local wall clock at the moment the sink
//! processes the record. At most one file is open at a time.
//!
//! # Rotation
//!
//! ```text
//! write(r) → bucket_for(now) ─┬─ same bucket ──────────────→ append line
//!                             └─ new bucket / nothing open → close old (summary)
//!                                                            open new (append mode)
//!                                                            append line
//! ```
//!
//! Closing a file prints a summary line of the form
//! `#records=1234 in 2024.01.01_09.gz` to the console (stdout) and logs the
//! same counts.
//!
//! # Console
//!
//! Echoed records and summary lines are best-effort. A console write error
//! is logged and never fails the record; once the console reports a broken
//! pipe, console output stops for the lifetime of the sink.
//!
//! # Failure handling
//!
//! Open and write failures are logged (rate-limited) and the record is
//! dropped. A failed write also discards the handle without a summary line,
//! so the next record starts a fresh gzip member instead of writing into a
//! stream in an unknown state.
//! Nothing is retried internally.
//!
//! # Restarts
//!
//! Files are opened with `append`, never truncated. A restart within the same
//! hour adds a second gzip member to the existing file; see
//! [`crate::util::chain_writer`] for what that means for readers.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

use crate::common::{MetricsSnapshot, SinkError, SinkMetrics};
use crate::util::{
    ChainWrite, ChainWriter, Clock, DEFAULT_BUFFER_SIZE, DEFAULT_GZIP_LEVEL, GzipWriter,
    PlainTextWriter, RateLimitedLogger, SystemClock, bucket_for,
};

/// Output compression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// gzip with the given level (0-9), `.gz` files
    Gzip { level: u32 },
    /// Uncompressed newline-delimited text, `.jsonl` files
    None,
}

impl Default for Compression {
    fn default() -> Self {
        Self::Gzip {
            level: DEFAULT_GZIP_LEVEL,
        }
    }
}

impl Compression {
    fn chain_writer(self, buffer_size: usize) -> Box<dyn ChainWriter> {
        match self {
            Self::Gzip { level } => Box::new(GzipWriter::new(buffer_size, level)),
            Self::None => Box::new(PlainTextWriter::new(buffer_size)),
        }
    }
}

/// Configuration for the rotating sink
#[derive(Debug, Clone)]
pub struct RotatingConfig {
    /// Output directory (must exist before the first record)
    pub path: PathBuf,

    /// Output compression
    pub compression: Compression,

    /// Write buffer size in front of the file
    pub buffer_size: usize,

    /// Mirror every written record to stdout
    pub echo: bool,

    /// Periodic flush while running (None = flush only on close)
    pub flush_interval: Option<Duration>,
}

impl Default for RotatingConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data"),
            compression: Compression::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            echo: false,
            flush_interval: None,
        }
    }
}

impl RotatingConfig {
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    /// Create the output directory, including parents, if it is missing
    pub fn ensure_path(&self) -> Result<(), SinkError> {
        fs::create_dir_all(&self.path).map_err(|source| SinkError::CreateDir {
            path: self.path.clone(),
            source,
        })
    }
}

/// Summary of a closed bucket file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationSummary {
    /// Bucket identifier of the closed file
    pub bucket: String,

    /// File name within the output directory
    pub file_name: String,

    /// Records written since the file was opened by this process
    pub records: u64,
}

impl fmt::Display for RotationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#records={} in {}", self.records, self.file_name)
    }
}

/// The currently open bucket file
struct OpenFile {
    bucket: String,
    file_name: String,
    path: PathBuf,
    writer: Box<dyn ChainWrite>,
    records: u64,
}

/// Rotating compressed sink
///
/// Owns the open file, its bucket and its record count. All three change
/// together inside [`RotatingSink::write`], so the sink must have a single
/// owner; [`RotatingSink::run`] gives it one on a dedicated task.
pub struct RotatingSink {
    config: RotatingConfig,
    chain_writer: Box<dyn ChainWriter>,
    clock: Arc<dyn Clock>,
    current: Option<OpenFile>,
    /// Bucket of the most recent open attempt, for rotation counting
    last_bucket: Option<String>,
    metrics: Arc<SinkMetrics>,
    error_logger: RateLimitedLogger,
    /// Echo and summary output; None once the reader has gone away
    console: Option<Box<dyn Write + Send>>,
}

impl RotatingSink {
    /// Create a sink driven by the system clock
    pub fn new(config: RotatingConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a sink driven by the given clock
    pub fn with_clock(config: RotatingConfig, clock: Arc<dyn Clock>) -> Self {
        let chain_writer = config.compression.chain_writer(config.buffer_size);
        Self {
            config,
            chain_writer,
            clock,
            current: None,
            last_bucket: None,
            metrics: Arc::new(SinkMetrics::new()),
            error_logger: RateLimitedLogger::default(),
            console: Some(Box::new(io::stdout())),
        }
    }

    /// Replace the console that echoed records and summaries go to
    #[must_use]
    pub fn with_console(mut self, console: Box<dyn Write + Send>) -> Self {
        self.console = Some(console);
        self
    }

    /// Replace the error logger (tests use a zero interval)
    #[must_use]
    pub fn with_error_logger(mut self, logger: RateLimitedLogger) -> Self {
        self.error_logger = logger;
        self
    }

    pub fn config(&self) -> &RotatingConfig {
        &self.config
    }

    pub fn metrics(&self) -> &SinkMetrics {
        &self.metrics
    }

    /// Shared handle to the counters, valid after `run()` consumes the sink
    pub fn metrics_handle(&self) -> Arc<SinkMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Bucket of the open file, if any
    pub fn current_bucket(&self) -> Option<&str> {
        self.current.as_ref().map(|f| f.bucket.as_str())
    }

    /// Records written to the open file since it was opened
    pub fn current_records(&self) -> u64 {
        self.current.as_ref().map_or(0, |f| f.records)
    }

    /// Path a bucket's records go to
    pub fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.config.path.join(self.file_name(bucket))
    }

    fn file_name(&self, bucket: &str) -> String {
        format!("{bucket}{}", self.chain_writer.file_extension())
    }

    /// Write one record as one line
    ///
    /// Returns the summary of the file closed by this call, if the bucket
    /// changed. On error the record is dropped; the failure has already been
    /// logged.
    pub fn write(&mut self, record: &str) -> Result<Option<RotationSummary>, SinkError> {
        self.metrics.record_received();

        let bucket = bucket_for(self.clock.now());
        let mut closed = None;

        let mut file = match self.current.take() {
            Some(open) if open.bucket == bucket => open,
            stale => {
                if let Some(old) = stale {
                    closed = Some(self.finish(old));
                }
                if self.last_bucket.as_ref().is_some_and(|last| *last != bucket) {
                    self.metrics.record_rotation();
                }
                self.last_bucket = Some(bucket.clone());
                match self.open(&bucket) {
                    Ok(file) => file,
                    Err(e) => {
                        self.metrics.record_open_error();
                        self.error_logger
                            .error("failed to open bucket file, record dropped", &e);
                        return Err(e);
                    }
                }
            }
        };

        let line = record.trim_end_matches(['\r', '\n']);
        let result = file
            .writer
            .write_all(line.as_bytes())
            .and_then(|()| file.writer.write_all(b"\n"));

        if let Err(source) = result {
            self.metrics.record_write_error();
            let err = SinkError::Write {
                path: file.path.clone(),
                source,
            };
            self.error_logger
                .error_with_data("failed to write record, record dropped", &err, line.as_bytes());
            // Stream state is unknown after a failed write
            Self::discard(file);
            return Err(err);
        }

        file.records += 1;
        self.metrics.record_written(line.len() as u64 + 1);
        self.current = Some(file);

        if self.config.echo {
            self.print(line);
        }

        Ok(closed)
    }

    /// Flush buffered data of the open file to disk
    pub fn flush(&mut self) {
        let Some(file) = self.current.as_mut() else {
            return;
        };
        if let Err(e) = file.writer.flush_all() {
            self.error_logger.error("failed to flush bucket file", &e);
        }
    }

    /// Close the open file, if any
    pub fn close(&mut self) -> Option<RotationSummary> {
        let file = self.current.take()?;
        Some(self.finish(file))
    }

    fn open(&self, bucket: &str) -> Result<OpenFile, SinkError> {
        let file_name = self.file_name(bucket);
        let path = self.config.path.join(&file_name);

        let file = File::options()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| SinkError::Open {
                path: path.clone(),
                source,
            })?;

        let existing = file.metadata().map(|m| m.len()).unwrap_or(0);
        if existing > 0 {
            tracing::info!(path = %path.display(), bytes = existing, "appending to existing bucket file");
        } else {
            tracing::debug!(path = %path.display(), "created bucket file");
        }

        let writer = self
            .chain_writer
            .wrap(file)
            .map_err(|source| SinkError::Open {
                path: path.clone(),
                source,
            })?;

        Ok(OpenFile {
            bucket: bucket.to_owned(),
            file_name,
            path,
            writer,
            records: 0,
        })
    }

    fn finish(&mut self, file: OpenFile) -> RotationSummary {
        let OpenFile {
            bucket,
            file_name,
            path,
            writer,
            records,
        } = file;

        if let Err(e) = writer.finish() {
            tracing::error!(path = %path.display(), error = %e, "failed to close bucket file");
        }

        let summary = RotationSummary {
            bucket,
            file_name,
            records,
        };
        tracing::info!(bucket = %summary.bucket, records = summary.records, "bucket file closed");
        self.print(&summary.to_string());
        summary
    }

    /// Drop a handle after a failed write, without a summary line
    fn discard(file: OpenFile) {
        let OpenFile { path, writer, .. } = file;
        if let Err(e) = writer.finish() {
            tracing::debug!(path = %path.display(), error = %e, "discarded failed bucket file handle");
        }
    }

    /// Write one line to the console, if it is still there
    fn print(&mut self, line: &str) {
        let Some(console) = self.console.as_mut() else {
            return;
        };
        let result = writeln!(console, "{line}").and_then(|()| console.flush());
        match result {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                tracing::warn!("console closed, echo and summary lines disabled");
                self.console = None;
            }
            Err(e) => {
                self.error_logger.error("failed to write to console", &e);
            }
        }
    }

    /// Whether console output is still enabled
    pub fn console_enabled(&self) -> bool {
        self.console.is_some()
    }

    /// Run the sink, writing records until the channel closes
    ///
    /// The open file is closed before returning.
    pub async fn run(mut self, mut receiver: mpsc::Receiver<String>) -> MetricsSnapshot {
        tracing::info!(path = %self.config.path.display(), "rotating sink starting");

        let mut ticker = self.config.flush_interval.map(|every| {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        loop {
            tokio::select! {
                record = receiver.recv() => match record {
                    // Failures are logged inside write()
                    Some(record) => { let _ = self.write(&record); }
                    None => break,
                },
                _ = tick(&mut ticker) => self.flush(),
            }
        }

        self.close();

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            records = snapshot.records_written,
            dropped = snapshot.records_dropped,
            rotations = snapshot.rotations,
            bytes = snapshot.bytes_written,
            "rotating sink shutting down"
        );
        snapshot
    }

    /// Output directory
    pub fn path(&self) -> &Path {
        &self.config.path
    }
}

impl Drop for RotatingSink {
    fn drop(&mut self) {
        self.close();
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
#[path = "rotating_test.rs"]
mod rotating_test;
