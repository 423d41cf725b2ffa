//! Common types shared by sinks: errors and counters

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

/// Errors from sink operations
///
/// A failed record is already logged by the sink when this is returned;
/// callers only need it to decide whether the record was persisted.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Could not open (create or append) the bucket file
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write a record to the open file
    #[error("failed to write to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create the output directory
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Counters for the rotating sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Records handed to the sink
    pub records_received: AtomicU64,

    /// Records persisted to a bucket file
    pub records_written: AtomicU64,

    /// Records dropped after an open or write failure
    pub records_dropped: AtomicU64,

    /// Uncompressed bytes written (including newlines)
    pub bytes_written: AtomicU64,

    /// Files closed because the bucket changed
    pub rotations: AtomicU64,

    /// Failed attempts to open a bucket file
    pub open_errors: AtomicU64,

    /// Failed record writes
    pub write_errors: AtomicU64,
}

impl SinkMetrics {
    pub const fn new() -> Self {
        Self {
            records_received: AtomicU64::new(0),
            records_written: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            open_errors: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_received(&self) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_written(&self, bytes: u64) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_open_error(&self) {
        self.open_errors.fetch_add(1, Ordering::Relaxed);
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            open_errors: self.open_errors.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of sink metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_received: u64,
    pub records_written: u64,
    pub records_dropped: u64,
    pub bytes_written: u64,
    pub rotations: u64,
    pub open_errors: u64,
    pub write_errors: u64,
}
