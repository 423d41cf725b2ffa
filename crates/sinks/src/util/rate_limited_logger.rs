//! Rate-limited error logging
//!
//! A full disk or a revoked directory permission fails every record that
//! arrives afterwards. This logger reports such failures at most once per
//! interval and carries the number of suppressed repeats in the next line.
//!
//! # Example
//!
//! ```ignore
//! use chirp_sinks::util::RateLimitedLogger;
//! use std::time::Duration;
//!
//! let logger = RateLimitedLogger::new(Duration::from_secs(10));
//!
//! // Only logs once per 10 seconds, even if called for every record
//! for _ in 0..1000 {
//!     logger.error("failed to write record", &io_error);
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default interval for rate-limited logging
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Maximum record prefix included in a log line
pub const MAX_DATA_LOG_LENGTH: usize = 256;

/// Rate-limited logger that prevents log spam
pub struct RateLimitedLogger {
    min_interval: Duration,
    last_log_time: Mutex<Option<Instant>>,

    /// Errors since the last emitted line
    pending: AtomicU64,

    /// Errors ever recorded
    total: AtomicU64,
}

impl RateLimitedLogger {
    /// Create a new rate-limited logger with the specified interval
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_log_time: Mutex::new(None),
            pending: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// Record an error and log if enough time has passed
    ///
    /// Returns true if the error was logged, false if it was suppressed.
    pub fn error(&self, message: &str, error: &dyn std::fmt::Display) -> bool {
        let Some((suppressed, total)) = self.record() else {
            return false;
        };

        if suppressed > 0 {
            tracing::error!(error = %error, suppressed, total_errors = total, "{message}");
        } else {
            tracing::error!(error = %error, total_errors = total, "{message}");
        }
        true
    }

    /// Record an error together with the offending record (truncated)
    pub fn error_with_data(
        &self,
        message: &str,
        error: &dyn std::fmt::Display,
        data: &[u8],
    ) -> bool {
        let Some((suppressed, total)) = self.record() else {
            return false;
        };

        let shown = truncate_for_log(data);
        if suppressed > 0 {
            tracing::error!(
                error = %error,
                data = %shown,
                suppressed,
                total_errors = total,
                "{message}"
            );
        } else {
            tracing::error!(error = %error, data = %shown, total_errors = total, "{message}");
        }
        true
    }

    /// Count one error; returns `(suppressed, total)` when a line is due
    fn record(&self) -> Option<(u64, u64)> {
        self.pending.fetch_add(1, Ordering::Relaxed);
        let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;

        {
            let mut last = self.last_log_time.lock();
            let now = Instant::now();
            match *last {
                Some(prev) if now.duration_since(prev) < self.min_interval => return None,
                _ => *last = Some(now),
            }
        }

        let pending = self.pending.swap(0, Ordering::Relaxed);
        Some((pending.saturating_sub(1), total))
    }

    /// Errors recorded since the last emitted line
    pub fn pending_error_count(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }

    /// Errors ever recorded
    pub fn total_error_count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl Default for RateLimitedLogger {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_INTERVAL)
    }
}

fn truncate_for_log(data: &[u8]) -> String {
    if data.len() > MAX_DATA_LOG_LENGTH {
        format!(
            "{}... (truncated from {} bytes)",
            String::from_utf8_lossy(&data[..MAX_DATA_LOG_LENGTH]),
            data.len()
        )
    } else {
        String::from_utf8_lossy(data).into_owned()
    }
}
