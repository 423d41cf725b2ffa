//! Hour buckets
//!
//! A bucket is local wall-clock time truncated to the hour and rendered as
//! `YYYY.MM.DD_HH`. It is both the rotation key and the base name of the
//! output file (`2024.01.01_09.gz`).

use chrono::{DateTime, Local};

/// strftime pattern for bucket identifiers
pub const BUCKET_FORMAT: &str = "%Y.%m.%d_%H";

/// Bucket identifier for a point in time
#[inline]
pub fn bucket_for(now: DateTime<Local>) -> String {
    now.format(BUCKET_FORMAT).to_string()
}
