//! Capture configuration
//!
//! Settings for how captured records are written. The output directory and
//! the stream query come from the command line; everything here is optional.
//!
//! # Example
//!
//! ```toml
//! [capture]
//! compression = "gzip"
//! gzip_level = 6
//! buffer_size = 65536
//! queue_size = 10000
//! language = "en"
//! echo = false
//! flush_interval = "1s"
//! ```

use std::time::Duration;

use serde::Deserialize;

/// Default language for stream subscriptions
pub const DEFAULT_LANGUAGE: &str = "en";

/// Output compression
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// gzip, `.gz` files (default)
    #[default]
    Gzip,
    /// Plain newline-delimited text, `.jsonl` files
    None,
}

/// Capture configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Output compression
    pub compression: Compression,

    /// gzip level, 0-9
    pub gzip_level: u32,

    /// Write buffer size in bytes
    pub buffer_size: usize,

    /// Records buffered between the stream and the file writer
    pub queue_size: usize,

    /// Language requested from the stream
    pub language: String,

    /// Echo records to stdout; unset means the mode's default
    pub echo: Option<bool>,

    /// Periodic flush of the open file; unset means flush on close only
    #[serde(with = "humantime_serde")]
    pub flush_interval: Option<Duration>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Gzip,
            gzip_level: 6,
            buffer_size: 64 * 1024,
            queue_size: 10_000,
            language: DEFAULT_LANGUAGE.into(),
            echo: None,
            flush_interval: None,
        }
    }
}
