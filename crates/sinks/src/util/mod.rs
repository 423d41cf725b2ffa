//! Sink utilities
//!
//! - **bucket**: hour bucket identifiers (`YYYY.MM.DD_HH`)
//! - **clock**: wall-clock sources, including a manual clock for tests
//! - **chain_writer**: pluggable file writers (gzip, plain text)
//! - **rate_limited_logger**: error logging that survives a full disk

pub mod bucket;
pub mod chain_writer;
pub mod clock;
pub mod rate_limited_logger;

pub use bucket::{BUCKET_FORMAT, bucket_for};
pub use chain_writer::{
    ChainWrite, ChainWriter, DEFAULT_BUFFER_SIZE, DEFAULT_GZIP_LEVEL, GzipWriter, PlainTextWriter,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use rate_limited_logger::{DEFAULT_LOG_INTERVAL, MAX_DATA_LOG_LENGTH, RateLimitedLogger};
