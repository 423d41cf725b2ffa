//! Chirp - Sinks
//!
//! Durable output for captured status records.
//!
//! # Architecture
//!
//! The rotating sink runs as a single task that owns the open file. Records
//! arrive over a tokio channel and are written in arrival order to the file
//! of the hour bucket that is current when the sink handles them.
//!
//! ```text
//! [Event Adapter] --String--> [Sink Channel] --> [RotatingSink task] --> <dir>/<YYYY.MM.DD_HH>.gz
//! ```
//!
//! # Example
//!
//! ```ignore
//! use chirp_sinks::{RotatingConfig, RotatingSink};
//! use tokio::sync::mpsc;
//!
//! let (tx, rx) = mpsc::channel(10_000);
//! let sink = RotatingSink::new(RotatingConfig::default().with_path("captures"));
//! let handle = tokio::spawn(sink.run(rx));
//!
//! tx.send(raw_json).await?;
//! drop(tx);
//! let snapshot = handle.await?;
//! ```

/// Rotating sink - hourly bucketed compressed files
pub mod rotating;

/// Shared utilities (buckets, clocks, writers, rate-limited logging)
pub mod util;

/// Common types shared by sinks (errors, metrics)
mod common;

pub use common::{MetricsSnapshot, SinkError, SinkMetrics};
pub use rotating::{Compression, RotatingConfig, RotatingSink, RotationSummary};
