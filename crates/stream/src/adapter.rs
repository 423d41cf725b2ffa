//! Event adapter - forwards statuses to the sink, logs everything else
//!
//! The adapter sits between the stream client and the sink task. It holds
//! the sending half of the bounded channel feeding [`RotatingSink::run`];
//! dropping every adapter closes the channel and lets the sink close its
//! file.
//!
//! [`RotatingSink::run`]: chirp_sinks::RotatingSink::run

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::event::StreamEvent;

/// Per-variant notification counters
#[derive(Debug, Default)]
pub struct AdapterMetrics {
    statuses: AtomicU64,
    deletions: AtomicU64,
    track_limitations: AtomicU64,
    scrub_geos: AtomicU64,
    stall_warnings: AtomicU64,
    exceptions: AtomicU64,
    forward_failures: AtomicU64,
}

/// Point-in-time copy of [`AdapterMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterSnapshot {
    pub statuses: u64,
    pub deletions: u64,
    pub track_limitations: u64,
    pub scrub_geos: u64,
    pub stall_warnings: u64,
    pub exceptions: u64,
    /// Statuses that could not be handed to the sink
    pub forward_failures: u64,
}

impl AdapterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: &StreamEvent) {
        let counter = match event {
            StreamEvent::Status(_) => &self.statuses,
            StreamEvent::Deletion { .. } => &self.deletions,
            StreamEvent::TrackLimitation { .. } => &self.track_limitations,
            StreamEvent::ScrubGeo { .. } => &self.scrub_geos,
            StreamEvent::StallWarning { .. } => &self.stall_warnings,
            StreamEvent::Exception(_) => &self.exceptions,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AdapterSnapshot {
        AdapterSnapshot {
            statuses: self.statuses.load(Ordering::Relaxed),
            deletions: self.deletions.load(Ordering::Relaxed),
            track_limitations: self.track_limitations.load(Ordering::Relaxed),
            scrub_geos: self.scrub_geos.load(Ordering::Relaxed),
            stall_warnings: self.stall_warnings.load(Ordering::Relaxed),
            exceptions: self.exceptions.load(Ordering::Relaxed),
            forward_failures: self.forward_failures.load(Ordering::Relaxed),
        }
    }
}

/// Receives stream notifications and forwards status text to the sink
#[derive(Debug, Clone)]
pub struct EventAdapter {
    sender: mpsc::Sender<String>,
    metrics: Arc<AdapterMetrics>,
}

impl EventAdapter {
    pub fn new(sender: mpsc::Sender<String>) -> Self {
        Self {
            sender,
            metrics: Arc::new(AdapterMetrics::new()),
        }
    }

    pub fn metrics(&self) -> &AdapterMetrics {
        &self.metrics
    }

    /// Shared handle to the counters, valid after the adapter is dropped
    pub fn metrics_handle(&self) -> Arc<AdapterMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Handle one notification
    ///
    /// Waits for queue space when the sink is behind. Returns `false` only
    /// when the sink task has gone away; every other outcome, including an
    /// upstream exception, is `true`.
    pub async fn on_event(&self, event: StreamEvent) -> bool {
        self.metrics.record(&event);

        match event {
            StreamEvent::Status(text) => {
                if self.sender.send(text).await.is_err() {
                    self.metrics.forward_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("sink is closed, status dropped");
                    return false;
                }
            }
            StreamEvent::Deletion { status_id, user_id } => {
                tracing::debug!(status_id, user_id, "deletion notice");
            }
            StreamEvent::TrackLimitation { limited } => {
                tracing::info!(limited, "track limitation notice");
            }
            StreamEvent::ScrubGeo {
                user_id,
                up_to_status_id,
            } => {
                tracing::debug!(user_id, up_to_status_id, "scrub geo notice");
            }
            StreamEvent::StallWarning {
                code,
                message,
                percent_full,
            } => {
                tracing::warn!(%code, ?percent_full, "stall warning: {message}");
            }
            StreamEvent::Exception(message) => {
                tracing::warn!("stream exception: {message}");
            }
        }
        true
    }
}

#[cfg(test)]
#[path = "adapter_test.rs"]
mod adapter_test;
