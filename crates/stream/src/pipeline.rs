//! Pipeline driver
//!
//! Wires a subscription request, an event adapter and a rotating sink
//! together and runs delivery until the stream ends or is cancelled.
//!
//! ```text
//! StatusStream ──StreamEvent──► EventAdapter ──mpsc(queue_size)──► RotatingSink task
//! ```
//!
//! The sink task is the only owner of sink state. It exits once the adapter
//! is dropped and the channel is drained, closing the open bucket file on
//! the way out.

use std::sync::Arc;

use chirp_sinks::util::Clock;
use chirp_sinks::{MetricsSnapshot, RotatingConfig, RotatingSink};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::adapter::{AdapterSnapshot, EventAdapter};
use crate::error::Result;
use crate::request::SubscriptionRequest;
use crate::source::{DeliveryStats, StatusStream};

/// Default capacity of the adapter to sink channel
pub const DEFAULT_QUEUE_SIZE: usize = 10_000;

/// Everything one capture run needs
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sink: RotatingConfig,
    pub request: SubscriptionRequest,
    pub queue_size: usize,
}

impl PipelineConfig {
    pub fn new(sink: RotatingConfig, request: SubscriptionRequest) -> Self {
        Self {
            sink,
            request,
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }

    #[must_use]
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }
}

/// Counters from a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    pub delivery: DeliveryStats,
    pub adapter: AdapterSnapshot,
    pub sink: MetricsSnapshot,
}

/// A single capture pipeline
pub struct Pipeline {
    config: PipelineConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            clock: None,
        }
    }

    /// Drive bucket selection from `clock` instead of the system clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run delivery to completion
    ///
    /// Fails before delivery starts if the output directory cannot be
    /// created. Once delivery has started, I/O failures are logged by the
    /// sink and never end the run.
    pub async fn run<S: StatusStream>(
        self,
        stream: S,
        cancel: CancellationToken,
    ) -> Result<PipelineReport> {
        let Self { config, clock } = self;
        let PipelineConfig {
            sink: sink_config,
            request,
            queue_size,
        } = config;

        sink_config.ensure_path()?;

        if matches!(&request, SubscriptionRequest::Filter(query) if query.is_unbounded()) {
            tracing::warn!("filter has no track or locations, the stream may reject it");
        }

        let params = request
            .params()
            .into_iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        tracing::info!(
            mode = request.mode().as_str(),
            endpoint = request.endpoint(),
            %params,
            path = %sink_config.path.display(),
            "starting capture"
        );

        let sink = match clock {
            Some(clock) => RotatingSink::with_clock(sink_config, clock),
            None => RotatingSink::new(sink_config),
        };

        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let sink_task = tokio::spawn(sink.run(rx));

        let adapter = EventAdapter::new(tx);
        let adapter_metrics = adapter.metrics_handle();
        let delivered = stream.deliver(&request, &adapter, cancel).await;

        // Closing the channel lets the sink drain and close its file
        drop(adapter);
        let sink = sink_task.await?;
        let delivery = delivered?;

        let report = PipelineReport {
            delivery,
            adapter: adapter_metrics.snapshot(),
            sink,
        };
        tracing::info!(
            lines = report.delivery.lines,
            statuses = report.adapter.statuses,
            written = report.sink.records_written,
            dropped = report.sink.records_dropped,
            "capture finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;
