//! Chirp - Stream
//!
//! Everything between the streaming client and the sink: the notification
//! enum and its wire classification, subscription requests, the event
//! adapter and the pipeline driver that runs a capture.
//!
//! # Example
//!
//! ```ignore
//! use chirp_sinks::RotatingConfig;
//! use chirp_stream::{LineStream, Pipeline, PipelineConfig, SubscriptionRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = PipelineConfig::new(
//!     RotatingConfig::default().with_path("captures"),
//!     SubscriptionRequest::sample(),
//! );
//! let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//! let report = Pipeline::new(config)
//!     .run(LineStream::new(stdin), CancellationToken::new())
//!     .await?;
//! ```

pub mod adapter;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod request;
pub mod source;

pub use adapter::{AdapterMetrics, AdapterSnapshot, EventAdapter};
pub use error::{Result, StreamError};
pub use event::StreamEvent;
pub use pipeline::{DEFAULT_QUEUE_SIZE, Pipeline, PipelineConfig, PipelineReport};
pub use request::{
    BoundingBox, DEFAULT_LANGUAGE, FilterQuery, Mode, SubscriptionRequest, TrackList,
};
pub use source::{DEFAULT_MAX_LINE_SIZE, DeliveryStats, LineStream, StatusStream};
