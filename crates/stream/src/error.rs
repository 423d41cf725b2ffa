//! Stream and pipeline error types

use chirp_sinks::SinkError;
use thiserror::Error;

/// Errors from building a subscription or running a capture pipeline
#[derive(Debug, Error)]
pub enum StreamError {
    /// `locations` is not `min_lon,min_lat,max_lon,max_lat`
    #[error("invalid locations '{input}': {reason}")]
    InvalidLocations {
        /// The rejected argument
        input: String,
        /// What is wrong with it
        reason: String,
    },

    /// `track` contained no keyword phrase
    #[error("track must contain at least one keyword phrase")]
    EmptyTrack,

    /// Output directory could not be prepared
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// The sink task panicked or was cancelled
    #[error("sink task failed: {0}")]
    SinkTask(#[from] tokio::task::JoinError),
}

impl StreamError {
    pub(crate) fn invalid_locations(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidLocations {
            input: input.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Result type for stream operations
pub type Result<T> = std::result::Result<T, StreamError>;
