//! Error types for the correlation bridge and latency sampler

use std::time::Duration;
use thiserror::Error;
use venue_types::CorrelationId;

/// Failures raised by a session when handing off a request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("session stopped")]
    SessionStopped,

    #[error("channel closed")]
    ChannelClosed,

    #[error("session unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur while measuring latency
#[derive(Debug, Error)]
pub enum LatencyError {
    /// The session could not be brought up; nothing was sent.
    #[error("failed to start session: {0}")]
    SessionStart(#[source] TransportError),

    /// The request never left; no wait was started.
    #[error("transport error for {correlation_id}: {source}")]
    Transport {
        correlation_id: CorrelationId,
        #[source]
        source: TransportError,
    },

    #[error("no response for {correlation_id} within {}ms", .timeout.as_millis())]
    CorrelationTimeout {
        correlation_id: CorrelationId,
        timeout: Duration,
    },

    #[error(
        "create response for {correlation_id} has no ORDER_ID{}",
        .detail.as_ref().map(|d| format!(": {}", d)).unwrap_or_default()
    )]
    MissingOrderId {
        correlation_id: CorrelationId,
        /// Venue error text, when the response was a rejection
        detail: Option<String>,
    },

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result alias used across the crate
pub type LatencyResult<T> = Result<T, LatencyError>;
