//! Error types for ChunkStream

use crate::types::StreamId;
use std::time::Duration;

/// Result type alias using ChunkStream's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ChunkStream operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Zero chunk size, zero concurrency limit, or another unusable setting
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// `start` was called on a runner that is still streaming
    #[error("stream {0} is already running")]
    AlreadyRunning(StreamId),

    /// An observer returned an error or panicked while handling a chunk
    #[error("observer '{observer}' failed on chunk {seq} of stream {stream_id}: {message}")]
    ObserverFailure {
        stream_id: StreamId,
        seq: usize,
        observer: String,
        message: String,
    },

    /// A cooperative stop did not complete within its bound
    #[error("stream {stream_id} did not stop within {waited:?}")]
    StopTimeout { stream_id: StreamId, waited: Duration },

    /// The consuming side of a stream channel went away
    #[error("stream channel closed")]
    ChannelClosed,

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error only warrants a warning.
    ///
    /// Observer failures and stop timeouts never abort a stream or a batch.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::ObserverFailure { .. } | Self::StopTimeout { .. })
    }
}
