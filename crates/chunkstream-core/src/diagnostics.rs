//! Side channel for non-fatal failures
//!
//! Observer failures, stop timeouts and crashed producer tasks never abort
//! the caller; they are reported here instead.

use crate::{Error, StreamId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// A non-fatal event raised while streaming
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// An observer returned an error or panicked
    ObserverFailure {
        stream_id: StreamId,
        seq: usize,
        observer: String,
        message: String,
    },

    /// A producer task outlived its stop bound
    StopTimeout { stream_id: StreamId, waited: Duration },

    /// A producer task panicked or was aborted before finishing its stream
    ProducerFailure { stream_id: StreamId, message: String },
}

impl Diagnostic {
    /// Stream the event belongs to
    pub fn stream_id(&self) -> StreamId {
        match self {
            Self::ObserverFailure { stream_id, .. }
            | Self::StopTimeout { stream_id, .. }
            | Self::ProducerFailure { stream_id, .. } => *stream_id,
        }
    }
}

impl From<Diagnostic> for Error {
    fn from(diagnostic: Diagnostic) -> Self {
        match diagnostic {
            Diagnostic::ObserverFailure {
                stream_id,
                seq,
                observer,
                message,
            } => Error::ObserverFailure {
                stream_id,
                seq,
                observer,
                message,
            },
            Diagnostic::StopTimeout { stream_id, waited } => {
                Error::StopTimeout { stream_id, waited }
            }
            Diagnostic::ProducerFailure { stream_id, message } => {
                Error::internal(format!("producer for stream {stream_id} failed: {message}"))
            }
        }
    }
}

/// Receiver of diagnostics
pub trait DiagnosticsSink: Send + Sync {
    /// Record one event; must not block for long
    fn report(&self, diagnostic: Diagnostic);
}

/// Logs every diagnostic as a warning
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn report(&self, diagnostic: Diagnostic) {
        let stream_id = diagnostic.stream_id();
        let error = Error::from(diagnostic);
        warn!(stream_id = %stream_id, error = %error, "stream diagnostic");
    }
}

/// Keeps every diagnostic in memory
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<Diagnostic>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything reported so far
    pub fn events(&self) -> Vec<Diagnostic> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl DiagnosticsSink for CollectingSink {
    fn report(&self, diagnostic: Diagnostic) {
        self.events.lock().push(diagnostic);
    }
}
