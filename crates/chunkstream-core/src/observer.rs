//! Per-chunk observers
//!
//! Observers are invoked synchronously by the producer for every chunk, in
//! registration order. Delivery is best-effort: an observer that returns an
//! error or panics is reported to diagnostics and skipped for that chunk.

use crate::diagnostics::{Diagnostic, DiagnosticsSink};
use crate::Chunk;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Receives every chunk of a stream
///
/// Implementations may be slow or fail; neither stops delivery.
pub trait Observer: Send + Sync {
    /// Handle one chunk
    fn on_chunk(&self, chunk: &Chunk) -> anyhow::Result<()>;

    /// Name used in diagnostics
    fn name(&self) -> &str {
        "observer"
    }
}

/// Adapts a closure into an [`Observer`]
pub struct FnObserver<F> {
    name: String,
    f: F,
}

impl<F> FnObserver<F>
where
    F: Fn(&Chunk) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Observer for FnObserver<F>
where
    F: Fn(&Chunk) -> anyhow::Result<()> + Send + Sync,
{
    fn on_chunk(&self, chunk: &Chunk) -> anyhow::Result<()> {
        (self.f)(chunk)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for FnObserver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObserver").field("name", &self.name).finish()
    }
}

/// Append-only, shareable list of observers
///
/// Clones share the same list, so registering through one handle is seen by
/// a producer holding another.
#[derive(Clone, Default)]
pub struct ObserverRegistry {
    observers: Arc<RwLock<Vec<Arc<dyn Observer>>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an observer
    pub fn register(&self, observer: Arc<dyn Observer>) {
        self.observers.write().push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Deliver `chunk` to every observer, returning the number that failed
    ///
    /// The lock is only held to take a snapshot, so observers may register
    /// further observers without deadlocking.
    pub fn deliver(&self, chunk: &Chunk, diagnostics: &dyn DiagnosticsSink) -> usize {
        let snapshot: Vec<Arc<dyn Observer>> = self.observers.read().clone();
        let mut failures = 0;

        for observer in snapshot {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| observer.on_chunk(chunk)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => format!("{err:#}"),
                Err(payload) => format!("panicked: {}", panic_message(&*payload)),
            };

            failures += 1;
            metrics::counter!("chunkstream_observer_failures_total").increment(1);
            diagnostics.report(Diagnostic::ObserverFailure {
                stream_id: chunk.stream_id,
                seq: chunk.seq,
                observer: observer.name().to_string(),
                message,
            });
        }

        failures
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("len", &self.len())
            .finish()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
