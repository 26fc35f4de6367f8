//! Stream runner with per-chunk observer fan-out

use crate::config::StreamConfig;
use crate::diagnostics::DiagnosticsSink;
use crate::observer::{FnObserver, Observer, ObserverRegistry};
use crate::runner::{ProductionSummary, StreamRunner};
use crate::{Chunk, NextChunk, Result, StreamId};
use std::sync::Arc;
use std::time::Duration;

/// A [`StreamRunner`] that also hands every chunk to registered observers
///
/// Observers run on the producer task, before the chunk is pushed to the
/// channel. Registering while a run is active is allowed; the new observer
/// only sees chunks produced after registration.
#[derive(Debug)]
pub struct CallbackStreamRunner {
    runner: StreamRunner,
    observers: ObserverRegistry,
}

impl CallbackStreamRunner {
    /// Create a new idle runner with no observers
    pub fn new(config: StreamConfig) -> Result<Self> {
        Ok(Self {
            runner: StreamRunner::new(config)?,
            observers: ObserverRegistry::new(),
        })
    }

    /// Route observer failures and stop timeouts to `sink`
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.runner = self.runner.with_diagnostics(sink);
        self
    }

    /// Append an observer
    pub fn add_observer(&self, observer: Arc<dyn Observer>) {
        self.observers.register(observer);
    }

    /// Append a closure as a named observer
    pub fn add_fn<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(&Chunk) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.observers.register(Arc::new(FnObserver::new(name, f)));
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn id(&self) -> StreamId {
        self.runner.id()
    }

    pub fn is_streaming(&self) -> bool {
        self.runner.is_streaming()
    }

    pub fn is_producing(&self) -> bool {
        self.runner.is_producing()
    }

    /// Begin streaming `payload` with observer fan-out
    ///
    /// # Errors
    /// `AlreadyRunning` if the previous run is still streaming
    pub fn start(&mut self, payload: impl Into<Arc<str>>) -> Result<()> {
        self.runner
            .launch(payload.into(), Some(self.observers.clone()))
    }

    /// See [`StreamRunner::next_chunk`]
    pub async fn next_chunk(&mut self, timeout: Duration) -> NextChunk {
        self.runner.next_chunk(timeout).await
    }

    /// See [`StreamRunner::collect`]
    pub async fn collect(&mut self) -> String {
        self.runner.collect().await
    }

    /// See [`StreamRunner::stop`]
    pub async fn stop(&mut self) -> Result<()> {
        self.runner.stop().await
    }

    /// See [`StreamRunner::join`]
    pub async fn join(&mut self) -> Option<ProductionSummary> {
        self.runner.join().await
    }
}
