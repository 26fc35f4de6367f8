//! Metrics collection and reporting

use chunkstream_core::{Chunk, Diagnostic, DiagnosticsSink, Observer};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Metrics collector for stream volume and failures
///
/// Register it as an observer to count chunks, and as a diagnostics sink to
/// count observer failures, stop timeouts and producer failures. Clones
/// share counters.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    chunks: AtomicU64,
    chars: AtomicU64,
    streams_started: AtomicU64,
    observer_failures: AtomicU64,
    stop_timeouts: AtomicU64,
    producer_failures: AtomicU64,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                chunks: AtomicU64::new(0),
                chars: AtomicU64::new(0),
                streams_started: AtomicU64::new(0),
                observer_failures: AtomicU64::new(0),
                stop_timeouts: AtomicU64::new(0),
                producer_failures: AtomicU64::new(0),
            }),
        }
    }

    /// Record one chunk
    pub fn record_chunk(&self, chunk: &Chunk) {
        self.inner.chunks.fetch_add(1, Ordering::Relaxed);
        self.inner
            .chars
            .fetch_add(chunk.content.chars().count() as u64, Ordering::Relaxed);
        if chunk.seq == 0 {
            self.inner.streams_started.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an observer failure
    pub fn record_observer_failure(&self) {
        self.inner.observer_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stop timeout
    pub fn record_stop_timeout(&self) {
        self.inner.stop_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a crashed producer task
    pub fn record_producer_failure(&self) {
        self.inner.producer_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            chunks: self.inner.chunks.load(Ordering::Relaxed),
            chars: self.inner.chars.load(Ordering::Relaxed),
            streams_started: self.inner.streams_started.load(Ordering::Relaxed),
            observer_failures: self.inner.observer_failures.load(Ordering::Relaxed),
            stop_timeouts: self.inner.stop_timeouts.load(Ordering::Relaxed),
            producer_failures: self.inner.producer_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer for MetricsCollector {
    fn on_chunk(&self, chunk: &Chunk) -> anyhow::Result<()> {
        self.record_chunk(chunk);
        Ok(())
    }

    fn name(&self) -> &str {
        "metrics"
    }
}

impl DiagnosticsSink for MetricsCollector {
    fn report(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::ObserverFailure { .. } => self.record_observer_failure(),
            Diagnostic::StopTimeout { .. } => self.record_stop_timeout(),
            Diagnostic::ProducerFailure { .. } => self.record_producer_failure(),
        }
        let error = chunkstream_core::Error::from(diagnostic);
        warn!(error = %error, "stream diagnostic");
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub chunks: u64,
    pub chars: u64,
    /// Streams that produced at least one chunk
    pub streams_started: u64,
    pub observer_failures: u64,
    pub stop_timeouts: u64,
    pub producer_failures: u64,
}

impl MetricsSnapshot {
    /// Average characters per chunk
    pub fn avg_chunk_chars(&self) -> f64 {
        if self.chunks == 0 {
            0.0
        } else {
            self.chars as f64 / self.chunks as f64
        }
    }

    /// Fraction of chunks on which some observer failed
    pub fn failure_rate(&self) -> f64 {
        if self.chunks == 0 {
            0.0
        } else {
            self.observer_failures as f64 / self.chunks as f64
        }
    }
}
