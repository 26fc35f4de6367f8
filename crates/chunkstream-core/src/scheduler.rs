//! Batch scheduling of many streams under a concurrency ceiling
//!
//! The scheduler keeps a window of at most `max_concurrent_streams` live
//! runners. Each rotation it:
//! 1. admits queued payloads in submission order while slots are free
//! 2. polls every live runner with a zero timeout, so one slow stream never
//!    holds up the others
//! 3. retires runners that reported `EndOfStream`, after the scan
//!
//! Completion order is arbitrary; results are stored by submission index.
//! A retired runner whose producer task crashed is reported as
//! [`Diagnostic::ProducerFailure`](crate::Diagnostic) and its slot is listed
//! in [`BatchReport::failed`].

use crate::config::BatchConfig;
use crate::diagnostics::{DiagnosticsSink, TracingSink};
use crate::observer::{Observer, ObserverRegistry};
use crate::runner::StreamRunner;
use crate::{Error, NextChunk, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Accumulated content, indexed like the input payloads
    pub results: Vec<String>,

    /// Most runners live at the same time
    pub peak_concurrency: usize,

    /// Chunks received across all streams
    pub chunks_received: usize,

    /// Submission indices whose producer crashed; their results are partial
    pub failed: Vec<usize>,
}

/// A runner occupying one concurrency slot
struct LiveStream {
    slot: usize,
    runner: StreamRunner,
    content: String,
}

/// Runs many payloads with bounded concurrency
pub struct BatchStreamScheduler {
    config: BatchConfig,
    observers: ObserverRegistry,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl BatchStreamScheduler {
    /// Create a new scheduler
    ///
    /// # Errors
    /// `InvalidConfiguration` for a zero concurrency limit or chunk size
    pub fn new(config: BatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            observers: ObserverRegistry::new(),
            diagnostics: Arc::new(TracingSink),
        })
    }

    /// Route runner diagnostics to `sink`
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    /// Observe every chunk of every stream in later batches
    pub fn add_observer(&self, observer: Arc<dyn Observer>) {
        self.observers.register(observer);
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Stream every payload and return the accumulated contents in order
    ///
    /// # Errors
    /// `Internal` if any producer crashed, since its result would be partial
    pub async fn process<S: AsRef<str>>(&self, payloads: &[S]) -> Result<Vec<String>> {
        let report = self.process_with_report(payloads).await?;
        if !report.failed.is_empty() {
            return Err(Error::internal(format!(
                "{} of {} streams failed (slots {:?})",
                report.failed.len(),
                payloads.len(),
                report.failed
            )));
        }
        Ok(report.results)
    }

    /// Like [`process`](Self::process), also reporting concurrency and volume
    pub async fn process_with_report<S: AsRef<str>>(&self, payloads: &[S]) -> Result<BatchReport> {
        let mut report = BatchReport {
            results: vec![String::new(); payloads.len()],
            ..Default::default()
        };
        if payloads.is_empty() {
            return Ok(report);
        }

        let max_live = self.config.max_concurrent_streams;
        let idle_backoff = self.config.idle_backoff();
        let mut live: Vec<LiveStream> = Vec::with_capacity(max_live.min(payloads.len()));
        let mut cursor = 0;

        info!(
            payloads = payloads.len(),
            max_concurrent_streams = max_live,
            "starting batch"
        );

        while cursor < payloads.len() || !live.is_empty() {
            while live.len() < max_live && cursor < payloads.len() {
                live.push(self.admit(cursor, payloads[cursor].as_ref())?);
                cursor += 1;
            }
            report.peak_concurrency = report.peak_concurrency.max(live.len());

            let mut progressed = false;
            let mut finished = Vec::new();

            for (idx, stream) in live.iter_mut().enumerate() {
                match stream.runner.next_chunk(Duration::ZERO).await {
                    NextChunk::Chunk(chunk) => {
                        stream.content.push_str(&chunk.content);
                        report.chunks_received += 1;
                        progressed = true;
                    }
                    NextChunk::EndOfStream => {
                        finished.push(idx);
                        progressed = true;
                    }
                    NextChunk::Timeout => {}
                }
            }

            // Highest index first keeps the remaining indices valid
            for idx in finished.into_iter().rev() {
                let mut done = live.remove(idx);
                // The sender is gone once the end was read, so this is quick
                if done.runner.join().await.is_none() {
                    warn!(stream_id = %done.runner.id(), slot = done.slot, "stream failed");
                    report.failed.push(done.slot);
                } else {
                    debug!(
                        stream_id = %done.runner.id(),
                        slot = done.slot,
                        chars = done.content.chars().count(),
                        "stream retired"
                    );
                    metrics::counter!("chunkstream_streams_completed_total").increment(1);
                }
                report.results[done.slot] = done.content;
            }

            if !progressed {
                if idle_backoff.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(idle_backoff).await;
                }
            }
        }

        report.failed.sort_unstable();
        info!(
            payloads = payloads.len(),
            failed = report.failed.len(),
            chunks = report.chunks_received,
            peak_concurrency = report.peak_concurrency,
            "batch complete"
        );
        Ok(report)
    }

    fn admit(&self, slot: usize, payload: &str) -> Result<LiveStream> {
        let mut runner = StreamRunner::new(self.config.stream.clone())?
            .with_diagnostics(self.diagnostics.clone());
        let observers = (!self.observers.is_empty()).then(|| self.observers.clone());
        runner.launch(Arc::from(payload), observers)?;

        debug!(stream_id = %runner.id(), slot, "stream admitted");
        Ok(LiveStream {
            slot,
            runner,
            content: String::new(),
        })
    }
}

impl std::fmt::Debug for BatchStreamScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchStreamScheduler")
            .field("config", &self.config)
            .field("observers", &self.observers)
            .finish()
    }
}
