//! Stream runners
//!
//! A [`StreamRunner`] owns one background production task per run. The task
//! walks a [`ChunkSource`] over the payload, pushes each chunk into a
//! [`StreamChannel`] with a short delay in between, and always finishes the
//! channel with `EndOfStream`, including after an early stop.
//!
//! The `is_streaming` flag is the only state shared between the producer and
//! the consumer. It is set by `start` and cleared either when the consumer
//! reads `EndOfStream` or when `stop` is called.

use crate::channel::{stream_channel, ChunkSender, StreamChannel};
use crate::config::StreamConfig;
use crate::diagnostics::{Diagnostic, DiagnosticsSink, TracingSink};
use crate::observer::{panic_message, ObserverRegistry};
use crate::source::ChunkSource;
use crate::{Error, NextChunk, Result, StreamId, StreamItem};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

/// Liveness flag shared by a producer task and its consumer
#[derive(Debug)]
pub(crate) struct StreamingFlag {
    streaming: AtomicBool,
    wake: Notify,
}

impl StreamingFlag {
    fn new(streaming: bool) -> Self {
        Self {
            streaming: AtomicBool::new(streaming),
            wake: Notify::new(),
        }
    }

    pub(crate) fn is_set(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    fn clear(&self) {
        self.streaming.store(false, Ordering::Release);
    }

    /// Clear the flag and wake a producer parked on a delay or a full channel
    fn cancel(&self) {
        self.clear();
        // notify_one keeps a permit if the producer is not parked yet
        self.wake.notify_one();
    }

    async fn cancelled(&self) {
        self.wake.notified().await
    }
}

/// What a production task did before exiting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductionSummary {
    /// Chunks pushed into the channel
    pub chunks_sent: usize,

    /// Chunks for which at least one observer failed
    pub observer_failures: usize,

    /// Production ended before the payload was exhausted
    pub stopped_early: bool,
}

/// Background half of a run
struct Producer {
    id: StreamId,
    source: ChunkSource,
    delay: Duration,
    flag: Arc<StreamingFlag>,
    tx: ChunkSender,
    observers: Option<ObserverRegistry>,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl Producer {
    async fn run(self, payload: Arc<str>) -> ProductionSummary {
        let mut summary = ProductionSummary::default();

        for item in self.source.split(self.id, &payload) {
            let Some(chunk) = item.into_chunk() else {
                break;
            };

            if !self.flag.is_set() {
                summary.stopped_early = true;
                break;
            }

            if let Some(observers) = &self.observers {
                if observers.deliver(&chunk, self.diagnostics.as_ref()) > 0 {
                    summary.observer_failures += 1;
                }
            }

            if !self.push(StreamItem::Chunk(chunk)).await {
                summary.stopped_early = true;
                break;
            }
            summary.chunks_sent += 1;
            metrics::counter!("chunkstream_chunks_total").increment(1);

            if !self.delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.delay) => {}
                    _ = self.flag.cancelled() => {}
                }
            }
        }

        self.finish(summary.stopped_early).await;

        if summary.stopped_early {
            debug!(stream_id = %self.id, chunks = summary.chunks_sent, "producer stopped early");
        } else {
            debug!(stream_id = %self.id, chunks = summary.chunks_sent, "producer finished");
        }
        summary
    }

    /// Push one item; false if the run was cancelled or the consumer is gone
    async fn push(&self, item: StreamItem) -> bool {
        tokio::select! {
            biased;
            pushed = self.tx.push(item) => pushed.is_ok(),
            _ = self.flag.cancelled() => false,
        }
    }

    async fn finish(&self, stopped: bool) {
        // After a stop nobody may be draining a full channel. Dropping the
        // sender reads as end of stream once the backlog is consumed.
        if stopped || !self.flag.is_set() {
            self.tx.try_push(StreamItem::EndOfStream);
        } else {
            self.push(StreamItem::EndOfStream).await;
        }
    }
}

/// Runs one payload at a time through a background producer
pub struct StreamRunner {
    id: StreamId,
    config: StreamConfig,
    source: ChunkSource,
    flag: Arc<StreamingFlag>,
    channel: Option<StreamChannel>,
    task: Option<JoinHandle<ProductionSummary>>,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl StreamRunner {
    /// Create a new idle runner
    ///
    /// # Errors
    /// `InvalidConfiguration` when the config fails validation
    pub fn new(config: StreamConfig) -> Result<Self> {
        config.validate()?;
        let source = ChunkSource::new(config.chunk_size)?;
        Ok(Self {
            id: StreamId::new(),
            config,
            source,
            flag: Arc::new(StreamingFlag::new(false)),
            channel: None,
            task: None,
            diagnostics: Arc::new(TracingSink),
        })
    }

    /// Route observer failures, stop timeouts and producer failures to `sink`
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Whether the consumer should keep draining
    pub fn is_streaming(&self) -> bool {
        self.flag.is_set()
    }

    /// Whether the background task is still running
    pub fn is_producing(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Begin streaming `payload` in the background and return immediately
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// `AlreadyRunning` if the previous run is still streaming
    pub fn start(&mut self, payload: impl Into<Arc<str>>) -> Result<()> {
        self.launch(payload.into(), None)
    }

    pub(crate) fn launch(
        &mut self,
        payload: Arc<str>,
        observers: Option<ObserverRegistry>,
    ) -> Result<()> {
        if self.is_streaming() {
            return Err(Error::AlreadyRunning(self.id));
        }

        // Fresh flag and channel per run, so a producer left over from a
        // timed-out stop can never be revived by a restart.
        let flag = Arc::new(StreamingFlag::new(true));
        let (tx, channel) = stream_channel(self.config.channel_capacity);

        debug!(
            stream_id = %self.id,
            chars = payload.chars().count(),
            chunk_size = self.source.chunk_size(),
            "starting stream"
        );

        let producer = Producer {
            id: self.id,
            source: self.source,
            delay: self.config.chunk_delay(),
            flag: flag.clone(),
            tx,
            observers,
            diagnostics: self.diagnostics.clone(),
        };

        self.flag = flag;
        self.channel = Some(channel);
        self.task = Some(tokio::spawn(producer.run(payload)));
        Ok(())
    }

    /// Pop the next chunk, waiting up to `timeout`
    ///
    /// Reading `EndOfStream` clears `is_streaming`. Once the end has been
    /// seen, and for a runner that was never started, this keeps returning
    /// `NextChunk::EndOfStream`.
    pub async fn next_chunk(&mut self, timeout: Duration) -> NextChunk {
        let Some(channel) = self.channel.as_mut() else {
            return NextChunk::EndOfStream;
        };
        if channel.is_finished() {
            return NextChunk::EndOfStream;
        }

        match channel.try_pop(timeout).await {
            Some(StreamItem::Chunk(chunk)) => NextChunk::Chunk(chunk),
            Some(StreamItem::EndOfStream) => {
                self.flag.clear();
                NextChunk::EndOfStream
            }
            None => NextChunk::Timeout,
        }
    }

    /// Drain the rest of the stream into one string
    ///
    /// Waits `poll_timeout` per read and keeps going through timeouts
    /// until the end of the stream.
    pub async fn collect(&mut self) -> String {
        let timeout = self.config.poll_timeout();
        let mut content = String::new();
        loop {
            match self.next_chunk(timeout).await {
                NextChunk::Chunk(chunk) => content.push_str(&chunk.content),
                NextChunk::Timeout => continue,
                NextChunk::EndOfStream => break,
            }
        }
        content
    }

    /// Cooperatively stop the current run
    ///
    /// Clears `is_streaming`, wakes the producer and waits up to
    /// `stop_timeout` for it to exit. Chunks already in the channel can
    /// still be read, followed by `EndOfStream`.
    ///
    /// # Errors
    /// `StopTimeout` if the producer is still running after the bound. The
    /// runner is non-streaming regardless and the task is left to finish
    /// on its own.
    pub async fn stop(&mut self) -> Result<()> {
        self.flag.cancel();

        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };

        let waited = self.config.stop_timeout();
        match tokio::time::timeout(waited, task).await {
            Ok(Ok(summary)) => {
                debug!(stream_id = %self.id, chunks = summary.chunks_sent, "stream stopped");
                self.task = None;
                Ok(())
            }
            Ok(Err(join_error)) => {
                // The channel already reads as ended once the sender is gone
                self.task = None;
                self.report_failure(join_error);
                Ok(())
            }
            Err(_) => {
                let diagnostic = Diagnostic::StopTimeout {
                    stream_id: self.id,
                    waited,
                };
                self.diagnostics.report(diagnostic.clone());
                Err(diagnostic.into())
            }
        }
    }

    /// Wait for the background task and return its summary
    ///
    /// Returns `None` if nothing was started, the task already reported, or
    /// the task failed. A failed task is reported as
    /// [`Diagnostic::ProducerFailure`].
    pub async fn join(&mut self) -> Option<ProductionSummary> {
        let task = self.task.take()?;
        match task.await {
            Ok(summary) => Some(summary),
            Err(join_error) => {
                self.report_failure(join_error);
                None
            }
        }
    }

    fn report_failure(&self, join_error: JoinError) {
        let message = if join_error.is_panic() {
            format!("panicked: {}", panic_message(&*join_error.into_panic()))
        } else {
            join_error.to_string()
        };
        self.diagnostics.report(Diagnostic::ProducerFailure {
            stream_id: self.id,
            message,
        });
    }
}

impl Drop for StreamRunner {
    fn drop(&mut self) {
        self.flag.cancel();
    }
}

impl std::fmt::Debug for StreamRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRunner")
            .field("id", &self.id)
            .field("is_streaming", &self.is_streaming())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingSink;

    const WAIT: Duration = Duration::from_secs(2);

    /// Panics on observer failures, records everything else
    struct CrashingSink(CollectingSink);

    impl DiagnosticsSink for CrashingSink {
        fn report(&self, diagnostic: Diagnostic) {
            if matches!(diagnostic, Diagnostic::ObserverFailure { .. }) {
                panic!("sink exploded");
            }
            self.0.report(diagnostic);
        }
    }

    async fn drain(runner: &mut StreamRunner) -> Vec<String> {
        let mut chunks = Vec::new();
        loop {
            match runner.next_chunk(WAIT).await {
                NextChunk::Chunk(chunk) => chunks.push(chunk.content),
                NextChunk::Timeout => panic!("stream stalled"),
                NextChunk::EndOfStream => return chunks,
            }
        }
    }

    #[tokio::test]
    async fn test_streams_hello_world_in_order() {
        let mut runner = StreamRunner::new(StreamConfig::immediate(3)).unwrap();
        runner.start("HELLO WORLD").unwrap();
        assert!(runner.is_streaming());

        assert_eq!(drain(&mut runner).await, vec!["HEL", "LO ", "WOR", "LD"]);
        assert!(!runner.is_streaming());
    }

    #[tokio::test]
    async fn test_end_of_stream_is_idempotent() {
        let mut runner = StreamRunner::new(StreamConfig::immediate(4)).unwrap();
        runner.start("abc").unwrap();
        assert_eq!(drain(&mut runner).await, vec!["abc"]);

        for _ in 0..3 {
            assert_eq!(runner.next_chunk(Duration::ZERO).await, NextChunk::EndOfStream);
        }
    }

    #[tokio::test]
    async fn test_unstarted_runner_reports_end() {
        let mut runner = StreamRunner::new(StreamConfig::default()).unwrap();
        assert!(!runner.is_streaming());
        assert_eq!(runner.next_chunk(Duration::ZERO).await, NextChunk::EndOfStream);
        assert!(runner.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_start_while_streaming_fails() {
        let config = StreamConfig::default().with_delay(Duration::from_millis(50));
        let mut runner = StreamRunner::new(config).unwrap();
        runner.start("a long enough payload").unwrap();

        let err = runner.start("again").unwrap_err();
        assert!(matches!(err, Error::AlreadyRunning(id) if id == runner.id()));
        runner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_after_completion() {
        let mut runner = StreamRunner::new(StreamConfig::immediate(2)).unwrap();
        runner.start("abcd").unwrap();
        assert_eq!(runner.collect().await, "abcd");

        runner.start("wxyz").unwrap();
        assert_eq!(runner.collect().await, "wxyz");
    }

    #[tokio::test]
    async fn test_empty_payload_ends_immediately() {
        let mut runner = StreamRunner::new(StreamConfig::immediate(5)).unwrap();
        runner.start("").unwrap();
        assert_eq!(runner.next_chunk(WAIT).await, NextChunk::EndOfStream);
        assert!(!runner.is_streaming());
    }

    #[tokio::test]
    async fn test_timeout_is_distinct_from_end() {
        let config = StreamConfig::immediate(1).with_delay(Duration::from_millis(200));
        let mut runner = StreamRunner::new(config).unwrap();
        runner.start("ab").unwrap();

        assert!(runner.next_chunk(WAIT).await.content().is_some());
        assert_eq!(runner.next_chunk(Duration::ZERO).await, NextChunk::Timeout);
        assert!(runner.is_streaming());
        runner.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_ends_stream_early() {
        let config = StreamConfig::immediate(1).with_delay(Duration::from_millis(20));
        let mut runner = StreamRunner::new(config).unwrap();
        runner.start("abcdefghijklmnopqrstuvwxyz").unwrap();

        assert!(runner.next_chunk(WAIT).await.content().is_some());
        runner.stop().await.unwrap();
        assert!(!runner.is_streaming());
        assert!(!runner.is_producing());

        let rest = drain(&mut runner).await;
        assert!(rest.len() < 25, "stop did not cut the stream short");
    }

    #[tokio::test]
    async fn test_stop_wakes_producer_blocked_on_full_channel() {
        let config = StreamConfig::immediate(1).with_capacity(1);
        let mut runner = StreamRunner::new(config).unwrap();
        runner.start("abcdef").unwrap();

        // Let the producer fill the channel and park on the next push
        tokio::time::sleep(Duration::from_millis(20)).await;
        runner.stop().await.unwrap();

        assert_eq!(runner.next_chunk(WAIT).await.content(), Some("a"));
        assert_eq!(runner.next_chunk(WAIT).await, NextChunk::EndOfStream);
    }

    #[tokio::test]
    async fn test_join_reports_summary() {
        let mut runner = StreamRunner::new(StreamConfig::immediate(2)).unwrap();
        runner.start("abcde").unwrap();

        let summary = runner.join().await.unwrap();
        assert_eq!(summary.chunks_sent, 3);
        assert!(!summary.stopped_early);
        assert_eq!(runner.collect().await, "abcde");
    }

    #[tokio::test]
    async fn test_join_reports_crashed_producer() {
        let diagnostics = CollectingSink::new();
        let registry = ObserverRegistry::new();
        registry.register(Arc::new(crate::observer::FnObserver::new(
            "rejects",
            |_: &crate::Chunk| anyhow::bail!("rejected"),
        )));

        // A sink that panics on observer failures takes the producer down with it
        let sink = CrashingSink(diagnostics.clone());
        let mut runner = StreamRunner::new(StreamConfig::immediate(2))
            .unwrap()
            .with_diagnostics(Arc::new(sink));
        runner.launch(Arc::from("aabb"), Some(registry)).unwrap();

        assert_eq!(runner.next_chunk(WAIT).await, NextChunk::EndOfStream);
        assert!(runner.join().await.is_none());

        let events = diagnostics.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            Diagnostic::ProducerFailure { stream_id, message }
                if *stream_id == runner.id() && message.contains("sink exploded")
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            StreamRunner::new(StreamConfig::immediate(0)),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
