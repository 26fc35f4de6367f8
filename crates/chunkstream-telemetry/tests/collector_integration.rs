//! MetricsCollector wired into live runners

use chunkstream_core::prelude::*;
use chunkstream_telemetry::MetricsCollector;
use std::sync::Arc;

#[tokio::test]
async fn test_collector_counts_stream_and_failures() {
    let metrics = MetricsCollector::new();
    let mut runner = CallbackStreamRunner::new(StreamConfig::immediate(4))
        .unwrap()
        .with_diagnostics(Arc::new(metrics.clone()));

    runner.add_observer(Arc::new(metrics.clone()));
    runner.add_fn("odd-chunks-fail", |chunk: &Chunk| {
        if chunk.seq % 2 == 1 {
            anyhow::bail!("odd chunk {}", chunk.seq);
        }
        Ok(())
    });

    runner.start("0123456789abcdef").unwrap();
    assert_eq!(runner.collect().await, "0123456789abcdef");

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.chunks, 4);
    assert_eq!(snapshot.chars, 16);
    assert_eq!(snapshot.streams_started, 1);
    assert_eq!(snapshot.observer_failures, 2);
    assert_eq!(snapshot.failure_rate(), 0.5);
}

#[tokio::test]
async fn test_collector_as_batch_observer() {
    let metrics = MetricsCollector::new();
    let config = BatchConfig::with_concurrency(2).with_stream(StreamConfig::immediate(3));
    let scheduler = BatchStreamScheduler::new(config)
        .unwrap()
        .with_diagnostics(Arc::new(metrics.clone()));
    scheduler.add_observer(Arc::new(metrics.clone()));

    let results = scheduler.process(&["abc", "defgh", "", "ij"]).await.unwrap();
    assert_eq!(results, vec!["abc", "defgh", "", "ij"]);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.chunks, 1 + 2 + 1);
    assert_eq!(snapshot.streams_started, 3);
    assert_eq!(snapshot.observer_failures, 0);
}
