//! Subcommand implementations

use crate::config::AppConfig;
use anyhow::Context;
use chunkstream_core::prelude::*;
use chunkstream_telemetry::MetricsCollector;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Stream one payload, printing each chunk as an observer sees it
pub async fn run_stream(
    config: &AppConfig,
    text: String,
    stop_after: Option<Duration>,
) -> anyhow::Result<String> {
    let metrics = MetricsCollector::new();
    let mut runner = CallbackStreamRunner::new(config.engine.stream.clone())?
        .with_diagnostics(Arc::new(metrics.clone()));

    runner.add_observer(Arc::new(metrics.clone()));
    runner.add_fn("printer", |chunk: &Chunk| {
        println!("[{:>3}] {}", chunk.seq, chunk.content);
        Ok(())
    });

    runner.start(text)?;
    let started = Instant::now();
    let poll = config.engine.stream.poll_timeout().min(Duration::from_millis(50));
    let mut content = String::new();
    let mut stopped = false;

    loop {
        if let Some(limit) = stop_after {
            if !stopped && started.elapsed() >= limit {
                stopped = true;
                info!(elapsed_ms = started.elapsed().as_millis() as u64, "stopping stream");
                if let Err(err) = runner.stop().await {
                    warn!(error = %err, "stream did not stop cleanly");
                }
            }
        }

        match runner.next_chunk(poll).await {
            NextChunk::Chunk(chunk) => content.push_str(&chunk.content),
            NextChunk::Timeout => continue,
            NextChunk::EndOfStream => break,
        }
    }

    let snapshot = metrics.snapshot();
    info!(
        chunks = snapshot.chunks,
        chars = snapshot.chars,
        observer_failures = snapshot.observer_failures,
        stopped,
        "stream complete"
    );
    Ok(content)
}

/// Stream every payload through the batch scheduler
pub async fn run_batch(
    config: &AppConfig,
    payloads: Vec<String>,
    max_concurrent: Option<usize>,
) -> anyhow::Result<Vec<String>> {
    let mut engine = config.engine.clone();
    if let Some(max) = max_concurrent {
        engine.max_concurrent_streams = max;
    }

    let metrics = MetricsCollector::new();
    let scheduler =
        BatchStreamScheduler::new(engine)?.with_diagnostics(Arc::new(metrics.clone()));
    scheduler.add_observer(Arc::new(metrics.clone()));

    let report = scheduler.process_with_report(&payloads).await?;
    info!(
        streams = report.results.len(),
        chunks = report.chunks_received,
        peak_concurrency = report.peak_concurrency,
        observer_failures = metrics.snapshot().observer_failures,
        "batch complete"
    );
    if !report.failed.is_empty() {
        anyhow::bail!("streams {:?} failed before finishing", report.failed);
    }
    Ok(report.results)
}

/// Payloads from a file, one per line
pub fn read_payloads(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read payloads from {}", path.display()))?;
    Ok(content.lines().map(str::to_string).collect())
}
