//! Engine configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single stream run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Maximum characters per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Delay after each chunk, modelling incremental arrival
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,

    /// Channel capacity
    /// - 0 = unbounded
    /// - N = producer waits once N items are buffered
    #[serde(default)]
    pub channel_capacity: usize,

    /// How long `stop` waits for the producer task
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// Timeout used by blocking consumers such as `collect`
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_delay_ms: default_chunk_delay_ms(),
            channel_capacity: 0,
            stop_timeout_ms: default_stop_timeout_ms(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl StreamConfig {
    /// Config with the given chunk size and no inter-chunk delay
    pub fn immediate(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            chunk_delay_ms: 0,
            ..Default::default()
        }
    }

    /// Set the inter-chunk delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the channel capacity (0 = unbounded)
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the stop timeout
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size must be positive"));
        }
        Ok(())
    }
}

/// Configuration for batch scheduling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Ceiling on simultaneously live runners
    #[serde(default = "default_max_concurrent_streams")]
    pub max_concurrent_streams: usize,

    /// Sleep after a rotation in which no runner made progress
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    /// Settings applied to every runner in the batch
    #[serde(default)]
    pub stream: StreamConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_streams: default_max_concurrent_streams(),
            idle_backoff_ms: default_idle_backoff_ms(),
            stream: StreamConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Config with the given concurrency ceiling and default stream settings
    pub fn with_concurrency(max_concurrent_streams: usize) -> Self {
        Self {
            max_concurrent_streams,
            ..Default::default()
        }
    }

    /// Replace the per-stream settings
    pub fn with_stream(mut self, stream: StreamConfig) -> Self {
        self.stream = stream;
        self
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_streams == 0 {
            return Err(Error::config("max_concurrent_streams must be positive"));
        }
        self.stream.validate()
    }
}

fn default_chunk_size() -> usize {
    10
}

fn default_chunk_delay_ms() -> u64 {
    100
}

fn default_stop_timeout_ms() -> u64 {
    1000
}

fn default_poll_timeout_ms() -> u64 {
    1000
}

fn default_max_concurrent_streams() -> usize {
    5
}

fn default_idle_backoff_ms() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(StreamConfig::default().validate().is_ok());
        assert!(BatchConfig::default().validate().is_ok());
        assert_eq!(StreamConfig::default().chunk_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = StreamConfig::immediate(0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = BatchConfig::with_concurrency(0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: BatchConfig =
            serde_json::from_str(r#"{"max_concurrent_streams": 2, "stream": {"chunk_size": 4}}"#)
                .unwrap();
        assert_eq!(config.max_concurrent_streams, 2);
        assert_eq!(config.stream.chunk_size, 4);
        assert_eq!(config.stream.chunk_delay_ms, 100);
        assert_eq!(config.idle_backoff_ms, 5);
    }
}
