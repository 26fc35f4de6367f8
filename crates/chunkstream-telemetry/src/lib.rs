//! ChunkStream Telemetry
//!
//! Counters for stream volume and non-fatal failures.
//!
//! Provides:
//! - A metrics collector usable both as a chunk observer and as a
//!   diagnostics sink
//! - Point-in-time snapshots with derived rates

pub mod metrics;

pub use metrics::{MetricsCollector, MetricsSnapshot};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::metrics::{MetricsCollector, MetricsSnapshot};
}
