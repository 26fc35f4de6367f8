//! ChunkStream Core
//!
//! In-process engine for streaming opaque payloads chunk by chunk.
//!
//! This crate provides:
//! - A deterministic chunk source that splits payloads into bounded chunks
//! - A single-producer hand-off channel with an explicit end-of-stream signal
//! - Stream runners with start / poll / stop lifecycle on a background task
//! - Best-effort per-chunk observers with failure diagnostics
//! - A batch scheduler that bounds concurrent streams and keeps result order

pub mod callback;
pub mod channel;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod observer;
pub mod runner;
pub mod scheduler;
pub mod source;
pub mod types;

pub use callback::CallbackStreamRunner;
pub use channel::{stream_channel, ChunkSender, StreamChannel};
pub use config::{BatchConfig, StreamConfig};
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticsSink, TracingSink};
pub use error::{Error, Result};
pub use observer::{FnObserver, Observer, ObserverRegistry};
pub use runner::{ProductionSummary, StreamRunner};
pub use scheduler::{BatchReport, BatchStreamScheduler};
pub use source::ChunkSource;
pub use types::{Chunk, NextChunk, StreamId, StreamItem};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::callback::CallbackStreamRunner;
    pub use crate::config::{BatchConfig, StreamConfig};
    pub use crate::diagnostics::{Diagnostic, DiagnosticsSink};
    pub use crate::error::{Error, Result};
    pub use crate::observer::Observer;
    pub use crate::runner::StreamRunner;
    pub use crate::scheduler::BatchStreamScheduler;
    pub use crate::types::{Chunk, NextChunk, StreamId};
}
