//! Core types for ChunkStream

use std::fmt;
use uuid::Uuid;

/// Identity of a single stream run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(Uuid);

impl StreamId {
    /// Create a fresh random stream identity
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First group is enough to tell streams apart in logs
        let full = self.0.simple().to_string();
        f.write_str(&full[..8])
    }
}

/// One bounded slice of a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Stream this chunk belongs to
    pub stream_id: StreamId,

    /// Zero-based position within the stream
    pub seq: usize,

    /// The text content
    pub content: String,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(stream_id: StreamId, seq: usize, content: impl Into<String>) -> Self {
        Self {
            stream_id,
            seq,
            content: content.into(),
        }
    }
}

/// Item carried by a stream channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// Content chunk
    Chunk(Chunk),

    /// No further chunks will arrive
    EndOfStream,
}

impl StreamItem {
    /// Check if this is the end sentinel
    pub fn is_end(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }

    /// Get the chunk if this is a content item
    pub fn into_chunk(self) -> Option<Chunk> {
        match self {
            Self::Chunk(chunk) => Some(chunk),
            Self::EndOfStream => None,
        }
    }
}

/// Outcome of polling a runner for its next chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextChunk {
    /// A chunk arrived
    Chunk(Chunk),

    /// Nothing arrived within the timeout; the stream may still be live
    Timeout,

    /// The stream has ended; repeated polls keep returning this
    EndOfStream,
}

impl NextChunk {
    /// Get the text content if a chunk arrived
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Chunk(chunk) => Some(&chunk.content),
            _ => None,
        }
    }

    /// Check if this is the end signal
    pub fn is_end(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }

    /// Check if the poll timed out
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}
