//! Payload chunking
//!
//! Splits a payload into ordered, non-overlapping chunks of at most
//! `chunk_size` characters, always followed by a single end sentinel.
//! Sizes count Unicode scalar values so a chunk never splits a code point.

use crate::{Chunk, Error, Result, StreamId, StreamItem};
use std::iter::FusedIterator;

/// Splits payloads into bounded chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSource {
    chunk_size: usize,
}

impl ChunkSource {
    /// Create a new chunk source
    ///
    /// # Errors
    /// `InvalidConfiguration` when `chunk_size` is zero
    pub fn new(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::config("chunk_size must be positive"));
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Iterate the chunks of `payload`, ending with `StreamItem::EndOfStream`
    pub fn split<'a>(&self, stream_id: StreamId, payload: &'a str) -> Split<'a> {
        Split {
            stream_id,
            rest: payload,
            chunk_size: self.chunk_size,
            seq: 0,
            finished: false,
        }
    }

    /// Number of chunks `split` yields for `payload`, excluding the sentinel
    pub fn chunk_count(&self, payload: &str) -> usize {
        payload.chars().count().div_ceil(self.chunk_size)
    }
}

/// Iterator returned by [`ChunkSource::split`]
#[derive(Debug, Clone)]
pub struct Split<'a> {
    stream_id: StreamId,
    rest: &'a str,
    chunk_size: usize,
    seq: usize,
    finished: bool,
}

impl<'a> Iterator for Split<'a> {
    type Item = StreamItem;

    fn next(&mut self) -> Option<StreamItem> {
        if self.finished {
            return None;
        }

        if self.rest.is_empty() {
            self.finished = true;
            return Some(StreamItem::EndOfStream);
        }

        let boundary = self
            .rest
            .char_indices()
            .nth(self.chunk_size)
            .map(|(idx, _)| idx)
            .unwrap_or(self.rest.len());
        let (head, tail) = self.rest.split_at(boundary);
        self.rest = tail;

        let chunk = Chunk::new(self.stream_id, self.seq, head);
        self.seq += 1;
        Some(StreamItem::Chunk(chunk))
    }
}

impl FusedIterator for Split<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(source: &ChunkSource, payload: &str) -> Vec<String> {
        source
            .split(StreamId::new(), payload)
            .filter_map(StreamItem::into_chunk)
            .map(|c| c.content)
            .collect()
    }

    #[test]
    fn test_hello_world_chunks() {
        let source = ChunkSource::new(3).unwrap();
        let items: Vec<StreamItem> = source.split(StreamId::new(), "HELLO WORLD").collect();

        assert_eq!(items.len(), 5);
        assert!(items[4].is_end());
        assert_eq!(contents(&source, "HELLO WORLD"), vec!["HEL", "LO ", "WOR", "LD"]);
    }

    #[test]
    fn test_empty_payload_yields_only_end() {
        let source = ChunkSource::new(4).unwrap();
        let items: Vec<StreamItem> = source.split(StreamId::new(), "").collect();
        assert_eq!(items, vec![StreamItem::EndOfStream]);
        assert_eq!(source.chunk_count(""), 0);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        assert!(matches!(
            ChunkSource::new(0),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_sequence_numbers_and_identity() {
        let source = ChunkSource::new(2).unwrap();
        let id = StreamId::new();
        let chunks: Vec<Chunk> = source
            .split(id, "abcde")
            .filter_map(StreamItem::into_chunk)
            .collect();

        assert_eq!(chunks.iter().map(|c| c.seq).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(chunks.iter().all(|c| c.stream_id == id));
    }

    #[test]
    fn test_multibyte_characters_not_split() {
        let source = ChunkSource::new(2).unwrap();
        assert_eq!(contents(&source, "héllo✓"), vec!["hé", "ll", "o✓"]);
        assert_eq!(source.chunk_count("héllo✓"), 3);
    }

    #[test]
    fn test_iterator_is_fused() {
        let source = ChunkSource::new(8).unwrap();
        let mut split = source.split(StreamId::new(), "abc");
        assert!(split.next().is_some());
        assert_eq!(split.next(), Some(StreamItem::EndOfStream));
        assert_eq!(split.next(), None);
        assert_eq!(split.next(), None);
    }
}
