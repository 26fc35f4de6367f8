//! Property tests for payload chunking

use chunkstream_core::{ChunkSource, StreamId, StreamItem};
use proptest::prelude::*;

proptest! {
    #[test]
    fn concatenation_reproduces_payload(payload in ".{0,200}", size in 1usize..32) {
        let source = ChunkSource::new(size).unwrap();
        let items: Vec<StreamItem> = source.split(StreamId::new(), &payload).collect();

        // Exactly one sentinel, and it comes last
        prop_assert_eq!(items.iter().filter(|item| item.is_end()).count(), 1);
        prop_assert!(items.last().map(StreamItem::is_end).unwrap_or(false));

        let rebuilt: String = items
            .into_iter()
            .filter_map(StreamItem::into_chunk)
            .map(|chunk| chunk.content)
            .collect();
        prop_assert_eq!(rebuilt, payload);
    }

    #[test]
    fn chunk_count_is_ceiling(payload in ".{0,200}", size in 1usize..32) {
        let source = ChunkSource::new(size).unwrap();
        let chars = payload.chars().count();
        let expected = (chars + size - 1) / size;

        let chunks: Vec<_> = source
            .split(StreamId::new(), &payload)
            .filter_map(StreamItem::into_chunk)
            .collect();

        prop_assert_eq!(chunks.len(), expected);
        prop_assert_eq!(source.chunk_count(&payload), expected);
        let sizes_in_range = chunks.iter().all(|c| {
            let n = c.content.chars().count();
            n > 0 && n <= size
        });
        prop_assert!(sizes_in_range, "chunk size out of range for size {}", size);

        let seq_contiguous = chunks.iter().enumerate().all(|(i, c)| c.seq == i);
        prop_assert!(seq_contiguous, "sequence numbers not contiguous");
    }
}
