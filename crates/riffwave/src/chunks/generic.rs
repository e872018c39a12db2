//! Chunks without a registered type

use crate::chunk::{Chunk, ChunkCore, Placement};
use crate::id::ChunkId;

/// A chunk known only by id and length
///
/// Its payload is skipped when reading and can be loaded on demand.
#[derive(Debug)]
pub struct GenericChunk {
    core: ChunkCore,
}

impl GenericChunk {
    /// Empty chunk written ahead of the payload
    pub fn new(id: ChunkId) -> Self {
        Self {
            core: ChunkCore::new(id, Placement::BeforePayload),
        }
    }

    /// `JUNK` chunk occupying exactly `size_on_file` bytes
    ///
    /// `size_on_file` must be even and at least the header size.
    pub(crate) fn filler(size_on_file: u64) -> Self {
        let mut chunk = Self::new(ChunkId::JUNK);
        let length = size_on_file.saturating_sub(crate::chunk::HEADER_SIZE);
        chunk.core.set_length(length);
        chunk.core.set_provisional_size(Some(size_on_file));
        chunk
    }
}

impl Chunk for GenericChunk {
    fn core(&self) -> &ChunkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ChunkCore {
        &mut self.core
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filler_occupies_requested_size() {
        let filler = GenericChunk::filler(48);
        assert_eq!(filler.id(), ChunkId::JUNK);
        assert_eq!(filler.length(), 40);
        assert_eq!(filler.length_on_file(), 48);
        assert!(filler.data().is_none());
    }

    #[test]
    fn test_empty_chunk_is_not_written() {
        let chunk = GenericChunk::new(ChunkId::new(*b"LIST"));
        assert!(!chunk.should_write());
        assert_eq!(chunk.length_on_file(), 0);
    }
}
