//! Process-wide chunk type registry
//!
//! Maps a chunk id to the factory that builds the [`Chunk`] handling it.
//! The built-in types are installed the first time the registry is touched.
//! Registering an id again replaces its factory, which is how applications
//! override a built-in type.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::chunk::Chunk;
use crate::chunks::{
    AxmlChunk, BextChunk, ChnaChunk, DataChunk, Ds64Chunk, FmtChunk, FormTypeChunk, GenericChunk,
    RiffChunk,
};
use crate::error::RiffResult;
use crate::id::ChunkId;

/// Builds a chunk for the id it is called with
pub type ChunkFactory = Arc<dyn Fn(ChunkId) -> Box<dyn Chunk> + Send + Sync>;

static REGISTRY: OnceLock<RwLock<HashMap<ChunkId, ChunkFactory>>> = OnceLock::new();

fn factory<C: Chunk>(build: fn(ChunkId) -> C) -> ChunkFactory {
    Arc::new(move |id| Box::new(build(id)) as Box<dyn Chunk>)
}

fn registry() -> &'static RwLock<HashMap<ChunkId, ChunkFactory>> {
    REGISTRY.get_or_init(|| {
        let mut map: HashMap<ChunkId, ChunkFactory> = HashMap::new();
        map.insert(ChunkId::RIFF, factory(RiffChunk::new));
        map.insert(ChunkId::RF64, factory(RiffChunk::new));
        map.insert(ChunkId::WAVE, factory(FormTypeChunk::new));
        map.insert(ChunkId::DS64, factory(Ds64Chunk::new));
        map.insert(ChunkId::FMT, factory(FmtChunk::new));
        map.insert(ChunkId::DATA, factory(DataChunk::new));
        map.insert(ChunkId::BEXT, factory(BextChunk::new));
        map.insert(ChunkId::CHNA, factory(ChnaChunk::new));
        map.insert(ChunkId::AXML, factory(AxmlChunk::new));
        debug!("Chunk registry initialized with {} types", map.len());
        RwLock::new(map)
    })
}

/// Register `factory` for `id`, replacing any previous registration
pub fn register<F>(id: ChunkId, factory: F)
where
    F: Fn(ChunkId) -> Box<dyn Chunk> + Send + Sync + 'static,
{
    let previous = registry().write().insert(id, Arc::new(factory));
    if previous.is_some() {
        debug!("Chunk type {} re-registered", id);
    }
}

/// True if `id` has a registered factory
pub fn is_registered(id: ChunkId) -> bool {
    registry().read().contains_key(&id)
}

fn lookup(id: ChunkId) -> Option<ChunkFactory> {
    registry().read().get(&id).cloned()
}

/// Chunk for an id met while reading; unknown ids get a [`GenericChunk`]
pub fn create_for_read(id: ChunkId) -> Box<dyn Chunk> {
    match lookup(id) {
        Some(build) => build(id),
        None => Box::new(GenericChunk::new(id)),
    }
}

/// Chunk added while writing, initialised for output
pub fn create_for_write(id: ChunkId) -> RiffResult<Box<dyn Chunk>> {
    let mut chunk = create_for_read(id);
    chunk.initialise_for_writing()?;
    Ok(chunk)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::chunk::ChunkRole;

    #[test]
    fn test_builtin_types() {
        assert_eq!(create_for_read(ChunkId::FMT).role(), ChunkRole::Format);
        assert_eq!(create_for_read(ChunkId::DATA).role(), ChunkRole::Payload);
        assert_eq!(create_for_read(ChunkId::DS64).role(), ChunkRole::SizeTable);
        assert_eq!(create_for_read(ChunkId::RF64).role(), ChunkRole::Container);
        assert!(create_for_read(ChunkId::BEXT).downcast_ref::<BextChunk>().is_some());
    }

    #[test]
    fn test_unknown_falls_back_to_generic() {
        let id = ChunkId::new(*b"zzz1");
        assert!(!is_registered(id));
        let chunk = create_for_read(id);
        assert_eq!(chunk.id(), id);
        assert!(chunk.downcast_ref::<GenericChunk>().is_some());
    }

    #[test]
    fn test_last_registration_wins() {
        let id = ChunkId::new(*b"zzz2");
        register(id, |id| Box::new(GenericChunk::new(id)));
        register(id, |id| Box::new(AxmlChunk::new(id)));
        assert!(is_registered(id));
        assert!(create_for_read(id).downcast_ref::<AxmlChunk>().is_some());
    }
}
