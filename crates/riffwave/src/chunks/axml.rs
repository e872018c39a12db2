//! `axml` XML metadata chunk

use std::borrow::Cow;

use crate::chunk::{Chunk, ChunkCore, ChunkRole, Placement, ReadPolicy};
use crate::id::ChunkId;

/// XML metadata, typically an ADM document
///
/// The buffer keeps one zero byte past the payload so the text is always
/// terminated.
#[derive(Debug)]
pub struct AxmlChunk {
    core: ChunkCore,
}

impl AxmlChunk {
    /// Empty document
    pub fn new(id: ChunkId) -> Self {
        Self {
            core: ChunkCore::new(id, Placement::AfterPayload).with_extra_bytes(1),
        }
    }

    /// Document text up to the first NUL
    pub fn xml(&self) -> Cow<'_, str> {
        let data = self.core.data().unwrap_or_default();
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        String::from_utf8_lossy(&data[..end])
    }

    /// Replace the document
    pub fn set_xml(&mut self, xml: &str) {
        self.core.replace_data(xml.as_bytes());
    }
}

impl Chunk for AxmlChunk {
    fn core(&self) -> &ChunkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ChunkCore {
        &mut self.core
    }

    fn role(&self) -> ChunkRole {
        ChunkRole::Other
    }

    fn read_policy(&self) -> ReadPolicy {
        ReadPolicy::Read
    }
}
