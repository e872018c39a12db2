//! `RIFF`/`RF64` container header and the `WAVE` form type

use std::io::Write;

use binrw::BinWriterExt;

use crate::chunk::{Chunk, ChunkCore, ChunkRole, Placement, ReadPolicy, SizeTable};
use crate::error::RiffResult;
use crate::id::ChunkId;
use crate::io::AudioFile;

/// Outer container chunk
///
/// Its length covers the form type and every chunk after it. Reading leaves
/// the file positioned on the form type.
#[derive(Debug)]
pub struct RiffChunk {
    core: ChunkCore,
}

impl RiffChunk {
    /// Container header; `RF64` marks it as already promoted
    pub fn new(id: ChunkId) -> Self {
        let mut core = ChunkCore::new(ChunkId::RIFF, Placement::BeforePayload);
        core.set_rf64(id == ChunkId::RF64);
        Self { core }
    }
}

impl Chunk for RiffChunk {
    fn core(&self) -> &ChunkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ChunkCore {
        &mut self.core
    }

    fn on_disk_id(&self) -> ChunkId {
        if self.core.is_rf64() {
            ChunkId::RF64
        } else {
            ChunkId::RIFF
        }
    }

    fn role(&self) -> ChunkRole {
        ChunkRole::Container
    }

    fn read_policy(&self) -> ReadPolicy {
        ReadPolicy::Positioned
    }

    fn rf64_capable(&self) -> bool {
        true
    }

    fn write_empty(&self) -> bool {
        true
    }

    /// The payload is the rest of the file, so only the header is written
    fn write(&mut self, file: &mut AudioFile) -> RiffResult<()> {
        let field = if self.core.is_rf64() {
            u32::MAX
        } else {
            u32::try_from(self.core.length()).unwrap_or(u32::MAX)
        };
        file.write_all(self.on_disk_id().bytes())?;
        file.write_le(&field)?;
        Ok(())
    }
}

/// `WAVE` form type: four bytes, no length field
#[derive(Debug)]
pub struct FormTypeChunk {
    core: ChunkCore,
}

impl FormTypeChunk {
    /// Form type chunk for `id`
    pub fn new(id: ChunkId) -> Self {
        Self {
            core: ChunkCore::new(id, Placement::BeforePayload),
        }
    }
}

impl Chunk for FormTypeChunk {
    fn core(&self) -> &ChunkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ChunkCore {
        &mut self.core
    }

    fn role(&self) -> ChunkRole {
        ChunkRole::FormType
    }

    fn write_empty(&self) -> bool {
        true
    }

    fn length_on_file(&self) -> u64 {
        4
    }

    fn read(&mut self, file: &mut AudioFile, _sizes: Option<&dyn SizeTable>) -> RiffResult<()> {
        self.core.set_data_offset(file.position());
        Ok(())
    }

    fn write(&mut self, file: &mut AudioFile) -> RiffResult<()> {
        file.write_all(self.core.id().bytes())?;
        Ok(())
    }
}
