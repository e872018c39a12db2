//! `data` payload chunk

use std::io::{Seek, SeekFrom};

use crate::chunk::{Chunk, ChunkCore, ChunkRole, Placement, ReadPolicy, SizeTable, read_chunk};
use crate::error::RiffResult;
use crate::id::ChunkId;
use crate::io::AudioFile;
use crate::samples::SampleStream;

/// The sample payload
///
/// Never buffered: reading records where it starts, writing rewrites only
/// the header and seeks over the samples already streamed to disk.
#[derive(Debug)]
pub struct DataChunk {
    core: ChunkCore,
    samples: SampleStream,
}

impl DataChunk {
    /// Payload chunk with an unbound sample stream
    pub fn new(id: ChunkId) -> Self {
        Self {
            core: ChunkCore::new(id, Placement::Payload),
            samples: SampleStream::default(),
        }
    }
}

impl Chunk for DataChunk {
    fn core(&self) -> &ChunkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ChunkCore {
        &mut self.core
    }

    fn role(&self) -> ChunkRole {
        ChunkRole::Payload
    }

    fn read_policy(&self) -> ReadPolicy {
        ReadPolicy::Skip
    }

    fn rf64_capable(&self) -> bool {
        true
    }

    fn write_empty(&self) -> bool {
        true
    }

    fn read(&mut self, file: &mut AudioFile, sizes: Option<&dyn SizeTable>) -> RiffResult<()> {
        read_chunk(self, file, sizes)?;
        self.samples
            .attach(self.core.data_offset(), self.core.length(), false);
        Ok(())
    }

    fn create_write_data(&mut self) -> RiffResult<()> {
        self.core.set_length(self.samples.total_bytes());
        Ok(())
    }

    fn write_payload(&mut self, file: &mut AudioFile) -> RiffResult<()> {
        let offset = file.position();
        self.samples.relocate(offset)?;
        self.core.set_data_offset(offset);
        file.seek(SeekFrom::Start(offset + self.core.length()))?;
        Ok(())
    }

    /// Sample bytes live on disk only
    fn load_data(&mut self, _file: &mut AudioFile) -> RiffResult<()> {
        Ok(())
    }

    fn samples(&self) -> Option<&SampleStream> {
        Some(&self.samples)
    }

    fn samples_mut(&mut self) -> Option<&mut SampleStream> {
        Some(&mut self.samples)
    }
}
