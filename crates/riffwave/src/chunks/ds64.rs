//! ds64 size-overflow table

use std::io::Cursor;

use binrw::{BinRead, BinWrite};
use tracing::debug;

use crate::chunk::{Chunk, ChunkCore, ChunkRole, Placement, ReadPolicy, SizeTable, read_chunk};
use crate::error::{RiffError, RiffResult};
use crate::id::ChunkId;
use crate::io::AudioFile;

/// Bytes ahead of the id table
const FIXED_SIZE: usize = 28;

/// One id table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct Ds64Entry {
    /// Chunk id; all zeros marks a free slot
    pub id: ChunkId,
    /// True chunk length
    pub size: u64,
}

/// ds64 payload
///
/// The 64-bit fields are stored as low/high 32-bit halves, which is the same
/// byte sequence as a little-endian `u64`.
#[derive(Debug, Clone, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct Ds64Table {
    /// Size of the container chunk
    pub riff_size: u64,
    /// Size of the payload chunk
    pub data_size: u64,
    /// Total sample frames
    pub sample_count: u64,
    /// Entries in the id table
    pub table_length: u32,
    /// Id table
    #[br(count = table_length)]
    pub entries: Vec<Ds64Entry>,
}

impl Ds64Table {
    /// Look up the size recorded for `id`
    pub fn size_of(&self, id: ChunkId) -> Option<u64> {
        if id.is_container() {
            return Some(self.riff_size);
        }
        if id == ChunkId::DATA {
            return Some(self.data_size);
        }
        self.entries.iter().find(|e| e.id == id).map(|e| e.size)
    }

    fn record(&mut self, id: ChunkId, size: u64) -> bool {
        if id.is_container() {
            self.riff_size = size;
            return true;
        }
        if id == ChunkId::DATA {
            self.data_size = size;
            return true;
        }

        let slot = match self.entries.iter().position(|e| e.id == id) {
            Some(index) => Some(index),
            None => self.entries.iter().position(|e| e.id.is_empty()),
        };
        match slot {
            Some(index) => {
                self.entries[index] = Ds64Entry { id, size };
                true
            }
            None => false,
        }
    }
}

/// The ds64 chunk
///
/// Written as `JUNK` until the file is promoted, so 32-bit readers skip it.
#[derive(Debug)]
pub struct Ds64Chunk {
    core: ChunkCore,
    table: Ds64Table,
    promoted: bool,
}

impl Ds64Chunk {
    /// Empty table with no id entries
    pub fn new(id: ChunkId) -> Self {
        let mut chunk = Self {
            core: ChunkCore::new(id, Placement::BeforePayload),
            table: Ds64Table::default(),
            promoted: false,
        };
        chunk.sync();
        chunk
    }

    /// Decoded table
    pub const fn table(&self) -> &Ds64Table {
        &self.table
    }

    /// Re-encode the table into the payload buffer
    fn sync(&mut self) {
        let capacity = FIXED_SIZE + self.table.entries.len() * 12;
        let mut bytes = Cursor::new(Vec::with_capacity(capacity));
        // Writing into a Vec cannot fail
        if self.table.write(&mut bytes).is_ok() {
            self.core.replace_data(&bytes.into_inner());
        }
    }
}

impl Chunk for Ds64Chunk {
    fn core(&self) -> &ChunkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ChunkCore {
        &mut self.core
    }

    fn on_disk_id(&self) -> ChunkId {
        if self.promoted {
            ChunkId::DS64
        } else {
            ChunkId::JUNK
        }
    }

    fn role(&self) -> ChunkRole {
        ChunkRole::SizeTable
    }

    fn read_policy(&self) -> ReadPolicy {
        ReadPolicy::Read
    }

    /// Takes its real id on promotion
    ///
    /// The table's own length field stays exact rather than
    /// saturated; readers never need the table to size itself.
    fn enable_rf64(&mut self) {
        self.promoted = true;
    }

    /// A table found on disk is by definition a promoted one
    fn read(&mut self, file: &mut AudioFile, sizes: Option<&dyn SizeTable>) -> RiffResult<()> {
        read_chunk(self, file, sizes)?;
        self.promoted = true;
        Ok(())
    }

    fn process_data(&mut self) -> RiffResult<()> {
        let data = self.core.data().unwrap_or_default();
        if data.len() < FIXED_SIZE {
            return Err(RiffError::invalid_chunk(
                ChunkId::DS64,
                format!("{} bytes, need at least {FIXED_SIZE}", data.len()),
            ));
        }
        self.table = Ds64Table::read(&mut Cursor::new(data)).map_err(|e| {
            RiffError::invalid_chunk(ChunkId::DS64, format!("table does not fit payload: {e}"))
        })?;
        debug!(
            "ds64: riff {} data {} samples {} entries {}",
            self.table.riff_size,
            self.table.data_size,
            self.table.sample_count,
            self.table.entries.len()
        );
        Ok(())
    }

    fn create_write_data(&mut self) -> RiffResult<()> {
        self.sync();
        Ok(())
    }

    fn size_table(&self) -> Option<&dyn SizeTable> {
        Some(self)
    }

    fn size_table_mut(&mut self) -> Option<&mut dyn SizeTable> {
        Some(self)
    }
}

impl SizeTable for Ds64Chunk {
    fn resolve(&self, id: ChunkId, declared: u32) -> u64 {
        if declared != u32::MAX {
            return u64::from(declared);
        }
        self.table.size_of(id).unwrap_or(u64::from(declared))
    }

    fn set_chunk_size(&mut self, id: ChunkId, length: u64) -> bool {
        let recorded = self.table.record(id, length);
        if recorded {
            self.sync();
        }
        recorded
    }

    fn set_sample_count(&mut self, frames: u64) {
        self.table.sample_count = frames;
        self.sync();
    }

    fn set_table_count(&mut self, count: u32) {
        self.table
            .entries
            .resize(count as usize, Ds64Entry::default());
        self.table.table_length = count;
        self.sync();
    }

    fn riff_size(&self) -> u64 {
        self.table.riff_size
    }
}
