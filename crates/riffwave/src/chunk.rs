//! Chunk contract and the shared read/write protocol
//!
//! Every chunk on disk is `{4-byte id, u32 little-endian length, payload,
//! pad byte if the length is odd}`. A [`Chunk`] implementation decides how
//! its payload is resolved when reading ([`ReadPolicy`]), where it sits
//! relative to the sample payload when writing ([`Placement`]), and how it
//! turns typed state into payload bytes.
//!
//! Payload bytes are always kept in file byte order. Typed chunks decode
//! them into host values in [`Chunk::process_data`] and encode back in
//! [`Chunk::create_write_data`] or in their setters.

use std::any::Any;
use std::fmt;
use std::io::{Read, Seek, SeekFrom, Write};

use binrw::{BinReaderExt, BinWriterExt};
use tracing::{debug, warn};

use crate::error::{RiffError, RiffResult};
use crate::format::SoundFormat;
use crate::id::ChunkId;
use crate::io::AudioFile;
use crate::samples::SampleStream;

/// Bytes taken by the id and length fields
pub const HEADER_SIZE: u64 = 8;

/// Saturation value of a 32-bit length field
pub const MAX_CHUNK_LENGTH: u64 = 0xFFFF_FFFF;

/// How a chunk's payload is resolved when reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPolicy {
    /// Record the payload offset and seek past it
    Skip,
    /// Leave the file positioned at the start of the payload for a nested reader
    Positioned,
    /// Read the payload into memory and decode it
    Read,
}

/// Where a chunk is written relative to the sample payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Written at create time and rewritten at close, ahead of the payload
    BeforePayload,
    /// The sample payload itself
    Payload,
    /// Written once at close, after the payload
    AfterPayload,
}

/// Role a chunk plays for the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkRole {
    /// `RIFF` / `RF64` header
    Container,
    /// `WAVE` form type
    FormType,
    /// ds64 size-overflow table
    SizeTable,
    /// Format descriptor
    Format,
    /// Sample payload
    Payload,
    /// Anything else
    Other,
}

/// True 64-bit sizes for chunks whose 32-bit length field is saturated
pub trait SizeTable {
    /// Resolve the real length of `id` given the length field read from disk
    fn resolve(&self, id: ChunkId, declared: u32) -> u64;

    /// Record the real length of `id`; false if the table has no slot for it
    fn set_chunk_size(&mut self, id: ChunkId, length: u64) -> bool;

    /// Record the total number of sample frames
    fn set_sample_count(&mut self, frames: u64);

    /// Resize the id table, keeping existing entries
    fn set_table_count(&mut self, count: u32);

    /// Size of the container chunk as recorded in the table
    fn riff_size(&self) -> u64;
}

/// State every chunk carries
#[derive(Debug, Clone)]
pub struct ChunkCore {
    id: ChunkId,
    length: u64,
    data_offset: u64,
    data: Option<Vec<u8>>,
    extra_bytes: usize,
    placement: Placement,
    rf64: bool,
    provisional_size: Option<u64>,
}

impl ChunkCore {
    /// New chunk state with no payload
    pub fn new(id: ChunkId, placement: Placement) -> Self {
        Self {
            id,
            length: 0,
            data_offset: 0,
            data: None,
            extra_bytes: 0,
            placement,
            rf64: false,
            provisional_size: None,
        }
    }

    /// Reserve `extra` zeroed bytes past the declared length of the buffer
    #[must_use]
    pub const fn with_extra_bytes(mut self, extra: usize) -> Self {
        self.extra_bytes = extra;
        self
    }

    /// Chunk identifier
    pub const fn id(&self) -> ChunkId {
        self.id
    }

    /// Declared payload length
    pub const fn length(&self) -> u64 {
        self.length
    }

    /// File offset of the payload
    pub const fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Payload bytes, if loaded or created
    pub fn data(&self) -> Option<&[u8]> {
        let len = usize::try_from(self.length).ok()?;
        self.data.as_deref().and_then(|d| d.get(..len))
    }

    /// Placement when writing
    pub const fn placement(&self) -> Placement {
        self.placement
    }

    /// True once promoted to RF64
    pub const fn is_rf64(&self) -> bool {
        self.rf64
    }

    /// On-disk size recorded by the provisional write
    pub const fn provisional_size(&self) -> Option<u64> {
        self.provisional_size
    }

    pub(crate) fn set_length(&mut self, length: u64) {
        self.length = length;
    }

    pub(crate) fn set_data_offset(&mut self, offset: u64) {
        self.data_offset = offset;
    }

    pub(crate) fn set_rf64(&mut self, rf64: bool) {
        self.rf64 = rf64;
    }

    pub(crate) fn set_placement(&mut self, placement: Placement) {
        self.placement = placement;
    }

    pub(crate) fn set_provisional_size(&mut self, size: Option<u64>) {
        self.provisional_size = size;
    }

    /// Replace the payload with `bytes`
    pub fn replace_data(&mut self, bytes: &[u8]) {
        let mut buffer = Vec::with_capacity(bytes.len() + self.extra_bytes);
        buffer.extend_from_slice(bytes);
        buffer.resize(bytes.len() + self.extra_bytes, 0);
        self.length = bytes.len() as u64;
        self.data = Some(buffer);
    }

    /// Grow the payload to `length` bytes, zero filling
    ///
    /// Existing bytes are kept. Shrinking is rejected.
    pub fn resize_data(&mut self, length: u64) -> RiffResult<()> {
        if length < self.length {
            return Err(RiffError::LengthMismatch {
                id: self.id,
                current: self.length,
                requested: length,
            });
        }
        let total = usize::try_from(length)
            .map_err(|_| RiffError::invalid_chunk(self.id, "payload too large for memory"))?
            + self.extra_bytes;
        self.data.get_or_insert_with(Vec::new).resize(total, 0);
        self.length = length;
        Ok(())
    }
}

/// A chunk type
///
/// Implementors provide access to their [`ChunkCore`] and override the
/// policy hooks they need. The provided methods implement the generic
/// read and write protocol.
pub trait Chunk: Any + Send + fmt::Debug {
    /// Shared chunk state
    fn core(&self) -> &ChunkCore;

    /// Mutable shared chunk state
    fn core_mut(&mut self) -> &mut ChunkCore;

    /// Chunk identifier
    fn id(&self) -> ChunkId {
        self.core().id()
    }

    /// Identifier written to disk, which may differ from [`Chunk::id`]
    fn on_disk_id(&self) -> ChunkId {
        self.id()
    }

    /// Declared payload length
    fn length(&self) -> u64 {
        self.core().length()
    }

    /// File offset of the payload
    fn data_offset(&self) -> u64 {
        self.core().data_offset()
    }

    /// Payload bytes, if loaded or created
    fn data(&self) -> Option<&[u8]> {
        self.core().data()
    }

    /// Role this chunk plays for the container
    fn role(&self) -> ChunkRole {
        ChunkRole::Other
    }

    /// How the payload is resolved when reading
    fn read_policy(&self) -> ReadPolicy {
        ReadPolicy::Skip
    }

    /// Placement when writing
    fn placement(&self) -> Placement {
        self.core().placement()
    }

    /// Whether the length field saturates once the file is promoted to RF64
    fn rf64_capable(&self) -> bool {
        false
    }

    /// Whether the chunk is written even with an empty payload
    fn write_empty(&self) -> bool {
        false
    }

    /// Whether the chunk is written at all
    fn should_write(&self) -> bool {
        self.length() > 0 || self.write_empty()
    }

    /// Bytes occupied on disk, header and pad byte included
    fn length_on_file(&self) -> u64 {
        if self.should_write() {
            let length = self.length();
            HEADER_SIZE + length + (length & 1)
        } else {
            0
        }
    }

    /// Notification that the file is being promoted to RF64
    fn enable_rf64(&mut self) {
        if self.rf64_capable() {
            self.core_mut().set_rf64(true);
        }
    }

    /// Called once when the chunk is created for writing
    fn initialise_for_writing(&mut self) -> RiffResult<()> {
        Ok(())
    }

    /// Synthesize payload bytes from in-memory state before writing
    fn create_write_data(&mut self) -> RiffResult<()> {
        Ok(())
    }

    /// Decode payload bytes into in-memory state after reading
    fn process_data(&mut self) -> RiffResult<()> {
        Ok(())
    }

    /// Read the length field and resolve the payload
    ///
    /// The identifier has already been consumed.
    fn read(&mut self, file: &mut AudioFile, sizes: Option<&dyn SizeTable>) -> RiffResult<()> {
        read_chunk(self, file, sizes)
    }

    /// Write header, payload and pad byte
    fn write(&mut self, file: &mut AudioFile) -> RiffResult<()> {
        write_chunk(self, file)
    }

    /// Write the payload bytes only
    fn write_payload(&mut self, file: &mut AudioFile) -> RiffResult<()> {
        write_buffered_payload(self, file)
    }

    /// Replace the payload and decode it
    fn set_data(&mut self, bytes: &[u8]) -> RiffResult<()> {
        self.core_mut().replace_data(bytes);
        self.process_data()
    }

    /// Overwrite the payload with bytes of exactly the same length
    fn update_data(&mut self, bytes: &[u8]) -> RiffResult<()> {
        let current = self.length();
        let requested = bytes.len() as u64;
        if current != requested {
            return Err(RiffError::LengthMismatch {
                id: self.id(),
                current,
                requested,
            });
        }
        self.set_data(bytes)
    }

    /// Load the payload from `file` if it has not been read yet
    fn load_data(&mut self, file: &mut AudioFile) -> RiffResult<()> {
        if self.data().is_none() && self.length() > 0 && self.data_offset() > 0 {
            file.seek(SeekFrom::Start(self.data_offset()))?;
            read_payload(self, file)?;
        }
        Ok(())
    }

    /// Format descriptor, for the format chunk
    fn sound_format(&self) -> Option<SoundFormat> {
        None
    }

    /// Set the format descriptor, for the format chunk
    fn set_sound_format(&mut self, _format: SoundFormat) -> RiffResult<()> {
        Err(RiffError::invalid_chunk(self.id(), "not a format chunk"))
    }

    /// Sample stream, for the payload chunk
    fn samples(&self) -> Option<&SampleStream> {
        None
    }

    /// Mutable sample stream, for the payload chunk
    fn samples_mut(&mut self) -> Option<&mut SampleStream> {
        None
    }

    /// Size table, for the ds64 chunk
    fn size_table(&self) -> Option<&dyn SizeTable> {
        None
    }

    /// Mutable size table, for the ds64 chunk
    fn size_table_mut(&mut self) -> Option<&mut dyn SizeTable> {
        None
    }
}

impl dyn Chunk {
    /// Downcast to a concrete chunk type
    pub fn downcast_ref<T: Chunk>(&self) -> Option<&T> {
        let any: &dyn Any = self;
        any.downcast_ref()
    }

    /// Mutably downcast to a concrete chunk type
    pub fn downcast_mut<T: Chunk>(&mut self) -> Option<&mut T> {
        let any: &mut dyn Any = self;
        any.downcast_mut()
    }
}

/// Generic read: length field, ds64 resolution, then the read policy
pub fn read_chunk<C: Chunk + ?Sized>(
    chunk: &mut C,
    file: &mut AudioFile,
    sizes: Option<&dyn SizeTable>,
) -> RiffResult<()> {
    let id = chunk.id();
    let declared: u32 = file.read_le()?;
    let length = match sizes {
        Some(table) if u64::from(declared) == MAX_CHUNK_LENGTH => table.resolve(id, declared),
        _ => u64::from(declared),
    };

    let offset = file.position();
    chunk.core_mut().set_length(length);
    chunk.core_mut().set_data_offset(offset);

    match chunk.read_policy() {
        ReadPolicy::Skip => {
            let available = file.len()?.saturating_sub(offset);
            if length > available {
                warn!(
                    "Chunk {} declares {} bytes but only {} remain",
                    id, length, available
                );
            }
            file.seek(SeekFrom::Start(offset + length + (length & 1)))?;
        }
        ReadPolicy::Positioned => {}
        ReadPolicy::Read => {
            let available = file.len()?.saturating_sub(offset);
            if length > available {
                return Err(RiffError::Truncated {
                    id,
                    declared: length,
                    available,
                });
            }
            read_payload(chunk, file)?;
            chunk.process_data()?;
            file.seek(SeekFrom::Start(offset + length + (length & 1)))?;
        }
    }

    debug!("Chunk {}: {} bytes at offset {}", id, length, offset);
    Ok(())
}

/// Read `length` bytes of payload from the current position
fn read_payload<C: Chunk + ?Sized>(chunk: &mut C, file: &mut AudioFile) -> RiffResult<()> {
    let id = chunk.id();
    let length = usize::try_from(chunk.length())
        .map_err(|_| RiffError::invalid_chunk(id, "payload too large for memory"))?;
    let mut bytes = vec![0u8; length];
    file.read_exact(&mut bytes)?;
    chunk.core_mut().replace_data(&bytes);
    Ok(())
}

/// Generic write: id, length field (saturated when needed), payload, pad byte
pub fn write_chunk<C: Chunk + ?Sized>(chunk: &mut C, file: &mut AudioFile) -> RiffResult<()> {
    if !chunk.should_write() {
        return Ok(());
    }

    let length = chunk.length();
    let field = if chunk.core().is_rf64() {
        u32::MAX
    } else {
        u32::try_from(length).unwrap_or(u32::MAX)
    };

    file.write_all(chunk.on_disk_id().bytes())?;
    file.write_le(&field)?;
    chunk.write_payload(file)?;
    if length & 1 == 1 {
        file.write_all(&[0])?;
    }
    Ok(())
}

/// Write the payload buffer, or zeros if there is none
pub fn write_buffered_payload<C: Chunk + ?Sized>(
    chunk: &mut C,
    file: &mut AudioFile,
) -> RiffResult<()> {
    if let Some(data) = chunk.data() {
        file.write_all(data)?;
        return Ok(());
    }

    let mut remaining = chunk.length();
    let zeros = [0u8; 4096];
    while remaining > 0 {
        let n = remaining.min(zeros.len() as u64) as usize;
        file.write_all(&zeros[..n])?;
        remaining -= n as u64;
    }
    Ok(())
}
