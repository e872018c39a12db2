//! The container orchestrator
//!
//! [`RiffFile`] owns the open file handle and the ordered chunk list. It
//! drives the read of an existing container and the two-phase write of a
//! new one: a provisional write at create time that fixes where the sample
//! payload starts, and a finalize write at close time once every length is
//! known and the RF64 promotion has been decided.

use std::collections::HashMap;
use std::fmt;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

use binrw::BinReaderExt;
use tracing::{debug, error, info, warn};

use crate::chunk::{Chunk, ChunkRole, HEADER_SIZE, MAX_CHUNK_LENGTH, Placement};
use crate::chunks::{FmtChunk, GenericChunk};
use crate::config::FileOptions;
use crate::error::{RiffError, RiffResult};
use crate::format::{SampleFormat, SoundFormat};
use crate::id::ChunkId;
use crate::io::{AudioFile, read_full};
use crate::registry;
use crate::sample::Sample;
use crate::samples::{SampleStream, Window};

/// Chunks every written container starts with, in creation order
const STRUCTURAL_CHUNKS: [ChunkId; 5] = [
    ChunkId::RIFF,
    ChunkId::WAVE,
    ChunkId::DS64,
    ChunkId::FMT,
    ChunkId::DATA,
];

/// Open state of a [`RiffFile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// No file open
    Closed,
    /// Existing container opened read-only
    Reading,
    /// New container being written
    Writing,
}

/// Hooks for layers built on top of the container
///
/// Every method has a no-op default. The extension is detached from the
/// file while a hook runs, so hooks receiving the file may freely add or
/// inspect chunks.
pub trait FileExtension: Send {
    /// Called for every chunk materialized while opening
    fn process_chunk(&mut self, _chunk: &dyn Chunk) {}

    /// Called once all chunks have been read
    fn post_read_chunks(&mut self, _file: &mut RiffFile) -> RiffResult<()> {
        Ok(())
    }

    /// Called at create time, before the provisional write
    fn create_extra_chunks(&mut self, _file: &mut RiffFile) -> RiffResult<()> {
        Ok(())
    }

    /// Called at close time, before final lengths are computed
    fn before_close(&mut self, _file: &mut RiffFile) -> RiffResult<()> {
        Ok(())
    }

    /// Called with the payload-relative frame after reads, writes and seeks
    fn sample_position_changed(&mut self, _position: u64) {}
}

/// A WAVE/RF64 container opened for reading or writing
pub struct RiffFile {
    options: FileOptions,
    file: Option<AudioFile>,
    mode: FileMode,
    chunks: Vec<Box<dyn Chunk>>,
    lookup: HashMap<ChunkId, usize>,
    container: Option<usize>,
    format: Option<usize>,
    payload: Option<usize>,
    size_table: Option<usize>,
    extension: Option<Box<dyn FileExtension>>,
    provisional_written: bool,
}

impl Default for RiffFile {
    fn default() -> Self {
        Self::with_options(FileOptions::default())
    }
}

impl RiffFile {
    /// Closed container with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Closed container with `options`
    pub fn with_options(options: FileOptions) -> Self {
        Self {
            options,
            file: None,
            mode: FileMode::Closed,
            chunks: Vec::new(),
            lookup: HashMap::new(),
            container: None,
            format: None,
            payload: None,
            size_table: None,
            extension: None,
            provisional_written: false,
        }
    }

    /// Attach an extension
    #[must_use]
    pub fn with_extension<E: FileExtension + 'static>(mut self, extension: E) -> Self {
        self.extension = Some(Box::new(extension));
        self
    }

    /// Replace the extension, returning the previous one
    pub fn set_extension(
        &mut self,
        extension: Option<Box<dyn FileExtension>>,
    ) -> Option<Box<dyn FileExtension>> {
        std::mem::replace(&mut self.extension, extension)
    }

    /// Options in effect
    pub const fn options(&self) -> &FileOptions {
        &self.options
    }

    /// Current open state
    pub const fn mode(&self) -> FileMode {
        self.mode
    }

    /// True while a file is open
    pub fn is_open(&self) -> bool {
        self.mode != FileMode::Closed
    }

    /// Path of the open file
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(AudioFile::path)
    }

    /// Open an existing container read-only
    ///
    /// Any file already open is closed first. On failure the container is
    /// left closed.
    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> RiffResult<()> {
        self.close()?;
        let path = path.as_ref();
        let result = self.read_container(path);
        match &result {
            Ok(()) => info!(
                "Opened {}: {} chunks, {} frames",
                path.display(),
                self.chunks.len(),
                self.sample_length()
            ),
            Err(e) => {
                error!("Failed to open {}: {}", path.display(), e);
                self.reset();
            }
        }
        result
    }

    fn read_container(&mut self, path: &Path) -> RiffResult<()> {
        let mut file = AudioFile::open(path)?;

        let id: ChunkId = file.read_le()?;
        if !id.is_container() {
            return Err(RiffError::InvalidContainer(id));
        }
        let mut container = registry::create_for_read(id);
        container.read(&mut file, None)?;
        let start = file.position();
        let mut max = container.length();
        let container_index = self.push_chunk(container);

        let form: ChunkId = file.read_le()?;
        if form != ChunkId::WAVE {
            return Err(RiffError::InvalidFormType(form));
        }
        let mut form_chunk = registry::create_for_read(form);
        form_chunk.read(&mut file, None)?;
        self.push_chunk(form_chunk);

        self.mode = FileMode::Reading;

        while file.position() - start < max {
            let mut raw = [0u8; 4];
            let got = read_full(&mut file, &mut raw)?;
            if got == 0 {
                warn!(
                    "File ends at {} before the declared container length {}",
                    file.position(),
                    max
                );
                break;
            }
            let id = ChunkId::new(raw);
            if got < raw.len() {
                return Err(RiffError::Truncated {
                    id,
                    declared: raw.len() as u64,
                    available: got as u64,
                });
            }

            let mut chunk = registry::create_for_read(id);
            let sizes = self.size_table.and_then(|i| self.chunks[i].size_table());
            chunk.read(&mut file, sizes)?;

            if let Some(extension) = self.extension.as_mut() {
                extension.process_chunk(chunk.as_ref());
            }

            if let Some(table) = chunk.size_table()
                && max == MAX_CHUNK_LENGTH
            {
                max = table.riff_size();
                self.chunks[container_index].core_mut().set_length(max);
                debug!("Container length {} taken from ds64", max);
            }

            self.push_chunk(chunk);
        }

        let format = self
            .format
            .and_then(|i| self.chunks[i].sound_format())
            .ok_or(RiffError::NoFormat)?;
        let frames = self.options.buffer_frames();
        let stream = self.stream_mut().ok_or(RiffError::NoFormat)?;
        stream.set_buffer_frames(frames);
        stream.set_format(format);

        self.file = Some(file);
        self.call_extension(|extension, file| extension.post_read_chunks(file))
    }

    /// Create a new container and write its provisional header
    ///
    /// After this returns the payload offset is fixed and samples can be
    /// streamed with [`RiffFile::write_samples`].
    pub fn create<P: AsRef<Path>>(
        &mut self,
        path: P,
        sample_rate: u32,
        channels: u16,
        sample_format: SampleFormat,
    ) -> RiffResult<()> {
        self.close()?;
        let path = path.as_ref();
        let format = SoundFormat::new(sample_rate, channels, sample_format);
        let result = self.create_container(path, format);
        match &result {
            Ok(()) => info!(
                "Created {}: {} Hz, {} channels, {}",
                path.display(),
                sample_rate,
                channels,
                sample_format
            ),
            Err(e) => {
                error!("Failed to create {}: {}", path.display(), e);
                self.reset();
            }
        }
        result
    }

    fn create_container(&mut self, path: &Path, format: SoundFormat) -> RiffResult<()> {
        self.file = Some(AudioFile::create(path)?);
        self.mode = FileMode::Writing;

        for id in STRUCTURAL_CHUNKS {
            let chunk = registry::create_for_write(id)?;
            self.push_chunk(chunk);
        }

        let fmt = self.format.ok_or(RiffError::NoFormat)?;
        if let Some(chunk) = self.chunks[fmt].downcast_mut::<FmtChunk>() {
            chunk.set_extensible(self.options.extensible_format);
        }
        self.chunks[fmt].set_sound_format(format)?;

        let frames = self.options.buffer_frames();
        let stream = self.stream_mut().ok_or(RiffError::NoFormat)?;
        stream.set_buffer_frames(frames);
        stream.set_format(format);

        self.call_extension(|extension, file| extension.create_extra_chunks(file))?;

        let extra = self.chunks.len().saturating_sub(STRUCTURAL_CHUNKS.len());
        let count = u32::try_from(extra)
            .unwrap_or(u32::MAX)
            .saturating_add(self.options.ds64_spare_entries);
        if let Some(table) = self
            .size_table
            .and_then(|i| self.chunks[i].size_table_mut())
        {
            table.set_table_count(count);
        }

        self.write_chunks(false)?;
        self.provisional_written = true;

        if self.options.background_writing {
            self.enable_background_writing(true)?;
        }
        Ok(())
    }

    /// Finalize and close
    ///
    /// For a container being written this computes final lengths, decides
    /// RF64 promotion and rewrites every header. The container is closed
    /// even if finalizing fails. Closing a closed container does nothing.
    pub fn close(&mut self) -> RiffResult<()> {
        let result = match self.mode {
            FileMode::Writing => self.finalize(),
            FileMode::Reading | FileMode::Closed => Ok(()),
        };
        if self.is_open() {
            debug!("Closing {:?}", self.path());
        }
        self.reset();
        result
    }

    /// Close without finalizing
    ///
    /// A container being written keeps its provisional header.
    pub fn abort(&mut self) {
        if self.mode == FileMode::Writing {
            warn!("Abandoning {:?} without finalizing", self.path());
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.file = None;
        self.mode = FileMode::Closed;
        self.chunks.clear();
        self.lookup.clear();
        self.container = None;
        self.format = None;
        self.payload = None;
        self.size_table = None;
        self.provisional_written = false;
    }

    fn finalize(&mut self) -> RiffResult<()> {
        self.call_extension(|extension, file| extension.before_close(file))?;

        for chunk in &mut self.chunks {
            if chunk.role() != ChunkRole::Container {
                chunk.create_write_data()?;
            }
        }
        self.relocate_resized_chunks();

        let total: u64 = self
            .chunks
            .iter()
            .filter(|c| c.role() != ChunkRole::Container)
            .map(|c| c.length_on_file())
            .sum();

        let payload = self.payload.ok_or(RiffError::NoFormat)?;
        let data_length = self.chunks[payload].length();
        let frames = self.stream().map_or(0, SampleStream::total_frames);
        let oversized: Vec<(ChunkId, u64)> = self
            .chunks
            .iter()
            .filter(|c| matches!(c.role(), ChunkRole::Other | ChunkRole::Format))
            .filter(|c| c.length() >= MAX_CHUNK_LENGTH)
            .map(|c| (c.id(), c.length()))
            .collect();

        match self
            .size_table
            .and_then(|i| self.chunks[i].size_table_mut())
        {
            Some(table) => {
                table.set_chunk_size(ChunkId::RIFF, total);
                table.set_chunk_size(ChunkId::DATA, data_length);
                for (id, length) in oversized {
                    if !table.set_chunk_size(id, length) {
                        warn!("{}", RiffError::SizeTableFull(id));
                    }
                }
                table.set_sample_count(frames);
            }
            None if total >= MAX_CHUNK_LENGTH => {
                warn!("{}", RiffError::SizeTableFull(ChunkId::RIFF));
            }
            None => {}
        }

        if total >= MAX_CHUNK_LENGTH {
            info!(
                "Container body is {} bytes, promoting to RF64 ({} frames)",
                total, frames
            );
            for chunk in &mut self.chunks {
                chunk.enable_rf64();
            }
        }

        if let Some(index) = self.container {
            self.chunks[index].core_mut().set_length(total);
        }

        self.write_chunks(true)?;
        if let Some(file) = self.file.as_mut() {
            file.sync()?;
        }
        debug!("Finalized container: {} bytes after the header", total);
        Ok(())
    }

    /// Move before-payload chunks whose size changed since the provisional
    /// write behind the payload, leaving a `JUNK` filler in their old slot
    fn relocate_resized_chunks(&mut self) {
        let mut index = 0;
        while index < self.chunks.len() {
            let chunk = &self.chunks[index];
            let resized = match chunk.core().provisional_size() {
                Some(size) => size != chunk.length_on_file(),
                None => false,
            };
            if chunk.placement() != Placement::BeforePayload
                || chunk.role() == ChunkRole::Container
                || !resized
            {
                index += 1;
                continue;
            }

            let mut moved = self.chunks.remove(index);
            let provisional = moved.core().provisional_size().unwrap_or_default();
            warn!(
                "Chunk {} changed from {} to {} bytes after the provisional write, moving it after the payload",
                moved.id(),
                provisional,
                moved.length_on_file()
            );
            moved.core_mut().set_placement(Placement::AfterPayload);
            moved.core_mut().set_provisional_size(None);
            if provisional >= HEADER_SIZE {
                self.chunks
                    .insert(index, Box::new(GenericChunk::filler(provisional)));
                index += 1;
            }
            self.chunks.push(moved);
        }
        self.reindex();
    }

    /// Write the chunk list from the start of the file
    ///
    /// The provisional pass synthesizes payloads, sets the container length
    /// to the before-payload extent and records each chunk's on-disk size.
    /// The closing pass also writes the after-payload chunks.
    fn write_chunks(&mut self, closing: bool) -> RiffResult<()> {
        let file = self.file.as_mut().ok_or(RiffError::NotOpen)?;
        let background = file.set_background(false)?;
        file.seek(SeekFrom::Start(0))?;

        if !closing {
            for chunk in &mut self.chunks {
                chunk.create_write_data()?;
            }
            let extent: u64 = self
                .chunks
                .iter()
                .filter(|c| c.role() != ChunkRole::Container)
                .filter(|c| c.placement() != Placement::AfterPayload)
                .map(|c| c.length_on_file())
                .sum();
            if let Some(index) = self.container {
                self.chunks[index].core_mut().set_length(extent);
            }
        }

        for chunk in &mut self.chunks {
            if chunk.placement() == Placement::BeforePayload {
                let start = file.position();
                chunk.write(file)?;
                if !closing {
                    chunk
                        .core_mut()
                        .set_provisional_size(Some(file.position() - start));
                }
            }
        }
        for chunk in &mut self.chunks {
            if chunk.placement() == Placement::Payload {
                chunk.write(file)?;
            }
        }
        if closing {
            for chunk in &mut self.chunks {
                if chunk.placement() == Placement::AfterPayload {
                    chunk.write(file)?;
                }
            }
        } else {
            file.set_background(background)?;
        }
        Ok(())
    }

    fn push_chunk(&mut self, chunk: Box<dyn Chunk>) -> usize {
        let index = self.chunks.len();
        self.chunks.push(chunk);
        self.index_chunk(index);
        index
    }

    fn index_chunk(&mut self, index: usize) {
        let chunk = &self.chunks[index];
        self.lookup.entry(chunk.id()).or_insert(index);
        let slot = match chunk.role() {
            ChunkRole::Container => &mut self.container,
            ChunkRole::Format => &mut self.format,
            ChunkRole::Payload => &mut self.payload,
            ChunkRole::SizeTable => &mut self.size_table,
            ChunkRole::FormType | ChunkRole::Other => return,
        };
        slot.get_or_insert(index);
    }

    fn reindex(&mut self) {
        self.lookup.clear();
        self.container = None;
        self.format = None;
        self.payload = None;
        self.size_table = None;
        for index in 0..self.chunks.len() {
            self.index_chunk(index);
        }
    }

    fn require_writing(&self) -> RiffResult<()> {
        match self.mode {
            FileMode::Writing => Ok(()),
            FileMode::Reading => Err(RiffError::ReadOnly),
            FileMode::Closed => Err(RiffError::NotOpen),
        }
    }

    fn frames_written(&self) -> bool {
        self.stream().is_some_and(|s| s.total_bytes() > 0)
    }

    /// Redo the provisional write if a before-payload chunk changed size
    /// since it was last written, while the payload can still move
    fn refresh_provisional_layout(&mut self) -> RiffResult<()> {
        if !self.provisional_written {
            return Ok(());
        }
        let mut changed = false;
        for chunk in &mut self.chunks {
            if chunk.placement() != Placement::BeforePayload
                || chunk.role() == ChunkRole::Container
            {
                continue;
            }
            chunk.create_write_data()?;
            if chunk
                .core()
                .provisional_size()
                .is_some_and(|size| size != chunk.length_on_file())
            {
                debug!("Chunk {} resized before the first samples", chunk.id());
                changed = true;
            }
        }
        if changed {
            self.write_chunks(false)?;
        }
        Ok(())
    }

    fn insert_chunk(&mut self, mut chunk: Box<dyn Chunk>) -> RiffResult<usize> {
        if !self.provisional_written || chunk.placement() != Placement::BeforePayload {
            return Ok(self.push_chunk(chunk));
        }
        if self.frames_written() {
            warn!(
                "Chunk {} added after samples were written, placing it after the payload",
                chunk.id()
            );
            chunk.core_mut().set_placement(Placement::AfterPayload);
            return Ok(self.push_chunk(chunk));
        }
        let index = self.push_chunk(chunk);
        self.write_chunks(false)?;
        Ok(index)
    }

    /// Add a chunk of type `id` through the registry
    ///
    /// Structural chunks already exist in a container being written and
    /// are rejected.
    pub fn add_chunk(&mut self, id: ChunkId) -> RiffResult<&mut (dyn Chunk + 'static)> {
        self.require_writing()?;
        if id.is_structural() && self.index_of(id).is_some() {
            return Err(RiffError::DuplicateChunk(id));
        }
        let chunk = registry::create_for_write(id)?;
        let index = self.insert_chunk(chunk)?;
        debug!("Added chunk {}", id);
        Ok(self.chunks[index].as_mut())
    }

    /// Add a chunk of type `id` and downcast it to `T`
    pub fn add_chunk_as<T: Chunk>(&mut self, id: ChunkId) -> RiffResult<&mut T> {
        self.add_chunk(id)?
            .downcast_mut::<T>()
            .ok_or_else(|| RiffError::invalid_chunk(id, "registered type differs"))
    }

    /// Add a chunk of type `id` holding `data`
    ///
    /// `before_payload` chooses where it is written. Before-payload
    /// placement is downgraded once samples have been written.
    pub fn add_chunk_with_data(
        &mut self,
        id: ChunkId,
        data: &[u8],
        before_payload: bool,
    ) -> RiffResult<&mut (dyn Chunk + 'static)> {
        self.require_writing()?;
        if id.is_structural() {
            return Err(RiffError::DuplicateChunk(id));
        }
        let mut chunk = registry::create_for_write(id)?;
        chunk.set_data(data)?;
        let placement = if before_payload {
            Placement::BeforePayload
        } else {
            Placement::AfterPayload
        };
        chunk.core_mut().set_placement(placement);
        let index = self.insert_chunk(chunk)?;
        debug!("Added chunk {} with {} bytes", id, data.len());
        Ok(self.chunks[index].as_mut())
    }

    fn index_of(&self, id: ChunkId) -> Option<usize> {
        if id.is_container() {
            self.container
        } else {
            self.lookup.get(&id).copied()
        }
    }

    /// First chunk with `id`
    pub fn chunk(&self, id: ChunkId) -> Option<&(dyn Chunk + 'static)> {
        self.index_of(id).map(|i| self.chunks[i].as_ref())
    }

    /// First chunk with `id`, mutably
    pub fn chunk_mut(&mut self, id: ChunkId) -> Option<&mut (dyn Chunk + 'static)> {
        let index = self.index_of(id)?;
        Some(self.chunks[index].as_mut())
    }

    /// First chunk with `id`, downcast to `T`
    pub fn chunk_as<T: Chunk>(&self, id: ChunkId) -> Option<&T> {
        self.chunk(id)?.downcast_ref()
    }

    /// First chunk with `id`, mutably downcast to `T`
    pub fn chunk_as_mut<T: Chunk>(&mut self, id: ChunkId) -> Option<&mut T> {
        self.chunk_mut(id)?.downcast_mut()
    }

    /// All chunks in file order
    pub fn chunks(&self) -> impl Iterator<Item = &(dyn Chunk + 'static)> {
        self.chunks.iter().map(|c| &**c)
    }

    /// Number of chunks
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Payload of the first chunk with `id`, loading it from disk if needed
    ///
    /// `None` if there is no such chunk or it holds no buffered payload.
    pub fn chunk_data(&mut self, id: ChunkId) -> RiffResult<Option<&[u8]>> {
        let Some(index) = self.index_of(id) else {
            return Ok(None);
        };
        let file = self.file.as_mut().ok_or(RiffError::NotOpen)?;
        self.chunks[index].load_data(file)?;
        Ok(self.chunks[index].data())
    }

    /// Stored sample layout
    pub fn format(&self) -> Option<SoundFormat> {
        self.format.and_then(|i| self.chunks[i].sound_format())
    }

    /// Frames per second
    pub fn sample_rate(&self) -> Option<u32> {
        self.format().map(|f| f.sample_rate)
    }

    /// Channels per frame
    pub fn channels(&self) -> Option<u16> {
        self.format().map(|f| f.channels)
    }

    /// Stored bits per sample
    pub fn bits_per_sample(&self) -> Option<u16> {
        self.format().map(|f| f.bits_per_sample())
    }

    /// Stored bytes per sample
    pub fn bytes_per_sample(&self) -> Option<usize> {
        self.format().map(|f| f.bytes_per_sample())
    }

    /// Stored sample representation
    pub fn sample_format(&self) -> Option<SampleFormat> {
        self.format().map(|f| f.sample_format)
    }

    fn stream(&self) -> Option<&SampleStream> {
        self.payload.and_then(|i| self.chunks[i].samples())
    }

    fn stream_mut(&mut self) -> Option<&mut SampleStream> {
        let index = self.payload?;
        self.chunks[index].samples_mut()
    }

    fn notify_position(&mut self) {
        let position = self.stream().map_or(0, SampleStream::absolute_position);
        if let Some(extension) = self.extension.as_mut() {
            extension.sample_position_changed(position);
        }
    }

    /// Sample window
    pub fn window(&self) -> Option<Window> {
        self.stream().map(SampleStream::window)
    }

    /// Restrict reads and writes to a range of frames and channels
    ///
    /// Both ranges are clamped to the payload extent.
    pub fn set_window(&mut self, start: u64, length: u64, first_channel: u16, channels: u16) {
        if let Some(stream) = self.stream_mut() {
            stream.set_window(start, length, first_channel, channels);
            self.notify_position();
        }
    }

    /// Cursor, relative to the window start
    pub fn sample_position(&self) -> u64 {
        self.stream().map_or(0, SampleStream::position)
    }

    /// Cursor, relative to the payload start
    pub fn absolute_position(&self) -> u64 {
        self.stream().map_or(0, SampleStream::absolute_position)
    }

    /// Frames in the window
    pub fn sample_length(&self) -> u64 {
        self.stream().map_or(0, SampleStream::length)
    }

    /// Move the cursor within the window
    pub fn set_sample_position(&mut self, position: u64) {
        if let Some(stream) = self.stream_mut() {
            stream.set_position(position);
            self.notify_position();
        }
    }

    /// Move the cursor to a payload-relative frame
    pub fn set_absolute_position(&mut self, position: u64) {
        if let Some(stream) = self.stream_mut() {
            stream.set_absolute_position(position);
            self.notify_position();
        }
    }

    /// Cursor as time
    pub fn position_time(&self) -> Duration {
        self.stream()
            .map_or(Duration::ZERO, SampleStream::position_time)
    }

    /// Window length as time
    pub fn length_time(&self) -> Duration {
        self.stream().map_or(Duration::ZERO, SampleStream::length_time)
    }

    /// Cursor in seconds
    pub fn position_seconds(&self) -> f64 {
        self.position_time().as_secs_f64()
    }

    /// Window length in seconds
    pub fn length_seconds(&self) -> f64 {
        self.length_time().as_secs_f64()
    }

    /// Read up to `frames` frames into an interleaved buffer
    ///
    /// `dst` holds `dst_channels` channels per frame and the window's
    /// channels are placed from `dst_channel` onwards. Returns the frames
    /// read; a short count means the window ended or I/O failed.
    pub fn read_samples<S: Sample>(
        &mut self,
        dst: &mut [S],
        dst_channel: usize,
        dst_channels: usize,
        frames: usize,
    ) -> RiffResult<usize> {
        let file = self.file.as_mut().ok_or(RiffError::NotOpen)?;
        let index = self.payload.ok_or(RiffError::NoFormat)?;
        let stream = self.chunks[index]
            .samples_mut()
            .ok_or(RiffError::NoFormat)?;
        let read = stream.read(file, dst, dst_channel, dst_channels, frames)?;
        self.notify_position();
        Ok(read)
    }

    /// Read as many whole frames as fit `dst`, using the window's channels
    pub fn read_frames<S: Sample>(&mut self, dst: &mut [S]) -> RiffResult<usize> {
        let channels = usize::from(self.window().ok_or(RiffError::NoFormat)?.channels);
        if channels == 0 {
            return Ok(0);
        }
        self.read_samples(dst, 0, channels, dst.len() / channels)
    }

    /// Write up to `frames` frames from an interleaved buffer
    ///
    /// `src` holds `src_channels` channels per frame; channels from
    /// `src_channel` onwards go to the window's channels. The payload grows
    /// as frames are written past its end.
    pub fn write_samples<S: Sample>(
        &mut self,
        src: &[S],
        src_channel: usize,
        src_channels: usize,
        frames: usize,
    ) -> RiffResult<usize> {
        self.require_writing()?;
        if !self.frames_written() {
            self.refresh_provisional_layout()?;
        }
        let file = self.file.as_mut().ok_or(RiffError::NotOpen)?;
        let index = self.payload.ok_or(RiffError::NoFormat)?;
        let stream = self.chunks[index]
            .samples_mut()
            .ok_or(RiffError::NoFormat)?;
        let written = stream.write(file, src, src_channel, src_channels, frames)?;
        self.notify_position();
        Ok(written)
    }

    /// Write every whole frame in `src`, using the window's channels
    pub fn write_frames<S: Sample>(&mut self, src: &[S]) -> RiffResult<usize> {
        let channels = usize::from(self.window().ok_or(RiffError::NoFormat)?.channels);
        if channels == 0 {
            return Ok(0);
        }
        self.write_samples(src, 0, channels, src.len() / channels)
    }

    /// Hand sample writes to a worker thread, or stop doing so
    pub fn enable_background_writing(&mut self, enable: bool) -> RiffResult<()> {
        self.require_writing()?;
        if let Some(file) = self.file.as_mut() {
            file.set_background(enable)?;
        }
        Ok(())
    }

    fn call_extension<F>(&mut self, hook: F) -> RiffResult<()>
    where
        F: FnOnce(&mut dyn FileExtension, &mut Self) -> RiffResult<()>,
    {
        match self.extension.take() {
            Some(mut extension) => {
                let result = hook(extension.as_mut(), self);
                self.extension = Some(extension);
                result
            }
            None => Ok(()),
        }
    }
}

impl Drop for RiffFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("Finalizing on drop failed: {}", e);
        }
    }
}

impl fmt::Debug for RiffFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RiffFile")
            .field("path", &self.path())
            .field("mode", &self.mode)
            .field("chunks", &self.chunks.iter().map(|c| c.id()).collect::<Vec<_>>())
            .field("extension", &self.extension.is_some())
            .finish_non_exhaustive()
    }
}
