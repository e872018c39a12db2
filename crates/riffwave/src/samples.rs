//! Sample transcoding engine behind the payload chunk
//!
//! A [`SampleStream`] knows where the sample payload starts, how many frames
//! it holds and which sub-range ([`Window`]) the caller currently addresses.
//! Reads and writes move through a fixed-size scratch buffer and convert
//! each sample between its stored representation and the caller's type.
//!
//! I/O failures during a transfer are logged and end it early; the returned
//! frame count tells the caller how far it got. `Err` is reserved for calls
//! that cannot start at all.

use std::io::{Seek, SeekFrom, Write};
use std::time::Duration;

use tracing::{debug, error};

use crate::config::DEFAULT_SAMPLE_BUFFER_FRAMES;
use crate::error::{RiffError, RiffResult};
use crate::format::SoundFormat;
use crate::io::{AudioFile, read_full};
use crate::sample::{self, Sample};

/// Addressable sub-range of frames and channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    /// First frame, relative to the start of the payload
    pub start: u64,
    /// Frames in the window
    pub length: u64,
    /// First channel
    pub first_channel: u16,
    /// Channels in the window
    pub channels: u16,
}

/// Frame cursor and transcoder over the sample payload
#[derive(Debug)]
pub struct SampleStream {
    format: Option<SoundFormat>,
    payload_offset: u64,
    total_bytes: u64,
    total_frames: u64,
    window: Window,
    position: u64,
    scratch: Vec<u8>,
    scratch_frames: usize,
    attached: bool,
    writable: bool,
}

impl Default for SampleStream {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_BUFFER_FRAMES)
    }
}

impl SampleStream {
    /// Stream with a scratch buffer of `scratch_frames` frames
    pub fn new(scratch_frames: usize) -> Self {
        Self {
            format: None,
            payload_offset: 0,
            total_bytes: 0,
            total_frames: 0,
            window: Window::default(),
            position: 0,
            scratch: Vec::new(),
            scratch_frames: scratch_frames.max(1),
            attached: false,
            writable: false,
        }
    }

    /// Set the stored layout and reset the window to the full extent
    pub fn set_format(&mut self, format: SoundFormat) {
        self.format = Some(format);
        self.allocate_scratch();
        self.refresh_totals();
    }

    /// Change the scratch buffer size
    pub fn set_buffer_frames(&mut self, frames: usize) {
        self.scratch_frames = frames.max(1);
        self.allocate_scratch();
    }

    /// Bind the stream to a payload at `offset` holding `total_bytes`
    pub fn attach(&mut self, offset: u64, total_bytes: u64, writable: bool) {
        self.payload_offset = offset;
        self.total_bytes = total_bytes;
        self.attached = true;
        self.writable = writable;
        self.refresh_totals();
    }

    /// Move the payload start; only allowed while nothing has been written
    pub fn relocate(&mut self, offset: u64) -> RiffResult<()> {
        if !self.attached {
            self.attach(offset, 0, true);
            return Ok(());
        }
        if offset != self.payload_offset {
            if self.total_bytes > 0 {
                return Err(RiffError::LayoutChanged {
                    expected: self.payload_offset,
                    actual: offset,
                });
            }
            debug!(
                "Payload moved from {} to {} before any samples",
                self.payload_offset, offset
            );
            self.payload_offset = offset;
        }
        Ok(())
    }

    fn allocate_scratch(&mut self) {
        if let Some(format) = self.format {
            self.scratch = vec![0u8; self.scratch_frames * format.bytes_per_frame()];
        }
    }

    fn refresh_totals(&mut self) {
        let bpf = self.bytes_per_frame();
        self.total_frames = if bpf > 0 {
            self.total_bytes / bpf as u64
        } else {
            0
        };
        let channels = self.format.map_or(0, |f| f.channels);
        self.window = Window {
            start: 0,
            length: self.total_frames,
            first_channel: 0,
            channels,
        };
        self.position = 0;
    }

    fn bytes_per_frame(&self) -> usize {
        self.format.map_or(0, |f| f.bytes_per_frame())
    }

    /// Stored layout, once known
    pub const fn format(&self) -> Option<SoundFormat> {
        self.format
    }

    /// File offset of the first sample byte
    pub const fn payload_offset(&self) -> u64 {
        self.payload_offset
    }

    /// Payload bytes written or present
    pub const fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Whole frames in the payload
    pub const fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// True once bound to a payload
    pub const fn is_attached(&self) -> bool {
        self.attached
    }

    /// True if writes are accepted
    pub const fn is_writable(&self) -> bool {
        self.writable
    }

    /// Current window
    pub const fn window(&self) -> Window {
        self.window
    }

    /// Restrict the addressable range, clamped to the payload extent
    pub fn set_window(&mut self, start: u64, length: u64, first_channel: u16, channels: u16) {
        let total_channels = self.format.map_or(0, |f| f.channels);
        let start = start.min(self.total_frames);
        let first_channel = first_channel.min(total_channels);
        self.window = Window {
            start,
            length: length.min(self.total_frames - start),
            first_channel,
            channels: channels.min(total_channels - first_channel),
        };
        self.position = self.position.min(self.window.length);
    }

    /// Cursor, relative to the window start
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Cursor, relative to the payload start
    pub const fn absolute_position(&self) -> u64 {
        self.window.start + self.position
    }

    /// Frames addressable through the window
    pub const fn length(&self) -> u64 {
        self.window.length
    }

    /// Move the cursor, clamped to the window
    pub fn set_position(&mut self, position: u64) {
        self.position = position.min(self.window.length);
    }

    /// Move the cursor to a payload-relative frame
    pub fn set_absolute_position(&mut self, position: u64) {
        self.set_position(position.saturating_sub(self.window.start));
    }

    /// Cursor as time
    pub fn position_time(&self) -> Duration {
        self.frames_to_time(self.position)
    }

    /// Window length as time
    pub fn length_time(&self) -> Duration {
        self.frames_to_time(self.window.length)
    }

    #[allow(clippy::cast_precision_loss)]
    fn frames_to_time(&self, frames: u64) -> Duration {
        match self.format {
            Some(format) if format.sample_rate > 0 => {
                Duration::from_secs_f64(frames as f64 / f64::from(format.sample_rate))
            }
            _ => Duration::ZERO,
        }
    }

    fn ready(&self) -> RiffResult<SoundFormat> {
        match self.format {
            Some(format) if self.attached && !self.scratch.is_empty() => Ok(format),
            _ => Err(RiffError::NoFormat),
        }
    }

    /// Read up to `frames` frames into `dst`
    ///
    /// `dst` is interleaved with `dst_channels` channels per frame; window
    /// channels land from `dst_channel` onwards. Returns the frames read,
    /// which is short at the end of the window or after an I/O failure.
    pub fn read<S: Sample>(
        &mut self,
        file: &mut AudioFile,
        dst: &mut [S],
        dst_channel: usize,
        dst_channels: usize,
        frames: usize,
    ) -> RiffResult<usize> {
        let format = self.ready()?;
        let bpf = format.bytes_per_frame();
        let bps = format.bytes_per_sample();

        let remaining = self.window.length.saturating_sub(self.position);
        let mut frames = frames.min(usize::try_from(remaining).unwrap_or(usize::MAX));
        if dst_channels > 0 {
            frames = frames.min(dst.len() / dst_channels);
        }
        let dst_channel = dst_channel.min(dst_channels);
        let channels = usize::from(self.window.channels).min(dst_channels - dst_channel);

        if channels == 0 {
            self.position += frames as u64;
            return Ok(frames);
        }

        let first = usize::from(self.window.first_channel);
        let mut done = 0;
        while done < frames {
            let block = (frames - done).min(self.scratch_frames);
            let offset = self.frame_offset(bpf);

            if let Err(e) = file.seek(SeekFrom::Start(offset)) {
                error!("Seek to sample data at {} failed: {}", offset, e);
                break;
            }

            let scratch = &mut self.scratch[..block * bpf];
            let got = match read_full(file, scratch) {
                Ok(bytes) => bytes / bpf,
                Err(e) => {
                    error!("Reading {} frames at {} failed: {}", block, offset, e);
                    break;
                }
            };
            if got == 0 {
                debug!(
                    "Sample data ended at frame {}",
                    self.window.start + self.position
                );
                break;
            }

            for (f, frame) in scratch.chunks_exact(bpf).take(got).enumerate() {
                let base = (done + f) * dst_channels + dst_channel;
                for (c, out) in dst[base..base + channels].iter_mut().enumerate() {
                    let at = (first + c) * bps;
                    let value = sample::decode(&frame[at..], format.sample_format, format.big_endian);
                    *out = S::from_value(value);
                }
            }

            done += got;
            self.position += got as u64;
            if got < block {
                break;
            }
        }

        Ok(done)
    }

    /// Write up to `frames` frames from `src`
    ///
    /// `src` is interleaved with `src_channels` channels per frame; channels
    /// from `src_channel` onwards land in the window channels. When fewer
    /// than all stored channels are written the existing frames are read
    /// back first so the other channels keep their values. Writing extends
    /// the payload; the recorded totals grow to the furthest frame written.
    pub fn write<S: Sample>(
        &mut self,
        file: &mut AudioFile,
        src: &[S],
        src_channel: usize,
        src_channels: usize,
        frames: usize,
    ) -> RiffResult<usize> {
        if self.attached && !self.writable {
            return Err(RiffError::ReadOnly);
        }
        let format = self.ready()?;
        let bpf = format.bytes_per_frame();
        let bps = format.bytes_per_sample();

        let mut frames = frames;
        if src_channels > 0 {
            frames = frames.min(src.len() / src_channels);
        }
        let src_channel = src_channel.min(src_channels);
        let channels = usize::from(self.window.channels).min(src_channels - src_channel);

        if channels == 0 {
            self.position += frames as u64;
            return Ok(frames);
        }

        let first = usize::from(self.window.first_channel);
        let partial = channels < usize::from(format.channels);
        let mut done = 0;
        while done < frames {
            let block = (frames - done).min(self.scratch_frames);
            let offset = self.frame_offset(bpf);

            if let Err(e) = file.seek(SeekFrom::Start(offset)) {
                error!("Seek to sample data at {} failed: {}", offset, e);
                break;
            }

            let scratch = &mut self.scratch[..block * bpf];
            if partial {
                // Frames past the end of the payload read back as silence
                match read_full(file, scratch) {
                    Ok(bytes) => scratch[bytes..].fill(0),
                    Err(e) => {
                        error!("Reading back {} frames at {} failed: {}", block, offset, e);
                        break;
                    }
                }
                if let Err(e) = file.seek(SeekFrom::Start(offset)) {
                    error!("Seek to sample data at {} failed: {}", offset, e);
                    break;
                }
            }

            for (f, frame) in scratch.chunks_exact_mut(bpf).enumerate() {
                let base = (done + f) * src_channels + src_channel;
                for (c, value) in src[base..base + channels].iter().enumerate() {
                    let at = (first + c) * bps;
                    sample::encode(
                        value.to_value(),
                        format.sample_format,
                        format.big_endian,
                        &mut frame[at..],
                    );
                }
            }

            if let Err(e) = file.write_all(scratch) {
                error!("Writing {} frames at {} failed: {}", block, offset, e);
                break;
            }

            done += block;
            self.position += block as u64;
            self.extend_to_cursor(bpf);
        }

        Ok(done)
    }

    fn frame_offset(&self, bpf: usize) -> u64 {
        self.payload_offset + self.absolute_position() * bpf as u64
    }

    fn extend_to_cursor(&mut self, bpf: usize) {
        let end = self.absolute_position();
        if end > self.total_frames {
            self.total_frames = end;
            self.total_bytes = end * bpf as u64;
        }
        self.window.length = self.window.length.max(self.position);
    }

    /// Pretend `frames` frames were streamed without touching the file
    #[cfg(test)]
    pub(crate) fn assume_written(&mut self, frames: u64) {
        let bpf = self.bytes_per_frame() as u64;
        self.total_frames = frames;
        self.total_bytes = frames * bpf;
        self.window.length = frames;
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::format::SampleFormat;
    use tempfile::tempdir;

    fn writable_stream(file: &mut AudioFile, format: SoundFormat, buffer: usize) -> SampleStream {
        // 12 bytes of unrelated header ahead of the payload
        file.write_all(&[0xAA; 12]).expect("header");
        let mut stream = SampleStream::new(buffer);
        stream.set_format(format);
        stream.attach(12, 0, true);
        stream
    }

    #[test]
    fn test_write_then_read_across_blocks() {
        let dir = tempdir().expect("temp dir");
        let mut file = AudioFile::create(dir.path().join("s.raw")).expect("create");
        let format = SoundFormat::new(48_000, 2, SampleFormat::Int16);
        let mut stream = writable_stream(&mut file, format, 3);

        let src: Vec<i16> = (0..20).collect();
        assert_eq!(stream.write(&mut file, &src, 0, 2, 10).expect("write"), 10);
        assert_eq!(stream.total_frames(), 10);
        assert_eq!(stream.total_bytes(), 40);
        assert_eq!(stream.length(), 10);

        stream.set_position(0);
        let mut dst = vec![0i16; 20];
        assert_eq!(stream.read(&mut file, &mut dst, 0, 2, 100).expect("read"), 10);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_read_clamps_to_window_and_buffer() {
        let dir = tempdir().expect("temp dir");
        let mut file = AudioFile::create(dir.path().join("s.raw")).expect("create");
        let format = SoundFormat::new(8_000, 1, SampleFormat::Int32);
        let mut stream = writable_stream(&mut file, format, 4);

        let src: Vec<i32> = (0..10).map(|v| v * 1000).collect();
        stream.write(&mut file, &src, 0, 1, 10).expect("write");

        stream.set_window(2, 5, 0, 1);
        assert_eq!(stream.window().length, 5);
        stream.set_position(0);
        let mut dst = vec![0i32; 3];
        assert_eq!(stream.read(&mut file, &mut dst, 0, 1, 10).expect("read"), 3);
        assert_eq!(dst, vec![2000, 3000, 4000]);
        assert_eq!(stream.read(&mut file, &mut dst, 0, 1, 10).expect("read"), 2);
        assert_eq!(&dst[..2], &[5000, 6000]);
        assert_eq!(stream.read(&mut file, &mut dst, 0, 1, 10).expect("read"), 0);
    }

    #[test]
    fn test_window_is_clamped() {
        let mut stream = SampleStream::new(16);
        stream.set_format(SoundFormat::new(48_000, 4, SampleFormat::Float));
        stream.attach(0, 4 * 4 * 100, false);
        stream.set_window(90, 50, 3, 8);
        assert_eq!(
            stream.window(),
            Window {
                start: 90,
                length: 10,
                first_channel: 3,
                channels: 1
            }
        );
        stream.set_position(1000);
        assert_eq!(stream.position(), 10);
        stream.set_absolute_position(95);
        assert_eq!(stream.position(), 5);
    }

    #[test]
    fn test_partial_channel_write_preserves_others() {
        let dir = tempdir().expect("temp dir");
        let mut file = AudioFile::create(dir.path().join("s.raw")).expect("create");
        let format = SoundFormat::new(48_000, 3, SampleFormat::Int24);
        let mut stream = writable_stream(&mut file, format, 2);

        let base: Vec<i32> = (1..=15).map(|v| v << 8).collect();
        stream.write(&mut file, &base, 0, 3, 5).expect("write all");

        // Overwrite the middle channel only
        stream.set_window(0, 5, 1, 1);
        stream.set_position(0);
        let middle = vec![-256i32; 5];
        assert_eq!(stream.write(&mut file, &middle, 0, 1, 5).expect("write one"), 5);

        stream.set_window(0, 5, 0, 3);
        stream.set_position(0);
        let mut dst = vec![0i32; 15];
        stream.read(&mut file, &mut dst, 0, 3, 5).expect("read");
        for frame in 0..5 {
            assert_eq!(dst[frame * 3], base[frame * 3]);
            assert_eq!(dst[frame * 3 + 1], -256);
            assert_eq!(dst[frame * 3 + 2], base[frame * 3 + 2]);
        }
    }

    #[test]
    fn test_no_channels_only_advances() {
        let mut stream = SampleStream::new(16);
        stream.set_format(SoundFormat::new(48_000, 2, SampleFormat::Int16));
        stream.attach(0, 400, false);
        let dir = tempdir().expect("temp dir");
        let mut file = AudioFile::create(dir.path().join("s.raw")).expect("create");

        let mut dst: Vec<i16> = Vec::new();
        assert_eq!(stream.read(&mut file, &mut dst, 0, 0, 7).expect("skip"), 7);
        assert_eq!(stream.position(), 7);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let mut stream = SampleStream::new(16);
        stream.set_format(SoundFormat::new(48_000, 1, SampleFormat::Int16));
        stream.attach(0, 0, false);
        let dir = tempdir().expect("temp dir");
        let mut file = AudioFile::create(dir.path().join("s.raw")).expect("create");
        assert!(matches!(
            stream.write(&mut file, &[0i16; 4], 0, 1, 4),
            Err(RiffError::ReadOnly)
        ));
    }

    #[test]
    fn test_unformatted_stream_is_an_error() {
        let mut stream = SampleStream::default();
        let dir = tempdir().expect("temp dir");
        let mut file = AudioFile::create(dir.path().join("s.raw")).expect("create");
        let mut dst = [0f32; 4];
        assert!(matches!(
            stream.read(&mut file, &mut dst, 0, 1, 4),
            Err(RiffError::NoFormat)
        ));
    }

    #[test]
    fn test_relocate_refused_after_streaming() {
        let dir = tempdir().expect("temp dir");
        let mut file = AudioFile::create(dir.path().join("s.raw")).expect("create");
        let format = SoundFormat::new(48_000, 1, SampleFormat::Int16);
        let mut stream = writable_stream(&mut file, format, 8);

        stream.relocate(20).expect("nothing written yet");
        assert_eq!(stream.payload_offset(), 20);
        stream.write(&mut file, &[1i16, 2], 0, 1, 2).expect("write");
        assert!(matches!(
            stream.relocate(24),
            Err(RiffError::LayoutChanged { expected: 20, actual: 24 })
        ));
    }

    #[test]
    fn test_time_helpers() {
        let mut stream = SampleStream::new(16);
        stream.set_format(SoundFormat::new(48_000, 1, SampleFormat::Int16));
        stream.attach(0, 96_000 * 2, false);
        stream.set_position(24_000);
        assert_eq!(stream.length_time(), Duration::from_secs(2));
        assert_eq!(stream.position_time(), Duration::from_millis(500));
    }
}
