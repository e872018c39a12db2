//! Options applied when opening or creating a container

use serde::{Deserialize, Serialize};

/// Default scratch buffer size of the sample engine, in frames
pub const DEFAULT_SAMPLE_BUFFER_FRAMES: usize = 256;

/// Options for a [`RiffFile`](crate::RiffFile)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOptions {
    /// Frames staged per block when transcoding samples
    pub sample_buffer_frames: usize,

    /// Start created files with background writing enabled
    pub background_writing: bool,

    /// Free ds64 slots reserved beyond one per non-structural chunk
    pub ds64_spare_entries: u32,

    /// Write the format chunk in WAVE_FORMAT_EXTENSIBLE form
    pub extensible_format: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            sample_buffer_frames: DEFAULT_SAMPLE_BUFFER_FRAMES,
            background_writing: false,
            ds64_spare_entries: 0,
            extensible_format: false,
        }
    }
}

impl FileOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the transcoding scratch buffer size (clamped to at least one frame)
    #[must_use]
    pub fn with_sample_buffer_frames(mut self, frames: usize) -> Self {
        self.sample_buffer_frames = frames.max(1);
        self
    }

    /// Enable or disable background writing for created files
    #[must_use]
    pub const fn with_background_writing(mut self, enable: bool) -> Self {
        self.background_writing = enable;
        self
    }

    /// Reserve extra free ds64 table slots
    #[must_use]
    pub const fn with_ds64_spare_entries(mut self, entries: u32) -> Self {
        self.ds64_spare_entries = entries;
        self
    }

    /// Write the extensible format chunk
    #[must_use]
    pub const fn with_extensible_format(mut self, enable: bool) -> Self {
        self.extensible_format = enable;
        self
    }

    /// Scratch buffer size actually used
    pub(crate) fn buffer_frames(&self) -> usize {
        self.sample_buffer_frames.max(1)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_clamps_buffer() {
        let options = FileOptions::new().with_sample_buffer_frames(0);
        assert_eq!(options.sample_buffer_frames, 1);
        assert_eq!(options.buffer_frames(), 1);
    }

    #[test]
    fn test_zero_buffer_from_deserialized_options_is_clamped() {
        let options = FileOptions {
            sample_buffer_frames: 0,
            ..FileOptions::default()
        };
        assert_eq!(options.buffer_frames(), 1);
    }
}
