//! Layered command options
//!
//! Values are taken from the command line first, then the `RIFFWAVE_*`
//! environment variables (handled by clap), then the `--options` JSON file,
//! then built-in defaults.

use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use riffwave::{FileOptions, SampleFormat};

/// Contents of an `--options` file
///
/// ```json
/// {
///   "file": { "sample_buffer_frames": 1024, "extensible_format": true },
///   "tone": { "rate": 96000, "frequency": 1000.0 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsFile {
    /// Container options
    pub file: FileOptions,
    /// Defaults for `generate`
    pub tone: ToneSettings,
}

impl OptionsFile {
    /// Load an options file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read options file {}", path.display()))?;
        let options: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse options file {}", path.display()))?;
        debug!("Loaded options from {}", path.display());
        Ok(options)
    }
}

/// Test tone parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneSettings {
    /// Sample rate in Hz
    pub rate: u32,
    /// Channel count
    pub channels: u16,
    /// Duration in seconds
    pub seconds: f64,
    /// Stored sample format
    pub format: SampleFormat,
    /// Tone frequency in Hz
    pub frequency: f64,
    /// Peak amplitude
    pub amplitude: f64,
    /// Broadcast extension description
    pub bext_description: Option<String>,
}

impl Default for ToneSettings {
    fn default() -> Self {
        Self {
            rate: 48_000,
            channels: 2,
            seconds: 1.0,
            format: SampleFormat::Int24,
            frequency: 440.0,
            amplitude: 0.5,
            bext_description: None,
        }
    }
}

/// Container options shared by every command that opens or creates a file
#[derive(Args, Debug, Clone, Default)]
pub struct FileArgs {
    /// JSON options file
    #[arg(long = "options", env = "RIFFWAVE_OPTIONS")]
    pub options: Option<PathBuf>,

    /// Frames staged per transcoding block
    #[arg(long, env = "RIFFWAVE_SAMPLE_BUFFER_FRAMES")]
    pub sample_buffer_frames: Option<usize>,

    /// Write samples from a background thread
    #[arg(long, env = "RIFFWAVE_BACKGROUND_WRITING")]
    pub background_writing: Option<bool>,

    /// Extra free ds64 table slots
    #[arg(long, env = "RIFFWAVE_DS64_SPARE_ENTRIES")]
    pub ds64_spare_entries: Option<u32>,

    /// Write the extensible format chunk
    #[arg(long, env = "RIFFWAVE_EXTENSIBLE_FORMAT")]
    pub extensible_format: Option<bool>,
}

impl FileArgs {
    /// Load the options file, if one was given
    pub fn options_file(&self) -> anyhow::Result<OptionsFile> {
        self.options
            .as_deref()
            .map_or_else(|| Ok(OptionsFile::default()), OptionsFile::load)
    }

    /// Apply command line values over `base`
    pub fn apply(&self, base: FileOptions) -> FileOptions {
        let mut options = base;
        if let Some(frames) = self.sample_buffer_frames {
            options = options.with_sample_buffer_frames(frames);
        }
        if let Some(enable) = self.background_writing {
            options = options.with_background_writing(enable);
        }
        if let Some(entries) = self.ds64_spare_entries {
            options = options.with_ds64_spare_entries(entries);
        }
        if let Some(enable) = self.extensible_format {
            options = options.with_extensible_format(enable);
        }
        options
    }

    /// Resolve the container options
    pub fn resolve(&self) -> anyhow::Result<FileOptions> {
        Ok(self.apply(self.options_file()?.file))
    }
}
