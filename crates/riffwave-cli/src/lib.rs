//! riffwave command line library
//!
//! Argument types and command handlers for the `riffwave` binary. Handlers
//! write their report to a caller-supplied writer so they can be driven
//! from tests.

pub mod commands;
pub mod settings;

use clap::{Args, Subcommand};
use std::path::PathBuf;

use riffwave::SampleFormat;

pub use crate::settings::{FileArgs, OptionsFile, ToneSettings};

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON output
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the format, length and chunk layout of a file
    Info(InfoArgs),

    /// Write the raw payload of one chunk to a file or stdout
    Extract(ExtractArgs),

    /// Copy a file to a new sample format, keeping its metadata chunks
    Convert(ConvertArgs),

    /// Write a sine test tone
    Generate(GenerateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InfoArgs {
    /// File to inspect
    pub input: PathBuf,

    #[command(flatten)]
    pub file: FileArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// File to read
    pub input: PathBuf,

    /// Chunk id, space padded to four characters (e.g. "fmt", "bext")
    #[arg(value_parser = parse_chunk_id)]
    pub id: riffwave::ChunkId,

    /// Output path (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    /// Source file
    pub input: PathBuf,

    /// Destination file
    pub output: PathBuf,

    /// Stored sample format of the destination
    #[arg(short, long, env = "RIFFWAVE_FORMAT")]
    pub format: SampleFormat,

    /// Frames copied per block
    #[arg(long, default_value_t = 4096, env = "RIFFWAVE_BLOCK_FRAMES")]
    pub block_frames: usize,

    #[command(flatten)]
    pub file: FileArgs,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Destination file
    pub output: PathBuf,

    /// Sample rate in Hz
    #[arg(long, env = "RIFFWAVE_RATE")]
    pub rate: Option<u32>,

    /// Channel count
    #[arg(long, env = "RIFFWAVE_CHANNELS")]
    pub channels: Option<u16>,

    /// Duration in seconds
    #[arg(long, env = "RIFFWAVE_SECONDS")]
    pub seconds: Option<f64>,

    /// Stored sample format
    #[arg(long, env = "RIFFWAVE_FORMAT")]
    pub format: Option<SampleFormat>,

    /// Tone frequency in Hz
    #[arg(long, env = "RIFFWAVE_FREQUENCY")]
    pub frequency: Option<f64>,

    /// Peak amplitude, 0.0 to 1.0
    #[arg(long, env = "RIFFWAVE_AMPLITUDE")]
    pub amplitude: Option<f64>,

    /// Add a broadcast extension with this description
    #[arg(long, env = "RIFFWAVE_BEXT_DESCRIPTION")]
    pub bext_description: Option<String>,

    #[command(flatten)]
    pub file: FileArgs,
}

/// Parse a chunk id argument
pub fn parse_chunk_id(value: &str) -> Result<riffwave::ChunkId, String> {
    riffwave::ChunkId::try_from(value)
}
