//! WAVE/RF64 chunk container reader and writer
//!
#![allow(clippy::uninlined_format_args)] // Consistent logging style
#![allow(clippy::cast_possible_wrap)] // Sample quantization
#![allow(clippy::cast_precision_loss)] // Frame counts to seconds
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
//! This crate reads and writes WAVE-family audio containers, including the
//! 64-bit RF64 variant. A [`RiffFile`] owns the open file and its ordered
//! list of chunks; each chunk type is provided by the process-wide
//! [`registry`] and implements the [`Chunk`] contract.
//!
//! Files are written in two phases. [`RiffFile::create`] writes a
//! provisional header that fixes where the sample payload starts, so
//! samples can be streamed straight to disk. [`RiffFile::close`] computes
//! the final chunk lengths, promotes the file to RF64 when its body reaches
//! 4 GiB, fills in the `ds64` size table and rewrites every header.
//!
//! # Features
//!
//! - **Chunk registry**: built-in types for `fmt `, `data`, `ds64`, `bext`,
//!   `chna` and `axml`, overridable per id; unknown chunks survive as
//!   [`GenericChunk`]s whose payload loads on demand
//! - **RF64 promotion**: the `ds64` chunk is reserved as `JUNK` and only
//!   takes its real id when the file needs it
//! - **Sample transcoding**: `i16`, `i32`, `f32` and `f64` buffers against
//!   16/24/32-bit integer or 32/64-bit float storage, through a bounded
//!   scratch buffer, with frame and channel windows
//! - **Background writing**: sample writes can be handed to a worker thread
//!
//! # Example
//!
//! ```no_run
//! use riffwave::{RiffFile, SampleFormat};
//!
//! # fn main() -> riffwave::RiffResult<()> {
//! let mut file = RiffFile::new();
//! file.create("tone.wav", 48_000, 2, SampleFormat::Int24)?;
//! file.write_frames(&[0.0f32; 2 * 480])?;
//! file.close()?;
//!
//! file.open("tone.wav")?;
//! assert_eq!(file.sample_length(), 480);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod chunk;
pub mod chunks;
pub mod config;
pub mod error;
pub mod file;
pub mod format;
pub mod id;
pub mod io;
pub mod registry;
pub mod sample;
pub mod samples;

pub use chunk::{Chunk, ChunkCore, ChunkRole, Placement, ReadPolicy, SizeTable};
pub use chunks::{
    AxmlChunk, BextChunk, ChnaChunk, ChnaEntry, DataChunk, Ds64Chunk, FmtChunk, GenericChunk,
};
pub use config::FileOptions;
pub use error::{RiffError, RiffResult};
pub use file::{FileExtension, FileMode, RiffFile};
pub use format::{SampleFormat, SoundFormat};
pub use id::ChunkId;
pub use sample::Sample;
pub use samples::Window;
