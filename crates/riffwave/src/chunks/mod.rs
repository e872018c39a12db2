//! Built-in chunk types

mod axml;
mod bext;
mod chna;
mod container;
mod data;
mod ds64;
mod fmt;
mod generic;

pub use axml::AxmlChunk;
pub use bext::{BEXT_HEADER_SIZE, BextChunk, BroadcastExtension};
pub use chna::{ChnaChunk, ChnaEntry};
pub use container::{FormTypeChunk, RiffChunk};
pub use data::DataChunk;
pub use ds64::{Ds64Chunk, Ds64Entry, Ds64Table};
pub use fmt::{FmtChunk, WaveFormat, WaveFormatExtension};
pub use generic::GenericChunk;
