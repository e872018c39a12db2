//! Error types for container and chunk operations

use thiserror::Error;

use crate::id::ChunkId;

/// Errors raised while reading, writing or finalizing a WAVE/RF64 container
#[derive(Debug, Error)]
pub enum RiffError {
    /// Container header is neither `RIFF` nor `RF64`
    #[error("invalid container id: expected RIFF or RF64, got {0}")]
    InvalidContainer(ChunkId),

    /// Form type following the container header is not `WAVE`
    #[error("unsupported form type: expected WAVE, got {0}")]
    InvalidFormType(ChunkId),

    /// A chunk declares more payload than the file holds
    #[error("chunk {id} truncated: declared {declared} bytes, {available} available")]
    Truncated {
        /// Chunk identifier
        id: ChunkId,
        /// Length declared in the chunk header (after ds64 resolution)
        declared: u64,
        /// Bytes actually present
        available: u64,
    },

    /// A structural chunk was requested twice
    #[error("duplicate structural chunk: {0}")]
    DuplicateChunk(ChunkId),

    /// Chunk payload failed validation
    #[error("invalid {id} chunk: {reason}")]
    InvalidChunk {
        /// Chunk identifier
        id: ChunkId,
        /// What was wrong with it
        reason: String,
    },

    /// Payload update would change the chunk length
    #[error("chunk {id} length mismatch: have {current} bytes, update has {requested}")]
    LengthMismatch {
        /// Chunk identifier
        id: ChunkId,
        /// Current payload length
        current: u64,
        /// Length of the rejected update
        requested: u64,
    },

    /// The payload chunk would move after samples were streamed to it
    #[error("payload offset moved from {expected} to {actual}")]
    LayoutChanged {
        /// Offset fixed at provisional-write time
        expected: u64,
        /// Offset the finalize write would have produced
        actual: u64,
    },

    /// ds64 table has no free slot for a chunk that needs one
    #[error("ds64 table full: no slot for {0}")]
    SizeTableFull(ChunkId),

    /// Format tag or bit depth that cannot be transcoded
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Operation requires an open container
    #[error("no file open")]
    NotOpen,

    /// Operation requires a container opened for writing
    #[error("container is read-only")]
    ReadOnly,

    /// Sample access before a format and payload chunk are known
    #[error("no format or payload chunk")]
    NoFormat,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl RiffError {
    /// Build an [`RiffError::InvalidChunk`] for `id`
    pub fn invalid_chunk(id: ChunkId, reason: impl Into<String>) -> Self {
        Self::InvalidChunk {
            id,
            reason: reason.into(),
        }
    }
}

/// Result type for container operations
pub type RiffResult<T> = Result<T, RiffError>;
