//! Sample representations and the format descriptor shared by fmt and data

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Numeric representation of one sample, on disk or in a caller buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// 16-bit signed integer PCM
    Int16,
    /// 24-bit signed integer PCM, packed in three bytes
    Int24,
    /// 32-bit signed integer PCM
    Int32,
    /// 32-bit IEEE float
    Float,
    /// 64-bit IEEE float
    Double,
}

impl SampleFormat {
    /// Bytes occupied by one sample
    pub const fn bytes(self) -> usize {
        match self {
            Self::Int16 => 2,
            Self::Int24 => 3,
            Self::Int32 | Self::Float => 4,
            Self::Double => 8,
        }
    }

    /// Bits per sample as written to the format chunk
    pub const fn bits(self) -> u16 {
        (self.bytes() * 8) as u16
    }

    /// True for the IEEE representations
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int16 => "int16",
            Self::Int24 => "int24",
            Self::Int32 => "int32",
            Self::Float => "float",
            Self::Double => "double",
        };
        f.write_str(name)
    }
}

impl FromStr for SampleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "int16" | "16" => Ok(Self::Int16),
            "int24" | "24" => Ok(Self::Int24),
            "int32" | "32" => Ok(Self::Int32),
            "float" | "float32" => Ok(Self::Float),
            "double" | "float64" => Ok(Self::Double),
            other => Err(format!("unknown sample format: {other}")),
        }
    }
}

/// Stored layout of the sample payload
///
/// Owned by the format chunk. The payload chunk keeps a copy taken when the
/// format becomes known, since the layout cannot change after that point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoundFormat {
    /// Frames per second
    pub sample_rate: u32,
    /// Interleaved channels per frame
    pub channels: u16,
    /// On-disk sample representation
    pub sample_format: SampleFormat,
    /// True if samples are stored big-endian (never the case for WAVE)
    pub big_endian: bool,
}

impl SoundFormat {
    /// Little-endian layout, as WAVE always stores it
    pub const fn new(sample_rate: u32, channels: u16, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format,
            big_endian: false,
        }
    }

    /// Bytes per sample
    pub const fn bytes_per_sample(&self) -> usize {
        self.sample_format.bytes()
    }

    /// Bits per sample
    pub const fn bits_per_sample(&self) -> u16 {
        self.sample_format.bits()
    }

    /// Bytes per interleaved frame
    pub const fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    /// Average data rate in bytes per second
    pub const fn bytes_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.bytes_per_frame() as u64
    }
}

impl Default for SoundFormat {
    fn default() -> Self {
        Self::new(48_000, 2, SampleFormat::Int24)
    }
}
