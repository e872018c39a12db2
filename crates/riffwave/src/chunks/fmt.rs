//! `fmt ` format chunk

use std::io::Cursor;

use binrw::{BinRead, BinWrite};
use tracing::{debug, warn};

use crate::chunk::{Chunk, ChunkCore, ChunkRole, Placement, ReadPolicy};
use crate::error::{RiffError, RiffResult};
use crate::format::{SampleFormat, SoundFormat};
use crate::id::ChunkId;

/// Integer PCM
pub const FORMAT_PCM: u16 = 0x0001;
/// IEEE float
pub const FORMAT_IEEE_FLOAT: u16 = 0x0003;
/// WAVE_FORMAT_EXTENSIBLE wrapper
pub const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Extension bytes following `cbSize` in the extensible form
const EXTENSION_SIZE: u16 = 22;

/// Trailing 14 bytes shared by the KSDATAFORMAT sub-format GUIDs
const GUID_TAIL: [u8; 14] = [
    0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

/// Minimum format payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct WaveFormat {
    /// Compression tag
    pub format_tag: u16,
    /// Interleaved channels
    pub channels: u16,
    /// Frames per second
    pub sample_rate: u32,
    /// Average bytes per second
    pub bytes_per_second: u32,
    /// Bytes per frame
    pub block_align: u16,
    /// Container bits per sample
    pub bits_per_sample: u16,
}

/// Extension of the extensible form, after the 16-bit size field
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct WaveFormatExtension {
    /// Bytes that follow (22)
    pub extension_size: u16,
    /// Meaningful bits per sample
    pub valid_bits_per_sample: u16,
    /// Speaker position mask
    pub channel_mask: u32,
    /// Sub-format GUID; the first two bytes carry the wrapped format tag
    pub sub_format: [u8; 16],
}

impl WaveFormatExtension {
    fn for_tag(tag: u16, valid_bits: u16, channel_mask: u32) -> Self {
        let mut sub_format = [0u8; 16];
        sub_format[..2].copy_from_slice(&tag.to_le_bytes());
        sub_format[2..].copy_from_slice(&GUID_TAIL);
        Self {
            extension_size: EXTENSION_SIZE,
            valid_bits_per_sample: valid_bits,
            channel_mask,
            sub_format,
        }
    }

    fn sub_format_tag(&self) -> u16 {
        u16::from_le_bytes([self.sub_format[0], self.sub_format[1]])
    }
}

/// The format chunk
#[derive(Debug)]
pub struct FmtChunk {
    core: ChunkCore,
    format: Option<SoundFormat>,
    valid_bits: u16,
    channel_mask: u32,
    extensible: bool,
}

impl FmtChunk {
    /// Format chunk with no format yet
    pub fn new(id: ChunkId) -> Self {
        Self {
            core: ChunkCore::new(id, Placement::BeforePayload),
            format: None,
            valid_bits: 0,
            channel_mask: 0,
            extensible: false,
        }
    }

    /// Meaningful bits per sample (equal to the container width unless the
    /// extensible form says otherwise)
    pub const fn valid_bits(&self) -> u16 {
        self.valid_bits
    }

    /// Speaker position mask from the extensible form
    pub const fn channel_mask(&self) -> u32 {
        self.channel_mask
    }

    /// True if read from, or to be written in, the extensible form
    pub const fn is_extensible(&self) -> bool {
        self.extensible
    }

    /// Choose the extensible form when writing
    pub fn set_extensible(&mut self, extensible: bool) {
        self.extensible = extensible;
    }

    /// Speaker position mask written in the extensible form
    pub fn set_channel_mask(&mut self, mask: u32) {
        self.channel_mask = mask;
    }

    fn decode(&mut self) -> RiffResult<SoundFormat> {
        let data = self.core.data().unwrap_or_default();
        let mut cursor = Cursor::new(data);
        let base = WaveFormat::read(&mut cursor)
            .map_err(|e| RiffError::invalid_chunk(ChunkId::FMT, e.to_string()))?;

        if base.channels == 0 || base.sample_rate == 0 {
            return Err(RiffError::invalid_chunk(
                ChunkId::FMT,
                format!("{} channels at {} Hz", base.channels, base.sample_rate),
            ));
        }

        let extension = if base.format_tag == FORMAT_EXTENSIBLE {
            match WaveFormatExtension::read(&mut cursor) {
                Ok(ext) if ext.extension_size >= EXTENSION_SIZE => Some(ext),
                _ => {
                    warn!("Extensible format chunk without a usable extension, assuming PCM");
                    None
                }
            }
        } else {
            None
        };

        let tag = match &extension {
            Some(ext) => ext.sub_format_tag(),
            None if base.format_tag == FORMAT_EXTENSIBLE => FORMAT_PCM,
            None => base.format_tag,
        };

        let bits = base.bits_per_sample;
        let sample_format = match tag {
            FORMAT_PCM => match bits {
                9..=16 => SampleFormat::Int16,
                17..=24 => SampleFormat::Int24,
                25..=32 => SampleFormat::Int32,
                _ => {
                    return Err(RiffError::UnsupportedFormat(format!(
                        "{bits}-bit integer PCM"
                    )));
                }
            },
            FORMAT_IEEE_FLOAT => match bits {
                32 => SampleFormat::Float,
                64 => SampleFormat::Double,
                _ => return Err(RiffError::UnsupportedFormat(format!("{bits}-bit float"))),
            },
            other => {
                return Err(RiffError::UnsupportedFormat(format!(
                    "format tag 0x{other:04X}"
                )));
            }
        };

        let format = SoundFormat::new(base.sample_rate, base.channels, sample_format);
        if usize::from(base.block_align) != format.bytes_per_frame() {
            warn!(
                "Format chunk block align {} disagrees with {} bytes per frame",
                base.block_align,
                format.bytes_per_frame()
            );
        }

        self.valid_bits = match &extension {
            Some(ext) if ext.valid_bits_per_sample > 0 => ext.valid_bits_per_sample.min(bits),
            _ => bits,
        };
        self.channel_mask = extension.map_or(0, |ext| ext.channel_mask);
        self.extensible = base.format_tag == FORMAT_EXTENSIBLE;
        Ok(format)
    }

    fn encode(&self, format: SoundFormat) -> RiffResult<Vec<u8>> {
        let tag = if format.sample_format.is_float() {
            FORMAT_IEEE_FLOAT
        } else {
            FORMAT_PCM
        };
        let block_align = u16::try_from(format.bytes_per_frame())
            .map_err(|_| RiffError::UnsupportedFormat(format!("{} channels", format.channels)))?;
        let bytes_per_second = u32::try_from(format.bytes_per_second())
            .map_err(|_| RiffError::UnsupportedFormat(format!("{} Hz", format.sample_rate)))?;

        let base = WaveFormat {
            format_tag: if self.extensible { FORMAT_EXTENSIBLE } else { tag },
            channels: format.channels,
            sample_rate: format.sample_rate,
            bytes_per_second,
            block_align,
            bits_per_sample: format.bits_per_sample(),
        };

        let mut out = Cursor::new(Vec::with_capacity(40));
        base.write(&mut out)?;
        if self.extensible {
            WaveFormatExtension::for_tag(tag, format.bits_per_sample(), self.channel_mask)
                .write(&mut out)?;
        }
        Ok(out.into_inner())
    }
}

impl Chunk for FmtChunk {
    fn core(&self) -> &ChunkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ChunkCore {
        &mut self.core
    }

    fn role(&self) -> ChunkRole {
        ChunkRole::Format
    }

    fn read_policy(&self) -> ReadPolicy {
        ReadPolicy::Read
    }

    fn process_data(&mut self) -> RiffResult<()> {
        let format = self.decode()?;
        debug!(
            "Format: {} Hz, {} channels, {}",
            format.sample_rate, format.channels, format.sample_format
        );
        self.format = Some(format);
        Ok(())
    }

    fn create_write_data(&mut self) -> RiffResult<()> {
        if let Some(format) = self.format {
            let bytes = self.encode(format)?;
            self.core.replace_data(&bytes);
        }
        Ok(())
    }

    fn sound_format(&self) -> Option<SoundFormat> {
        self.format
    }

    fn set_sound_format(&mut self, format: SoundFormat) -> RiffResult<()> {
        if format.channels == 0 || format.sample_rate == 0 {
            return Err(RiffError::UnsupportedFormat(format!(
                "{} channels at {} Hz",
                format.channels, format.sample_rate
            )));
        }
        self.valid_bits = format.bits_per_sample();
        self.format = Some(format);
        self.create_write_data()
    }
}
