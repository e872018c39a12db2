//! Per-sample conversion between caller and on-disk representations
//!
//! Integers travel as left-justified `i32` values, so integer-to-integer
//! conversions are pure shifts and exact whenever the target is at least as
//! wide as the source. Floats travel as `f64`; float-to-integer conversion
//! scales, rounds and clamps to the target range.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::format::SampleFormat;

const SCALE_31: f64 = 2_147_483_648.0;

/// Intermediate value a sample passes through during conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue {
    /// Integer sample, left-justified in 32 bits
    Int(i32),
    /// Float sample, nominal range `[-1.0, 1.0)`
    Float(f64),
}

impl SampleValue {
    /// Value as a left-justified 32-bit integer
    pub fn to_i32(self) -> i32 {
        match self {
            Self::Int(v) => v,
            Self::Float(v) => quantize(v, 31) as i32,
        }
    }

    /// Value as a float in `[-1.0, 1.0)`
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Int(v) => f64::from(v) / SCALE_31,
            Self::Float(v) => v,
        }
    }

    /// Value quantized to a signed integer of `bits` width
    fn to_int_bits(self, bits: u32) -> i32 {
        match self {
            Self::Int(v) => v >> (32 - bits),
            Self::Float(v) => quantize(v, bits - 1) as i32,
        }
    }
}

/// Scale by `2^shift`, round and clamp to the signed range of `shift + 1` bits
fn quantize(value: f64, shift: u32) -> i64 {
    let scale = (1i64 << shift) as f64;
    let max = (1i64 << shift) - 1;
    let min = -(1i64 << shift);
    let scaled = (value * scale).round();
    if scaled.is_nan() {
        0
    } else {
        (scaled as i64).clamp(min, max)
    }
}

/// A caller-side sample type accepted by the read and write operations
pub trait Sample: Copy + Default + Send + 'static {
    /// Representation this type corresponds to
    const FORMAT: SampleFormat;

    /// Convert into the intermediate value
    fn to_value(self) -> SampleValue;

    /// Convert from the intermediate value
    fn from_value(value: SampleValue) -> Self;
}

impl Sample for i16 {
    const FORMAT: SampleFormat = SampleFormat::Int16;

    fn to_value(self) -> SampleValue {
        SampleValue::Int(i32::from(self) << 16)
    }

    fn from_value(value: SampleValue) -> Self {
        value.to_int_bits(16) as Self
    }
}

impl Sample for i32 {
    const FORMAT: SampleFormat = SampleFormat::Int32;

    fn to_value(self) -> SampleValue {
        SampleValue::Int(self)
    }

    fn from_value(value: SampleValue) -> Self {
        value.to_i32()
    }
}

impl Sample for f32 {
    const FORMAT: SampleFormat = SampleFormat::Float;

    fn to_value(self) -> SampleValue {
        SampleValue::Float(f64::from(self))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_value(value: SampleValue) -> Self {
        value.to_f64() as Self
    }
}

impl Sample for f64 {
    const FORMAT: SampleFormat = SampleFormat::Double;

    fn to_value(self) -> SampleValue {
        SampleValue::Float(self)
    }

    fn from_value(value: SampleValue) -> Self {
        value.to_f64()
    }
}

/// Decode one stored sample
///
/// `bytes` must hold at least [`SampleFormat::bytes`] bytes.
pub fn decode(bytes: &[u8], format: SampleFormat, big_endian: bool) -> SampleValue {
    if big_endian {
        decode_with::<BigEndian>(bytes, format)
    } else {
        decode_with::<LittleEndian>(bytes, format)
    }
}

/// Encode one sample into its stored form
///
/// `out` must hold at least [`SampleFormat::bytes`] bytes.
pub fn encode(value: SampleValue, format: SampleFormat, big_endian: bool, out: &mut [u8]) {
    if big_endian {
        encode_with::<BigEndian>(value, format, out);
    } else {
        encode_with::<LittleEndian>(value, format, out);
    }
}

fn decode_with<B: ByteOrder>(bytes: &[u8], format: SampleFormat) -> SampleValue {
    match format {
        SampleFormat::Int16 => SampleValue::Int(i32::from(B::read_i16(bytes)) << 16),
        SampleFormat::Int24 => SampleValue::Int(B::read_i24(bytes) << 8),
        SampleFormat::Int32 => SampleValue::Int(B::read_i32(bytes)),
        SampleFormat::Float => SampleValue::Float(f64::from(B::read_f32(bytes))),
        SampleFormat::Double => SampleValue::Float(B::read_f64(bytes)),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn encode_with<B: ByteOrder>(value: SampleValue, format: SampleFormat, out: &mut [u8]) {
    match format {
        SampleFormat::Int16 => B::write_i16(out, value.to_int_bits(16) as i16),
        SampleFormat::Int24 => B::write_i24(out, value.to_int_bits(24)),
        SampleFormat::Int32 => B::write_i32(out, value.to_i32()),
        SampleFormat::Float => B::write_f32(out, value.to_f64() as f32),
        SampleFormat::Double => B::write_f64(out, value.to_f64()),
    }
}
