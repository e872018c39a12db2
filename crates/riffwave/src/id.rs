//! Four-character chunk identifiers

use std::fmt;

use binrw::{BinRead, BinWrite};

/// A four-byte chunk identifier such as `RIFF` or `fmt `
///
/// The bytes are kept in file order. Numerically the identifier is the
/// big-endian interpretation of those bytes, which is what [`ChunkId::as_u32`]
/// returns and what lookups hash on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BinRead, BinWrite)]
pub struct ChunkId(pub [u8; 4]);

impl ChunkId {
    /// 32-bit container header
    pub const RIFF: Self = Self(*b"RIFF");
    /// 64-bit container header
    pub const RF64: Self = Self(*b"RF64");
    /// Form type following the container header
    pub const WAVE: Self = Self(*b"WAVE");
    /// Size-overflow table
    pub const DS64: Self = Self(*b"ds64");
    /// Placeholder id readers skip
    pub const JUNK: Self = Self(*b"JUNK");
    /// Format chunk
    pub const FMT: Self = Self(*b"fmt ");
    /// Sample payload chunk
    pub const DATA: Self = Self(*b"data");
    /// Broadcast extension chunk
    pub const BEXT: Self = Self(*b"bext");
    /// Channel-to-track map chunk
    pub const CHNA: Self = Self(*b"chna");
    /// XML metadata chunk
    pub const AXML: Self = Self(*b"axml");
    /// All-zero id, marks a free ds64 table slot
    pub const EMPTY: Self = Self([0; 4]);

    /// Create an identifier from its four bytes
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Identifier as a big-endian 32-bit value
    pub const fn as_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Identifier from a big-endian 32-bit value
    pub const fn from_u32(value: u32) -> Self {
        Self(value.to_be_bytes())
    }

    /// Raw bytes in file order
    pub const fn bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// True for the all-zero free-slot marker
    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }

    /// True for either container header form
    pub fn is_container(self) -> bool {
        self == Self::RIFF || self == Self::RF64
    }

    /// Chunks created once per container when writing
    pub fn is_structural(self) -> bool {
        self.is_container()
            || self == Self::WAVE
            || self == Self::DS64
            || self == Self::FMT
            || self == Self::DATA
    }
}

impl From<[u8; 4]> for ChunkId {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&str> for ChunkId {
    type Error = String;

    /// Parse an identifier of up to four ASCII characters, space padded
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() || value.len() > 4 || !value.is_ascii() {
            return Err(format!("chunk id must be 1-4 ASCII characters: {value:?}"));
        }
        let mut bytes = [b' '; 4];
        bytes[..value.len()].copy_from_slice(value.as_bytes());
        Ok(Self(bytes))
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if (0x20..=0x7e).contains(&b) {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId(\"{self}\")")
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_value_is_big_endian() {
        assert_eq!(ChunkId::RIFF.as_u32(), 0x5249_4646);
        assert_eq!(ChunkId::from_u32(0x6461_7461), ChunkId::DATA);
    }

    #[test]
    fn test_parse_pads_with_spaces() {
        let id = ChunkId::try_from("fmt").expect("valid id");
        assert_eq!(id, ChunkId::FMT);
        assert!(ChunkId::try_from("toolong").is_err());
        assert!(ChunkId::try_from("").is_err());
    }

    #[test]
    fn test_display_escapes_binary_bytes() {
        assert_eq!(ChunkId::EMPTY.to_string(), "\\x00\\x00\\x00\\x00");
        assert_eq!(ChunkId::DS64.to_string(), "ds64");
    }

    #[test]
    fn test_structural_ids() {
        assert!(ChunkId::RF64.is_structural());
        assert!(ChunkId::FMT.is_structural());
        assert!(!ChunkId::BEXT.is_structural());
        assert!(!ChunkId::JUNK.is_structural());
    }
}
