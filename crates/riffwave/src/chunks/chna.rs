//! `chna` channel allocation chunk

use std::collections::BTreeSet;
use std::io::Cursor;

use binrw::{BinRead, BinWrite};
use tracing::warn;

use crate::chunk::{Chunk, ChunkCore, ChunkRole, Placement, ReadPolicy};
use crate::error::{RiffError, RiffResult};
use crate::id::ChunkId;

/// Bytes per track entry
const ENTRY_SIZE: usize = 40;

/// One track allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BinRead, BinWrite)]
#[brw(little)]
pub struct ChnaEntry {
    /// 1-based track index in the sample payload
    pub track_index: u16,
    /// Audio track UID, e.g. `ATU_00000001`
    pub uid: [u8; 12],
    /// Track format reference, e.g. `AT_00010001_01`
    pub track_ref: [u8; 14],
    /// Pack format reference, e.g. `AP_00010002`
    pub pack_ref: [u8; 11],
    /// Always zero
    pub pad: u8,
}

fn fixed<const N: usize>(value: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let n = value.len().min(N);
    out[..n].copy_from_slice(&value.as_bytes()[..n]);
    out
}

fn text(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

impl ChnaEntry {
    /// Build an entry from its text references
    pub fn new(track_index: u16, uid: &str, track_ref: &str, pack_ref: &str) -> Self {
        Self {
            track_index,
            uid: fixed(uid),
            track_ref: fixed(track_ref),
            pack_ref: fixed(pack_ref),
            pad: 0,
        }
    }

    /// Audio track UID as text
    pub fn uid_str(&self) -> String {
        text(&self.uid)
    }

    /// Track format reference as text
    pub fn track_ref_str(&self) -> String {
        text(&self.track_ref)
    }

    /// Pack format reference as text
    pub fn pack_ref_str(&self) -> String {
        text(&self.pack_ref)
    }
}

/// The channel allocation chunk
#[derive(Debug)]
pub struct ChnaChunk {
    core: ChunkCore,
    entries: Vec<ChnaEntry>,
}

impl ChnaChunk {
    /// Empty allocation table
    pub fn new(id: ChunkId) -> Self {
        let mut chunk = Self {
            core: ChunkCore::new(id, Placement::AfterPayload),
            entries: Vec::new(),
        };
        chunk.sync();
        chunk
    }

    /// Track entries in file order
    pub fn entries(&self) -> &[ChnaEntry] {
        &self.entries
    }

    /// Number of distinct tracks referenced
    pub fn track_count(&self) -> u16 {
        let tracks: BTreeSet<u16> = self.entries.iter().map(|e| e.track_index).collect();
        u16::try_from(tracks.len()).unwrap_or(u16::MAX)
    }

    /// Append an entry
    pub fn add_entry(&mut self, entry: ChnaEntry) {
        self.entries.push(entry);
        self.sync();
    }

    /// Replace all entries
    pub fn set_entries(&mut self, entries: Vec<ChnaEntry>) {
        self.entries = entries;
        self.sync();
    }

    fn sync(&mut self) {
        let mut out = Cursor::new(Vec::with_capacity(4 + self.entries.len() * ENTRY_SIZE));
        let uids = u16::try_from(self.entries.len()).unwrap_or(u16::MAX);
        let encoded = self
            .track_count()
            .write_le(&mut out)
            .and_then(|()| uids.write_le(&mut out))
            .and_then(|()| self.entries.write_le(&mut out));
        // Writing into a Vec cannot fail
        if encoded.is_ok() {
            self.core.replace_data(&out.into_inner());
        }
    }
}

impl Chunk for ChnaChunk {
    fn core(&self) -> &ChunkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ChunkCore {
        &mut self.core
    }

    fn role(&self) -> ChunkRole {
        ChunkRole::Other
    }

    fn read_policy(&self) -> ReadPolicy {
        ReadPolicy::Read
    }

    fn process_data(&mut self) -> RiffResult<()> {
        let data = self.core.data().unwrap_or_default();
        if data.len() < 4 {
            return Err(RiffError::invalid_chunk(
                ChunkId::CHNA,
                format!("{} bytes, need at least 4", data.len()),
            ));
        }

        let declared = usize::from(u16::from_le_bytes([data[2], data[3]]));
        let available = (data.len() - 4) / ENTRY_SIZE;
        if declared > available {
            warn!(
                "chna declares {} entries but only {} fit, reading {}",
                declared, available, available
            );
        }

        let mut cursor = Cursor::new(&data[4..]);
        let mut entries = Vec::with_capacity(declared.min(available));
        for _ in 0..declared.min(available) {
            entries.push(
                ChnaEntry::read(&mut cursor)
                    .map_err(|e| RiffError::invalid_chunk(ChunkId::CHNA, e.to_string()))?,
            );
        }
        self.entries = entries;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stereo() -> Vec<ChnaEntry> {
        vec![
            ChnaEntry::new(1, "ATU_00000001", "AT_00010001_01", "AP_00010002"),
            ChnaEntry::new(2, "ATU_00000002", "AT_00010002_01", "AP_00010002"),
        ]
    }

    #[test]
    fn test_encoding() {
        let mut chna = ChnaChunk::new(ChunkId::CHNA);
        chna.set_entries(stereo());

        let data = chna.data().expect("payload");
        assert_eq!(data.len(), 4 + 2 * ENTRY_SIZE);
        assert_eq!(&data[..4], &[2, 0, 2, 0]);
        assert_eq!(&data[4..6], &[1, 0]);
        assert_eq!(&data[6..18], b"ATU_00000001");
        assert_eq!(&data[18..32], b"AT_00010001_01");
        assert_eq!(&data[32..43], b"AP_00010002");
        assert_eq!(data[43], 0);
    }

    #[test]
    fn test_track_count_counts_distinct_indices() {
        let mut chna = ChnaChunk::new(ChunkId::CHNA);
        chna.add_entry(ChnaEntry::new(1, "ATU_00000001", "AT_00010001_01", "AP_00010002"));
        chna.add_entry(ChnaEntry::new(1, "ATU_00000002", "AT_00010002_01", "AP_00010002"));
        assert_eq!(chna.track_count(), 1);
        assert_eq!(&chna.data().expect("payload")[..4], &[1, 0, 2, 0]);
    }

    #[test]
    fn test_parse_back() {
        let mut source = ChnaChunk::new(ChunkId::CHNA);
        source.set_entries(stereo());
        let bytes = source.data().expect("payload").to_vec();

        let mut parsed = ChnaChunk::new(ChunkId::CHNA);
        parsed.set_data(&bytes).expect("parse");
        assert_eq!(parsed.entries(), source.entries());
        assert_eq!(parsed.entries()[1].track_ref_str(), "AT_00010002_01");
    }

    #[test]
    fn test_overcounted_entries_clamped() {
        let mut source = ChnaChunk::new(ChunkId::CHNA);
        source.set_entries(stereo());
        let mut bytes = source.data().expect("payload").to_vec();
        bytes[2] = 5;

        let mut parsed = ChnaChunk::new(ChunkId::CHNA);
        parsed.set_data(&bytes).expect("parse");
        assert_eq!(parsed.entries().len(), 2);
        assert!(parsed.set_data(&[1, 0]).is_err());
    }
}
