//! `bext` broadcast extension chunk

use std::io::Cursor;

use binrw::helpers::until_eof;
use binrw::{BinRead, BinWrite};
use tracing::warn;

use crate::chunk::{Chunk, ChunkCore, ChunkRole, Placement, ReadPolicy};
use crate::error::{RiffError, RiffResult};
use crate::id::ChunkId;

/// Fixed part of the broadcast extension, ahead of the coding history
pub const BEXT_HEADER_SIZE: usize = 602;

/// Broadcast extension payload
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct BroadcastExtension {
    /// Free-text description
    pub description: [u8; 256],
    /// Producer name
    pub originator: [u8; 32],
    /// Producer reference
    pub originator_reference: [u8; 32],
    /// `yyyy-mm-dd`
    pub origination_date: [u8; 10],
    /// `hh:mm:ss`
    pub origination_time: [u8; 8],
    /// First sample's offset since midnight, in samples
    pub time_reference: u64,
    /// Extension version
    pub version: u16,
    /// SMPTE UMID
    pub umid: [u8; 64],
    /// Integrated loudness, LUFS × 100
    pub loudness_value: i16,
    /// Loudness range, LU × 100
    pub loudness_range: i16,
    /// Maximum true peak, dBTP × 100
    pub max_true_peak_level: i16,
    /// Maximum momentary loudness, LUFS × 100
    pub max_momentary_loudness: i16,
    /// Maximum short-term loudness, LUFS × 100
    pub max_short_term_loudness: i16,
    /// Zero padding
    pub reserved: [u8; 180],
    /// Coding history text
    #[br(parse_with = until_eof)]
    pub coding_history: Vec<u8>,
}

impl Default for BroadcastExtension {
    fn default() -> Self {
        Self {
            description: [0; 256],
            originator: [0; 32],
            originator_reference: [0; 32],
            origination_date: [0; 10],
            origination_time: [0; 8],
            time_reference: 0,
            version: 2,
            umid: [0; 64],
            loudness_value: 0,
            loudness_range: 0,
            max_true_peak_level: 0,
            max_momentary_loudness: 0,
            max_short_term_loudness: 0,
            reserved: [0; 180],
            coding_history: Vec::new(),
        }
    }
}

fn text(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn set_text(field: &mut [u8], value: &str) {
    field.fill(0);
    let n = value.len().min(field.len());
    field[..n].copy_from_slice(&value.as_bytes()[..n]);
}

/// The broadcast extension chunk
#[derive(Debug)]
pub struct BextChunk {
    core: ChunkCore,
    bext: BroadcastExtension,
}

macro_rules! text_field {
    ($get:ident, $set:ident, $field:ident, $doc:literal) => {
        #[doc = concat!("Get the ", $doc)]
        pub fn $get(&self) -> String {
            text(&self.bext.$field)
        }

        #[doc = concat!("Set the ", $doc, ", truncated to the field width")]
        pub fn $set(&mut self, value: &str) {
            set_text(&mut self.bext.$field, value);
            self.sync();
        }
    };
}

macro_rules! loudness_field {
    ($get:ident, $set:ident, $field:ident, $doc:literal) => {
        #[doc = concat!("Get the ", $doc)]
        pub const fn $get(&self) -> i16 {
            self.bext.$field
        }

        #[doc = concat!("Set the ", $doc)]
        pub fn $set(&mut self, value: i16) {
            self.bext.$field = value;
            self.sync();
        }
    };
}

impl BextChunk {
    /// Empty broadcast extension, version 2
    pub fn new(id: ChunkId) -> Self {
        let mut chunk = Self {
            core: ChunkCore::new(id, Placement::BeforePayload),
            bext: BroadcastExtension::default(),
        };
        chunk.sync();
        chunk
    }

    /// Decoded payload
    pub const fn extension(&self) -> &BroadcastExtension {
        &self.bext
    }

    text_field!(description, set_description, description, "description");
    text_field!(originator, set_originator, originator, "originator");
    text_field!(
        originator_reference,
        set_originator_reference,
        originator_reference,
        "originator reference"
    );
    text_field!(
        origination_date,
        set_origination_date,
        origination_date,
        "origination date (`yyyy-mm-dd`)"
    );
    text_field!(
        origination_time,
        set_origination_time,
        origination_time,
        "origination time (`hh:mm:ss`)"
    );

    loudness_field!(loudness_value, set_loudness_value, loudness_value, "integrated loudness");
    loudness_field!(loudness_range, set_loudness_range, loudness_range, "loudness range");
    loudness_field!(
        max_true_peak_level,
        set_max_true_peak_level,
        max_true_peak_level,
        "maximum true peak level"
    );
    loudness_field!(
        max_momentary_loudness,
        set_max_momentary_loudness,
        max_momentary_loudness,
        "maximum momentary loudness"
    );
    loudness_field!(
        max_short_term_loudness,
        set_max_short_term_loudness,
        max_short_term_loudness,
        "maximum short-term loudness"
    );

    /// Samples since midnight at the first sample
    pub const fn time_reference(&self) -> u64 {
        self.bext.time_reference
    }

    /// Set the time reference
    pub fn set_time_reference(&mut self, samples: u64) {
        self.bext.time_reference = samples;
        self.sync();
    }

    /// Extension version
    pub const fn version(&self) -> u16 {
        self.bext.version
    }

    /// Set the extension version
    pub fn set_version(&mut self, version: u16) {
        self.bext.version = version;
        self.sync();
    }

    /// SMPTE UMID
    pub const fn umid(&self) -> &[u8; 64] {
        &self.bext.umid
    }

    /// Set the UMID
    pub fn set_umid(&mut self, umid: [u8; 64]) {
        self.bext.umid = umid;
        self.sync();
    }

    /// Coding history text
    pub fn coding_history(&self) -> String {
        text(&self.bext.coding_history)
    }

    /// Replace the coding history
    pub fn set_coding_history(&mut self, history: &str) {
        self.bext.coding_history = history.as_bytes().to_vec();
        self.sync();
    }

    fn sync(&mut self) {
        let mut out = Cursor::new(Vec::with_capacity(
            BEXT_HEADER_SIZE + self.bext.coding_history.len(),
        ));
        // Writing into a Vec cannot fail
        if self.bext.write(&mut out).is_ok() {
            self.core.replace_data(&out.into_inner());
        }
    }
}

impl Chunk for BextChunk {
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
        let mut padded;
        let bytes = if data.len() < BEXT_HEADER_SIZE {
            warn!(
                "bext chunk of {} bytes is shorter than {}, zero filling",
                data.len(),
                BEXT_HEADER_SIZE
            );
            padded = data.to_vec();
            padded.resize(BEXT_HEADER_SIZE, 0);
            padded.as_slice()
        } else {
            data
        };
        self.bext = BroadcastExtension::read(&mut Cursor::new(bytes))
            .map_err(|e| RiffError::invalid_chunk(ChunkId::BEXT, e.to_string()))?;
        Ok(())
    }
}
