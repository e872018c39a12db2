//! `riffwave info`

use anyhow::Context;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use riffwave::{ChunkId, Ds64Chunk, FileOptions, RiffFile};

use super::write_json;
use crate::{InfoArgs, OutputFormat};

/// Summary of an opened file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// Path as given
    pub path: String,
    /// Container id on disk (`RIFF` or `RF64`)
    pub container: String,
    /// Frames per second
    pub sample_rate: u32,
    /// Channels per frame
    pub channels: u16,
    /// Stored sample format
    pub sample_format: String,
    /// Bits per stored sample
    pub bits_per_sample: u16,
    /// Frames in the payload
    pub frames: u64,
    /// Payload duration
    pub seconds: f64,
    /// Chunks in file order
    pub chunks: Vec<ChunkReport>,
    /// Size table, for RF64 files
    pub ds64: Option<Ds64Report>,
}

/// One chunk of a [`FileReport`]
#[derive(Debug, Clone, Serialize)]
pub struct ChunkReport {
    /// Registered id
    pub id: String,
    /// Id as written on disk
    pub on_disk_id: String,
    /// Payload length
    pub length: u64,
    /// File offset of the payload
    pub offset: u64,
}

/// Decoded ds64 table
#[derive(Debug, Clone, Serialize)]
pub struct Ds64Report {
    pub riff_size: u64,
    pub data_size: u64,
    pub sample_count: u64,
    /// Entries of the id table, free slots omitted
    pub entries: Vec<(String, u64)>,
}

/// Open `path` and summarize it
pub fn inspect(path: &Path, options: FileOptions) -> anyhow::Result<FileReport> {
    let mut file = RiffFile::with_options(options);
    file.open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let format = file.format().context("file has no format chunk")?;

    let container = file
        .chunk(ChunkId::RIFF)
        .map_or(ChunkId::RIFF, |c| c.on_disk_id());
    let chunks = file
        .chunks()
        .map(|c| ChunkReport {
            id: c.id().to_string(),
            on_disk_id: c.on_disk_id().to_string(),
            length: c.length(),
            offset: c.data_offset(),
        })
        .collect();
    let ds64 = file.chunk_as::<Ds64Chunk>(ChunkId::DS64).map(|c| {
        let table = c.table();
        Ds64Report {
            riff_size: table.riff_size,
            data_size: table.data_size,
            sample_count: table.sample_count,
            entries: table
                .entries
                .iter()
                .filter(|e| !e.id.is_empty())
                .map(|e| (e.id.to_string(), e.size))
                .collect(),
        }
    });

    Ok(FileReport {
        path: path.display().to_string(),
        container: container.to_string(),
        sample_rate: format.sample_rate,
        channels: format.channels,
        sample_format: format.sample_format.to_string(),
        bits_per_sample: format.bits_per_sample(),
        frames: file.sample_length(),
        seconds: file.length_seconds(),
        chunks,
        ds64,
    })
}

pub fn handle(args: &InfoArgs, format: OutputFormat, out: &mut dyn Write) -> anyhow::Result<()> {
    let report = inspect(&args.input, args.file.resolve()?)?;
    if write_json(&report, format, out)? {
        return Ok(());
    }

    writeln!(out, "{} ({})", report.path, report.container)?;
    writeln!(
        out,
        "  {} Hz, {} channels, {} ({} bit)",
        report.sample_rate, report.channels, report.sample_format, report.bits_per_sample
    )?;
    writeln!(
        out,
        "  {} frames, {:.3} seconds",
        report.frames, report.seconds
    )?;
    writeln!(out)?;
    writeln!(out, "  {:<6} {:<6} {:>14} {:>14}", "id", "disk", "length", "offset")?;
    for chunk in &report.chunks {
        writeln!(
            out,
            "  {:<6} {:<6} {:>14} {:>14}",
            chunk.id, chunk.on_disk_id, chunk.length, chunk.offset
        )?;
    }
    if let Some(ds64) = &report.ds64 {
        writeln!(out)?;
        writeln!(out, "  ds64 riff size    {}", ds64.riff_size)?;
        writeln!(out, "  ds64 data size    {}", ds64.data_size)?;
        writeln!(out, "  ds64 sample count {}", ds64.sample_count)?;
        for (id, size) in &ds64.entries {
            writeln!(out, "  ds64 {:<12} {}", id, size)?;
        }
    }
    Ok(())
}
