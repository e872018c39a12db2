//! `riffwave convert`

use anyhow::{Context, bail};
use tracing::{debug, info, warn};

use riffwave::{ChunkId, Placement, RiffFile, Sample};

use crate::ConvertArgs;

/// Frames and metadata chunks copied by a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertSummary {
    pub frames: u64,
    pub chunks: usize,
}

pub fn handle(args: &ConvertArgs) -> anyhow::Result<ConvertSummary> {
    let options = args.file.resolve()?;
    let mut input = RiffFile::with_options(options.clone());
    input
        .open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let source = input.format().context("source has no format chunk")?;

    let mut output = RiffFile::with_options(options);
    output
        .create(&args.output, source.sample_rate, source.channels, args.format)
        .with_context(|| format!("failed to create {}", args.output.display()))?;

    // Metadata first, so before-payload chunks land ahead of the samples
    let chunks = copy_chunks(&mut input, &mut output)?;

    let block = args.block_frames.max(1);
    let frames = if source.sample_format.is_float() || args.format.is_float() {
        copy_samples::<f64>(&mut input, &mut output, block)?
    } else {
        copy_samples::<i32>(&mut input, &mut output, block)?
    };
    if frames < input.sample_length() {
        bail!(
            "copied {} of {} frames from {}",
            frames,
            input.sample_length(),
            args.input.display()
        );
    }

    output
        .close()
        .with_context(|| format!("failed to finalize {}", args.output.display()))?;
    info!(
        "Converted {} frames from {} to {}",
        frames, source.sample_format, args.format
    );
    Ok(ConvertSummary { frames, chunks })
}

/// Copy every non-structural chunk, keeping its side of the payload
fn copy_chunks(input: &mut RiffFile, output: &mut RiffFile) -> anyhow::Result<usize> {
    let mut seen = Vec::new();
    let mut before_payload = true;
    for chunk in input.chunks() {
        let id = chunk.id();
        if chunk.placement() == Placement::Payload || id == ChunkId::DATA {
            before_payload = false;
            continue;
        }
        if id.is_structural() || id == ChunkId::JUNK {
            continue;
        }
        if seen.iter().any(|(other, _)| *other == id) {
            warn!("Skipping repeated {} chunk", id);
            continue;
        }
        seen.push((id, before_payload));
    }

    for &(id, before) in &seen {
        let Some(data) = input.chunk_data(id)? else {
            continue;
        };
        output
            .add_chunk_with_data(id, data, before)
            .with_context(|| format!("failed to copy chunk {}", id))?;
        debug!("Copied chunk {} ({} bytes)", id, data.len());
    }
    Ok(seen.len())
}

/// Copy the sample payload through a caller buffer of type `S`
fn copy_samples<S: Sample>(
    input: &mut RiffFile,
    output: &mut RiffFile,
    block_frames: usize,
) -> anyhow::Result<u64> {
    let channels = usize::from(input.channels().context("source has no format")?);
    let mut buffer = vec![S::default(); block_frames * channels];
    let mut total = 0u64;
    loop {
        let read = input.read_frames(&mut buffer)?;
        if read == 0 {
            break;
        }
        let written = output.write_frames(&buffer[..read * channels])?;
        total += written as u64;
        if written < read {
            bail!("short write after {} frames", total);
        }
    }
    Ok(total)
}
