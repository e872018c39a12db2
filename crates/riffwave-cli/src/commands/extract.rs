//! `riffwave extract`

use anyhow::{Context, bail};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use tracing::info;

use riffwave::{ChunkId, RiffFile};

use crate::ExtractArgs;

/// Copy the payload of `args.id` to the output path, or to `stdout`
///
/// The sample payload is streamed from disk; every other chunk is loaded
/// through the container.
pub fn handle(args: &ExtractArgs, stdout: &mut dyn Write) -> anyhow::Result<()> {
    let mut file = RiffFile::new();
    file.open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;

    let mut sink: Box<dyn Write + '_> = match &args.output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(stdout),
    };

    let written = if args.id == ChunkId::DATA {
        let chunk = file.chunk(ChunkId::DATA).context("file has no data chunk")?;
        let (offset, length) = (chunk.data_offset(), chunk.length());
        let mut raw = File::open(&args.input)?;
        raw.seek(SeekFrom::Start(offset))?;
        io::copy(&mut raw.take(length), &mut sink).context("failed to copy sample payload")?
    } else {
        let Some(data) = file.chunk_data(args.id)? else {
            bail!("no {} chunk in {}", args.id, args.input.display());
        };
        sink.write_all(data)?;
        data.len() as u64
    };
    sink.flush()?;

    info!("Extracted {} bytes of chunk {}", written, args.id);
    Ok(())
}
