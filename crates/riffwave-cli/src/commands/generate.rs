//! `riffwave generate`

use anyhow::{Context, bail, ensure};
use std::f64::consts::TAU;
use tracing::info;

use riffwave::{BextChunk, ChunkId, RiffFile};

use crate::{GenerateArgs, ToneSettings};

/// Frames synthesized per block
const BLOCK_FRAMES: usize = 4096;

/// Merge command line values over the options file
pub fn resolve_tone(args: &GenerateArgs, base: ToneSettings) -> ToneSettings {
    ToneSettings {
        rate: args.rate.unwrap_or(base.rate),
        channels: args.channels.unwrap_or(base.channels),
        seconds: args.seconds.unwrap_or(base.seconds),
        format: args.format.unwrap_or(base.format),
        frequency: args.frequency.unwrap_or(base.frequency),
        amplitude: args.amplitude.unwrap_or(base.amplitude),
        bext_description: args.bext_description.clone().or(base.bext_description),
    }
}

/// Write the tone and return the number of frames written
pub fn handle(args: &GenerateArgs) -> anyhow::Result<u64> {
    let settings = args.file.options_file()?;
    let options = args.file.apply(settings.file);
    let tone = resolve_tone(args, settings.tone);

    ensure!(tone.rate > 0, "sample rate must be positive");
    ensure!(tone.channels > 0, "channel count must be positive");
    ensure!(tone.seconds >= 0.0, "duration must not be negative");

    let mut file = RiffFile::with_options(options);
    file.create(&args.output, tone.rate, tone.channels, tone.format)
        .with_context(|| format!("failed to create {}", args.output.display()))?;

    if let Some(description) = &tone.bext_description {
        let bext = file.add_chunk_as::<BextChunk>(ChunkId::BEXT)?;
        bext.set_description(description);
        bext.set_originator("riffwave");
        bext.set_coding_history(&format!(
            "A=PCM,F={},W={},M={},T=riffwave\r\n",
            tone.rate,
            tone.format.bits(),
            if tone.channels == 1 { "mono" } else { "multi" }
        ));
    }

    let total = (tone.seconds * f64::from(tone.rate)).round() as u64;
    let channels = usize::from(tone.channels);
    let step = TAU * tone.frequency / f64::from(tone.rate);
    let amplitude = tone.amplitude.clamp(0.0, 1.0);
    let mut buffer = vec![0f64; BLOCK_FRAMES * channels];
    let mut frame = 0u64;

    while frame < total {
        let frames = usize::try_from(total - frame).map_or(BLOCK_FRAMES, |n| n.min(BLOCK_FRAMES));
        for (i, slot) in buffer.chunks_mut(channels).take(frames).enumerate() {
            let value = amplitude * (step * (frame + i as u64) as f64).sin();
            slot.fill(value);
        }
        let written = file.write_frames(&buffer[..frames * channels])?;
        frame += written as u64;
        if written < frames {
            bail!("short write after {} frames", frame);
        }
    }

    file.close()
        .with_context(|| format!("failed to finalize {}", args.output.display()))?;
    info!(
        "Generated {} frames of {} Hz tone in {}",
        frame,
        tone.frequency,
        args.output.display()
    );
    Ok(frame)
}
