#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! End-to-end tests for the command handlers

use std::path::Path;

use pretty_assertions::assert_eq;
use riffwave::{BextChunk, ChunkId, RiffFile, SampleFormat};
use riffwave_cli::commands::{convert, extract, generate, info};
use riffwave_cli::{
    ConvertArgs, ExtractArgs, FileArgs, GenerateArgs, InfoArgs, OutputFormat, ToneSettings,
};
use tempfile::tempdir;

fn generate_args(output: &Path) -> GenerateArgs {
    GenerateArgs {
        output: output.to_path_buf(),
        rate: Some(48_000),
        channels: Some(2),
        seconds: Some(0.01),
        format: Some(SampleFormat::Int16),
        frequency: Some(1000.0),
        amplitude: None,
        bext_description: Some("tone".to_string()),
        file: FileArgs::default(),
    }
}

fn chunk_ids(path: &Path) -> Vec<String> {
    let mut file = RiffFile::new();
    file.open(path).unwrap();
    file.chunks().map(|c| c.on_disk_id().to_string()).collect()
}

#[test]
fn generated_tone_has_requested_length_and_bext() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tone.wav");

    assert_eq!(generate::handle(&generate_args(&path)).unwrap(), 480);

    let mut file = RiffFile::new();
    file.open(&path).unwrap();
    assert_eq!(file.sample_length(), 480);
    assert_eq!(file.sample_format(), Some(SampleFormat::Int16));
    let bext = file.chunk_as::<BextChunk>(ChunkId::BEXT).unwrap();
    assert_eq!(bext.description(), "tone");
    assert_eq!(bext.originator(), "riffwave");

    let mut frames = vec![0i16; 480 * 2];
    assert_eq!(file.read_frames(&mut frames).unwrap(), 480);
    assert_eq!(frames[0], 0);
    assert_eq!(frames[0], frames[1]);
    assert!(frames.iter().any(|&s| s > 8_000));
    assert!(frames.iter().all(|&s| i32::from(s).abs() <= 16_385));
}

#[test]
fn command_line_values_override_tone_settings() {
    let dir = tempdir().unwrap();
    let args = GenerateArgs {
        rate: None,
        bext_description: None,
        ..generate_args(&dir.path().join("unused.wav"))
    };
    let base = ToneSettings {
        rate: 8_000,
        bext_description: Some("from file".to_string()),
        ..ToneSettings::default()
    };
    let tone = generate::resolve_tone(&args, base);
    assert_eq!(tone.rate, 8_000);
    assert_eq!(tone.channels, 2);
    assert_eq!(tone.format, SampleFormat::Int16);
    assert_eq!(tone.bext_description.as_deref(), Some("from file"));
}

#[test]
fn info_reports_layout_as_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    generate::handle(&generate_args(&path)).unwrap();

    let args = InfoArgs {
        input: path,
        file: FileArgs::default(),
    };
    let mut out = Vec::new();
    info::handle(&args, OutputFormat::Json, &mut out).unwrap();
    let report: serde_json::Value = serde_json::from_slice(&out).unwrap();

    assert_eq!(report["container"], "RIFF");
    assert_eq!(report["sample_rate"], 48_000);
    assert_eq!(report["sample_format"], "int16");
    assert_eq!(report["frames"], 480);
    assert!(report["ds64"].is_null());
    let ids: Vec<&str> = report["chunks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["on_disk_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["RIFF", "WAVE", "JUNK", "fmt ", "bext", "data"]);
}

#[test]
fn info_text_lists_every_chunk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    generate::handle(&generate_args(&path)).unwrap();

    let args = InfoArgs {
        input: path,
        file: FileArgs::default(),
    };
    let mut out = Vec::new();
    info::handle(&args, OutputFormat::Text, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("48000 Hz, 2 channels, int16 (16 bit)"));
    assert!(text.contains("480 frames"));
    for id in ["JUNK", "bext", "data"] {
        assert!(text.contains(id), "missing {id} in:\n{text}");
    }
}

#[test]
fn convert_requantizes_and_keeps_metadata() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("tone.wav");
    let target = dir.path().join("tone_float.wav");
    generate::handle(&generate_args(&source)).unwrap();

    let args = ConvertArgs {
        input: source.clone(),
        output: target.clone(),
        format: SampleFormat::Float,
        block_frames: 100,
        file: FileArgs::default(),
    };
    let summary = convert::handle(&args).unwrap();
    assert_eq!(summary.frames, 480);
    assert_eq!(summary.chunks, 1);
    assert_eq!(chunk_ids(&target), chunk_ids(&source));

    let mut original = RiffFile::new();
    original.open(&source).unwrap();
    let mut expected = vec![0f32; 960];
    original.read_frames(&mut expected).unwrap();

    let mut converted = RiffFile::new();
    converted.open(&target).unwrap();
    assert_eq!(converted.sample_format(), Some(SampleFormat::Float));
    let mut actual = vec![0f32; 960];
    assert_eq!(converted.read_frames(&mut actual).unwrap(), 480);
    assert_eq!(actual, expected);
    assert_eq!(
        converted
            .chunk_as::<BextChunk>(ChunkId::BEXT)
            .unwrap()
            .description(),
        "tone"
    );
}

#[test]
fn integer_conversion_widens_by_shifting() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("tone.wav");
    let target = dir.path().join("tone24.wav");
    generate::handle(&generate_args(&source)).unwrap();

    let args = ConvertArgs {
        input: source.clone(),
        output: target.clone(),
        format: SampleFormat::Int24,
        block_frames: 4096,
        file: FileArgs::default(),
    };
    convert::handle(&args).unwrap();

    let mut original = RiffFile::new();
    original.open(&source).unwrap();
    let mut narrow = vec![0i16; 960];
    original.read_frames(&mut narrow).unwrap();

    let mut converted = RiffFile::new();
    converted.open(&target).unwrap();
    let mut wide = vec![0i32; 960];
    converted.read_frames(&mut wide).unwrap();
    for (w, n) in wide.iter().zip(&narrow) {
        assert_eq!(*w, i32::from(*n) << 16);
    }
}

#[test]
fn extract_writes_raw_payloads() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    generate::handle(&generate_args(&path)).unwrap();

    let bext_out = dir.path().join("bext.bin");
    let args = ExtractArgs {
        input: path.clone(),
        id: ChunkId::BEXT,
        output: Some(bext_out.clone()),
    };
    extract::handle(&args, &mut Vec::new()).unwrap();
    let bext = std::fs::read(&bext_out).unwrap();
    assert!(bext.len() >= 602);
    assert_eq!(&bext[..5], b"tone\0");

    let args = ExtractArgs {
        input: path.clone(),
        id: ChunkId::DATA,
        output: None,
    };
    let mut samples = Vec::new();
    extract::handle(&args, &mut samples).unwrap();
    assert_eq!(samples.len(), 480 * 2 * 2);

    let args = ExtractArgs {
        input: path,
        id: ChunkId::try_from("zzzz").unwrap(),
        output: None,
    };
    assert!(extract::handle(&args, &mut Vec::new()).is_err());
}
