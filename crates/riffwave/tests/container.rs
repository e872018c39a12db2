#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for creating, finalizing and reopening containers

use std::path::Path;

use pretty_assertions::assert_eq;
use riffwave::{ChunkId, FileMode, FileOptions, FmtChunk, RiffError, RiffFile, SampleFormat};
use tempfile::tempdir;

/// One chunk as it appears on disk
fn raw_chunk(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len() + 1);
    out.extend_from_slice(id);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
    out
}

/// Plain PCM format payload
fn pcm_format(channels: u16, rate: u32, bits: u16) -> Vec<u8> {
    let block = channels * bits / 8;
    let mut out = Vec::with_capacity(16);
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&rate.to_le_bytes());
    out.extend_from_slice(&(rate * u32::from(block)).to_le_bytes());
    out.extend_from_slice(&block.to_le_bytes());
    out.extend_from_slice(&bits.to_le_bytes());
    out
}

/// RIFF container around `body`, declaring `length` or the real length
fn raw_container(form: &[u8; 4], body: &[u8], length: Option<u32>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    let length = length.unwrap_or(4 + body.len() as u32);
    out.extend_from_slice(&length.to_le_bytes());
    out.extend_from_slice(form);
    out.extend_from_slice(body);
    out
}

fn write_file(path: &Path, bytes: &[u8]) {
    std::fs::write(path, bytes).expect("write fixture");
}

#[test]
fn hundred_silent_frames_reopen_with_their_format() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("silence.wav");

    let mut file = RiffFile::new();
    file.create(&path, 48_000, 2, SampleFormat::Int16)
        .expect("create");
    assert_eq!(file.mode(), FileMode::Writing);
    assert_eq!(file.write_frames(&[0i16; 200]).expect("write"), 100);
    file.close().expect("close");
    assert!(!file.is_open());

    file.open(&path).expect("open");
    assert_eq!(file.channels(), Some(2));
    assert_eq!(file.sample_rate(), Some(48_000));
    assert_eq!(file.bits_per_sample(), Some(16));
    assert_eq!(file.sample_length(), 100);

    let bytes = std::fs::read(&path).expect("read back");
    assert_eq!(&bytes[..4], b"RIFF");
    assert_eq!(bytes.len(), 80 + 400);
    assert_eq!(
        u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize,
        bytes.len() - 8
    );
}

#[test]
fn every_sample_format_round_trips() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("formats.wav");
    let mut file = RiffFile::new();

    let ints16: Vec<i16> = vec![i16::MIN, -1, 0, 1, 12345, i16::MAX];
    file.create(&path, 44_100, 2, SampleFormat::Int16)
        .expect("create");
    file.write_frames(&ints16).expect("write");
    file.open(&path).expect("open");
    let mut back = vec![0i16; ints16.len()];
    assert_eq!(file.read_frames(&mut back).expect("read"), 3);
    assert_eq!(back, ints16);

    let ints24: Vec<i32> = vec![i32::MIN, -256, 0, 0x1234_5600, 0x7FFF_FF00, 256];
    file.create(&path, 44_100, 2, SampleFormat::Int24)
        .expect("create");
    file.write_frames(&ints24).expect("write");
    file.open(&path).expect("open");
    let mut back = vec![0i32; ints24.len()];
    file.read_frames(&mut back).expect("read");
    assert_eq!(back, ints24);
    assert_eq!(file.bytes_per_sample(), Some(3));

    let ints32: Vec<i32> = vec![i32::MIN, -7, 0, 7, 0x1234_5678, i32::MAX];
    file.create(&path, 44_100, 2, SampleFormat::Int32)
        .expect("create");
    file.write_frames(&ints32).expect("write");
    file.open(&path).expect("open");
    let mut back = vec![0i32; ints32.len()];
    file.read_frames(&mut back).expect("read");
    assert_eq!(back, ints32);

    let floats: Vec<f32> = vec![-1.0, -0.25, 0.0, 0.125, 0.5, 0.999];
    file.create(&path, 44_100, 2, SampleFormat::Float)
        .expect("create");
    file.write_frames(&floats).expect("write");
    file.open(&path).expect("open");
    let mut back = vec![0f32; floats.len()];
    file.read_frames(&mut back).expect("read");
    assert_eq!(back, floats);
    assert_eq!(file.sample_format(), Some(SampleFormat::Float));

    let doubles: Vec<f64> = vec![-1.0, -0.1, 0.0, 1e-9, 0.3, 0.75];
    file.create(&path, 44_100, 2, SampleFormat::Double)
        .expect("create");
    file.write_frames(&doubles).expect("write");
    file.open(&path).expect("open");
    let mut back = vec![0f64; doubles.len()];
    file.read_frames(&mut back).expect("read");
    assert_eq!(back, doubles);
}

#[test]
fn float_samples_are_quantized_into_integer_storage() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("quantized.wav");
    let mut file = RiffFile::new();
    file.create(&path, 8_000, 1, SampleFormat::Int16)
        .expect("create");
    file.write_frames(&[0.5f32, -1.0, 1.0, 2.0]).expect("write");
    file.close().expect("close");

    file.open(&path).expect("open");
    let mut ints = [0i16; 4];
    file.read_frames(&mut ints).expect("read");
    assert_eq!(ints, [16384, -32768, 32767, 32767]);

    file.set_sample_position(0);
    let mut floats = [0f32; 2];
    file.read_frames(&mut floats).expect("read");
    assert_eq!(floats, [0.5, -1.0]);
}

#[test]
fn odd_payload_is_padded_and_next_chunk_follows() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("odd.wav");
    let odd = ChunkId::new(*b"odd1");
    let tail = ChunkId::new(*b"tail");

    let mut file = RiffFile::new();
    file.create(&path, 8_000, 1, SampleFormat::Int16)
        .expect("create");
    file.add_chunk_with_data(odd, b"abc", false).expect("odd");
    file.add_chunk_with_data(tail, b"wxyz", false).expect("tail");
    file.write_frames(&[1i16; 10]).expect("write");
    file.close().expect("close");

    let bytes = std::fs::read(&path).expect("read back");
    assert_eq!(&bytes[100..108], b"odd1\x03\0\0\0");
    assert_eq!(&bytes[108..112], b"abc\0");
    assert_eq!(&bytes[112..116], b"tail");
    assert_eq!(bytes.len(), 124);

    file.open(&path).expect("open");
    assert_eq!(file.chunk_data(odd).expect("load"), Some(&b"abc"[..]));
    assert_eq!(file.chunk_data(tail).expect("load"), Some(&b"wxyz"[..]));
    assert_eq!(file.sample_length(), 10);
}

#[test]
fn unknown_chunk_between_known_ones_survives() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("unknown.wav");

    let mut body = raw_chunk(b"fmt ", &pcm_format(2, 48_000, 16));
    body.extend(raw_chunk(b"zzzz", b"hello"));
    body.extend(raw_chunk(b"data", &[1, 0, 2, 0, 3, 0, 4, 0]));
    write_file(&path, &raw_container(b"WAVE", &body, None));

    let mut file = RiffFile::new();
    file.open(&path).expect("open");
    let ids: Vec<ChunkId> = file.chunks().map(|c| c.id()).collect();
    assert_eq!(
        ids,
        vec![
            ChunkId::RIFF,
            ChunkId::WAVE,
            ChunkId::FMT,
            ChunkId::new(*b"zzzz"),
            ChunkId::DATA
        ]
    );
    assert_eq!(file.sample_length(), 2);
    assert_eq!(
        file.chunk_data(ChunkId::new(*b"zzzz")).expect("load"),
        Some(&b"hello"[..])
    );

    let mut frames = [0i16; 4];
    file.read_frames(&mut frames).expect("read");
    assert_eq!(frames, [1, 2, 3, 4]);
}

#[test]
fn clean_end_before_declared_length_still_opens() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("short.wav");

    let mut body = raw_chunk(b"fmt ", &pcm_format(1, 8_000, 16));
    body.extend(raw_chunk(b"data", &[0; 4]));
    write_file(&path, &raw_container(b"WAVE", &body, Some(10_000)));

    let mut file = RiffFile::new();
    file.open(&path).expect("open");
    assert_eq!(file.sample_length(), 2);
}

#[test]
fn damaged_files_fail_to_open() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("bad.wav");
    let mut file = RiffFile::new();

    let mut body = raw_chunk(b"fmt ", &pcm_format(1, 8_000, 16));
    body.extend(raw_chunk(b"data", &[0; 4]));

    let mut rifx = raw_container(b"WAVE", &body, None);
    rifx[..4].copy_from_slice(b"RIFX");
    write_file(&path, &rifx);
    assert!(matches!(
        file.open(&path),
        Err(RiffError::InvalidContainer(id)) if id == ChunkId::new(*b"RIFX")
    ));
    assert!(!file.is_open());

    write_file(&path, &raw_container(b"AIFF", &body, None));
    assert!(matches!(
        file.open(&path),
        Err(RiffError::InvalidFormType(_))
    ));

    // Two stray bytes where a chunk id should be
    let mut stray = body.clone();
    stray.extend_from_slice(b"ab");
    write_file(&path, &raw_container(b"WAVE", &stray, Some(10_000)));
    assert!(matches!(file.open(&path), Err(RiffError::Truncated { .. })));

    // A buffered chunk that claims more than the file holds
    let mut cut = body;
    cut.extend_from_slice(b"bext");
    cut.extend_from_slice(&602u32.to_le_bytes());
    cut.extend_from_slice(&[0; 100]);
    write_file(&path, &raw_container(b"WAVE", &cut, None));
    assert!(matches!(
        file.open(&path),
        Err(RiffError::Truncated { declared: 602, available: 100, .. })
    ));

    let only_format = raw_chunk(b"fmt ", &pcm_format(1, 8_000, 16));
    write_file(&path, &raw_container(b"WAVE", &only_format, None));
    assert!(matches!(file.open(&path), Err(RiffError::NoFormat)));

    let mut compressed = pcm_format(1, 8_000, 16);
    compressed[0] = 0x55;
    let mut body = raw_chunk(b"fmt ", &compressed);
    body.extend(raw_chunk(b"data", &[0; 4]));
    write_file(&path, &raw_container(b"WAVE", &body, None));
    assert!(matches!(
        file.open(&path),
        Err(RiffError::UnsupportedFormat(_))
    ));
    assert!(!file.is_open());
}

#[test]
fn unpromoted_file_keeps_full_junk_placeholder() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("junk.wav");
    let options = FileOptions::new().with_ds64_spare_entries(2);

    let mut file = RiffFile::with_options(options);
    file.create(&path, 48_000, 1, SampleFormat::Int24)
        .expect("create");
    file.write_frames(&[0i32; 3]).expect("write");
    file.close().expect("close");

    let bytes = std::fs::read(&path).expect("read back");
    assert_eq!(&bytes[..4], b"RIFF");
    assert_eq!(&bytes[12..16], b"JUNK");
    assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 52);
    assert_eq!(&bytes[72..76], b"fmt ");

    file.open(&path).expect("open");
    assert!(file.chunk(ChunkId::DS64).is_none());
    assert_eq!(file.chunk(ChunkId::JUNK).expect("junk").length(), 52);
    assert_eq!(file.sample_length(), 3);
}

#[test]
fn extensible_format_is_written_and_recognized() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("ext.wav");
    let options = FileOptions::new().with_extensible_format(true);

    let mut file = RiffFile::with_options(options);
    file.create(&path, 96_000, 2, SampleFormat::Int24)
        .expect("create");
    assert_eq!(file.chunk(ChunkId::FMT).expect("fmt").length(), 40);
    assert_eq!(file.chunk(ChunkId::DATA).expect("data").data_offset(), 104);
    file.write_frames(&[256i32, -256]).expect("write");
    file.close().expect("close");

    file.open(&path).expect("open");
    let fmt = file.chunk_as::<FmtChunk>(ChunkId::FMT).expect("fmt");
    assert!(fmt.is_extensible());
    assert_eq!(fmt.valid_bits(), 24);
    assert_eq!(file.sample_format(), Some(SampleFormat::Int24));
    let mut back = [0i32; 2];
    file.read_frames(&mut back).expect("read");
    assert_eq!(back, [256, -256]);
}

#[test]
fn background_writing_lands_every_frame() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("background.wav");
    let options = FileOptions::new()
        .with_background_writing(true)
        .with_sample_buffer_frames(64);

    let samples: Vec<i16> = (0..2000).map(|i| (i * 7 % 3000) as i16).collect();
    let mut file = RiffFile::with_options(options);
    file.create(&path, 44_100, 2, SampleFormat::Int16)
        .expect("create");
    for block in samples.chunks(300) {
        file.write_frames(block).expect("write");
    }
    file.enable_background_writing(false).expect("toggle off");
    file.enable_background_writing(true).expect("toggle on");
    file.close().expect("close");

    file.open(&path).expect("open");
    assert_eq!(file.sample_length(), 1000);
    let mut back = vec![0i16; samples.len()];
    assert_eq!(file.read_frames(&mut back).expect("read"), 1000);
    assert_eq!(back, samples);
}

#[test]
fn drop_finalizes_an_open_writer() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("dropped.wav");
    {
        let mut file = RiffFile::new();
        file.create(&path, 8_000, 1, SampleFormat::Int16)
            .expect("create");
        file.write_frames(&[5i16; 6]).expect("write");
    }

    let mut file = RiffFile::new();
    file.open(&path).expect("open");
    assert_eq!(file.sample_length(), 6);
}

#[test]
fn abort_leaves_provisional_header() {
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("aborted.wav");

    let mut file = RiffFile::new();
    file.create(&path, 8_000, 1, SampleFormat::Int16)
        .expect("create");
    file.write_frames(&[5i16; 6]).expect("write");
    file.abort();

    // The provisional data length undercounts what was streamed
    file.open(&path).expect("open");
    assert_eq!(file.sample_length(), 0);
}
