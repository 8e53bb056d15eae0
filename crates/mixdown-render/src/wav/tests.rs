//! Tests for the WAV output module.

use pretty_assertions::assert_eq;

use super::format::WavFormat;
use super::pcm::{append_pcm, compute_pcm_hash, extract_pcm_data};
use super::writer::{write_header, write_wav, WavFileWriter};
use crate::buffer::StereoBuffer;

fn stereo(bits: u16) -> WavFormat {
    WavFormat::new(2, 44100, bits).unwrap()
}

// =========================================================================
// Format tests
// =========================================================================

#[test]
fn test_format_rejects_unsupported_values() {
    assert!(WavFormat::new(0, 44100, 16).is_err());
    assert!(WavFormat::new(6, 44100, 16).is_err());
    assert!(WavFormat::new(2, 44100, 8).is_err());
    assert!(WavFormat::new(1, 48000, 24).is_ok());
}

#[test]
fn test_block_align_and_byte_rate() {
    let format = stereo(24);
    assert_eq!(format.block_align(), 6);
    assert_eq!(format.byte_rate(), 264600);

    let mono = WavFormat::new(1, 48000, 16).unwrap();
    assert_eq!(mono.block_align(), 2);
    assert_eq!(mono.byte_rate(), 96000);
}

// =========================================================================
// Header tests
// =========================================================================

#[test]
fn test_header_layout() {
    let mut bytes = Vec::new();
    write_header(&mut bytes, &stereo(16), 10).unwrap();

    assert_eq!(bytes.len(), 44);
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 36 + 40);
    assert_eq!(&bytes[8..12], b"WAVE");
    assert_eq!(&bytes[12..16], b"fmt ");
    assert_eq!(u16::from_le_bytes([bytes[22], bytes[23]]), 2);
    assert_eq!(u16::from_le_bytes([bytes[34], bytes[35]]), 16);
    assert_eq!(&bytes[36..40], b"data");
    assert_eq!(u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]), 40);
}

// =========================================================================
// PCM conversion tests
// =========================================================================

#[test]
fn test_pcm16_full_scale_and_clipping() {
    let mut pcm = Vec::new();
    append_pcm(&stereo(16), &[1.0, 2.0], &[-1.0, 0.0], &mut pcm);

    let values: Vec<i16> = pcm
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();
    assert_eq!(values, vec![32767, -32767, 32767, 0]);
}

#[test]
fn test_pcm24_is_three_bytes_little_endian() {
    let mut pcm = Vec::new();
    let mono = WavFormat::new(1, 44100, 24).unwrap();
    append_pcm(&mono, &[-1.0, 0.5], &[0.0, 0.0], &mut pcm);

    assert_eq!(pcm.len(), 6);
    assert_eq!(&pcm[0..3], &[0x01, 0x00, 0x80]);
    let half = i32::from_le_bytes([pcm[3], pcm[4], pcm[5], 0]);
    assert_eq!(half, 4194304);
}

#[test]
fn test_pcm32_values() {
    let mut pcm = Vec::new();
    let mono = WavFormat::new(1, 44100, 32).unwrap();
    append_pcm(&mono, &[1.0], &[0.0], &mut pcm);
    assert_eq!(i32::from_le_bytes([pcm[0], pcm[1], pcm[2], pcm[3]]), i32::MAX);
}

// =========================================================================
// File writer tests
// =========================================================================

#[test]
fn test_written_file_hash_matches_pcm() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.wav");
    let buffer = StereoBuffer {
        left: vec![0.0, 0.25, -0.25, 0.5],
        right: vec![0.1, -0.1, 0.2, -0.2],
    };

    let hash = write_wav(&path, stereo(16), &buffer).unwrap();
    let bytes = std::fs::read(&path).unwrap();

    assert_eq!(extract_pcm_data(&bytes).map(|p| p.len()), Some(16));
    assert_eq!(compute_pcm_hash(&bytes), Some(hash));

    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().channels, 2);
    assert_eq!(reader.duration(), 4);
}

#[test]
fn test_blocks_match_single_write() {
    let dir = tempfile::tempdir().unwrap();
    let buffer = StereoBuffer::from_mono((0..100).map(|i| i as f64 / 100.0).collect());

    let whole = dir.path().join("whole.wav");
    let whole_hash = write_wav(&whole, stereo(24), &buffer).unwrap();

    let split = dir.path().join("split.wav");
    let mut writer = WavFileWriter::create(&split, stereo(24), 100).unwrap();
    writer
        .write(&StereoBuffer::from_mono(buffer.left[..30].to_vec()))
        .unwrap();
    writer
        .write(&StereoBuffer::from_mono(buffer.left[30..].to_vec()))
        .unwrap();
    let split_hash = writer.finish().unwrap();

    assert_eq!(whole_hash, split_hash);
    assert_eq!(std::fs::read(&whole).unwrap(), std::fs::read(&split).unwrap());
}

#[test]
fn test_incomplete_output_never_reaches_destination() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.wav");

    let mut writer = WavFileWriter::create(&path, stereo(16), 10).unwrap();
    writer.write(&StereoBuffer::new(4)).unwrap();
    assert!(writer.finish().is_err());
    assert!(!path.exists());

    let writer = WavFileWriter::create(&path, stereo(16), 10).unwrap();
    drop(writer);
    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_overlong_write_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = WavFileWriter::create(&dir.path().join("out.wav"), stereo(16), 2).unwrap();
    assert!(writer.write(&StereoBuffer::new(3)).is_err());
}
