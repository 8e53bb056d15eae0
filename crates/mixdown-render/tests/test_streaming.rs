//! Streaming renderer tests: parity with the standard renderer and
//! single-pass behavior.

use std::path::{Path, PathBuf};

use mixdown_render::{render_file, RenderMode, RenderOptions};
use pretty_assertions::assert_eq;
use serde_json::json;

fn write_sine(path: &Path, freq: f64, amplitude: f64, seconds: f64, sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let frames = (seconds * sample_rate as f64) as usize;
    for i in 0..frames {
        let t = i as f64 / sample_rate as f64;
        let left = amplitude * (2.0 * std::f64::consts::PI * freq * t).sin();
        let right = amplitude * (2.0 * std::f64::consts::PI * freq * 1.5 * t).sin();
        writer.write_sample((left * 32767.0).round() as i16).unwrap();
        writer.write_sample((right * 32767.0).round() as i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// A timeline that touches every stage: looping, EQ, scene energy, ducking,
/// compression, semantic loudness, tonal shaping and the master chain.
fn scene_timeline(dir: &Path, duration: f64) -> PathBuf {
    write_sine(&dir.join("bed.wav"), 330.0, 0.5, 0.7, 8000);
    write_sine(&dir.join("voice.wav"), 220.0, 0.6, 1.2, 8000);
    write_sine(&dir.join("hit.wav"), 880.0, 0.8, 0.3, 8000);
    let path = dir.join("timeline.json");
    let timeline = json!({
        "project": {"name": "scenes", "duration": duration, "sample_rate": 8000, "bit_depth": 24},
        "settings": {
            "ducking": {"fade_down_ms": 200, "rules": [{"when": "voice", "duck": ["music", "background"]}]},
            "dialogue_compression": {"threshold": -30.0, "ratio": 6.0},
            "eq": {"tilt": "bright"},
            "normalize": true,
            "master_fade_out": {"duration": 0.4}
        },
        "tracks": [
            {"id": "music", "type": "music", "clips": [
                {"file": "bed.wav", "start": 0.0, "loop": true, "loop_until": duration}
            ]},
            {"id": "narration", "type": "voice", "clips": [
                {"file": "voice.wav", "start": 0.6}
            ]},
            {"id": "fx", "type": "sfx", "clips": [
                {"file": "hit.wav", "start": 1.9, "semantic_role": "impact"}
            ]},
            {"id": "room", "type": "ambience"}
        ],
        "scenes": [{
            "id": "hall",
            "start": 1.0,
            "duration": duration - 1.0,
            "energy": 0.3,
            "rules": {"eq": {"tilt": "warm"}},
            "tracks": {"room": [{"file": "bed.wav", "offset": 0.2, "loop": true}]}
        }]
    });
    std::fs::write(&path, serde_json::to_string_pretty(&timeline).unwrap()).unwrap();
    path
}

fn read_samples(path: &Path) -> Vec<i32> {
    let mut reader = hound::WavReader::open(path).unwrap();
    reader.samples::<i32>().map(|s| s.unwrap()).collect()
}

fn streaming(chunk_size_sec: f64, two_pass: bool) -> RenderOptions {
    RenderOptions {
        streaming: Some(true),
        chunk_size_sec: Some(chunk_size_sec),
        max_workers: Some(2),
        two_pass_lufs: Some(two_pass),
        skip_invalid: false,
    }
}

fn assert_within_one_lsb(a: &[i32], b: &[i32]) {
    assert_eq!(a.len(), b.len());
    let worst = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .max()
        .unwrap_or(0);
    assert!(worst <= 1, "largest difference {} LSB", worst);
}

// =========================================================================
// Parity tests
// =========================================================================

#[test]
fn test_single_chunk_matches_standard() {
    let dir = tempfile::tempdir().unwrap();
    let timeline = scene_timeline(dir.path(), 2.5);

    let standard = dir.path().join("standard.wav");
    let chunked = dir.path().join("chunked.wav");
    let a = render_file(&timeline, &standard, &RenderOptions::default()).unwrap();
    let b = render_file(&timeline, &chunked, &streaming(10.0, true)).unwrap();

    assert_eq!(a.mode, RenderMode::Standard);
    assert_eq!(b.mode, RenderMode::Streaming);
    assert_eq!(a.frames, b.frames);
    assert_within_one_lsb(&read_samples(&standard), &read_samples(&chunked));
}

#[test]
fn test_many_chunks_match_standard() {
    let dir = tempfile::tempdir().unwrap();
    let timeline = scene_timeline(dir.path(), 3.3);

    let standard = dir.path().join("standard.wav");
    let chunked = dir.path().join("chunked.wav");
    let a = render_file(&timeline, &standard, &RenderOptions::default()).unwrap();
    // 0.25 s chunks cut through every clip, loop restart and duck fade.
    let b = render_file(&timeline, &chunked, &streaming(0.25, true)).unwrap();

    assert_eq!(a.measured_lufs.is_some(), b.measured_lufs.is_some());
    assert!((a.lufs_gain_db - b.lufs_gain_db).abs() < 1e-9);
    assert_within_one_lsb(&read_samples(&standard), &read_samples(&chunked));
}

#[test]
fn test_chunk_size_does_not_change_output() {
    let dir = tempfile::tempdir().unwrap();
    let timeline = scene_timeline(dir.path(), 3.0);

    let coarse = dir.path().join("coarse.wav");
    let fine = dir.path().join("fine.wav");
    render_file(&timeline, &coarse, &streaming(1.0, true)).unwrap();
    render_file(&timeline, &fine, &streaming(0.1, true)).unwrap();

    assert_within_one_lsb(&read_samples(&coarse), &read_samples(&fine));
}

// =========================================================================
// Single-pass tests
// =========================================================================

#[test]
fn test_single_pass_writes_full_length_under_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let timeline = scene_timeline(dir.path(), 3.0);
    let output = dir.path().join("single.wav");

    let report = render_file(&timeline, &output, &streaming(0.5, false)).unwrap();
    assert_eq!(report.frames, 24000);
    assert!(report.peak_gain_db <= 0.0);

    let samples = read_samples(&output);
    assert_eq!(samples.len(), 48000);
    // Peak target is -1 dBFS.
    let ceiling = (0.891_250_9 * 8_388_607.0_f64).ceil() as i32 + 1;
    assert!(samples.iter().all(|s| s.abs() <= ceiling));
}

#[test]
fn test_streaming_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let timeline = scene_timeline(dir.path(), 2.0);

    let a = render_file(&timeline, &dir.path().join("a.wav"), &streaming(0.3, false)).unwrap();
    let b = render_file(&timeline, &dir.path().join("b.wav"), &streaming(0.3, false)).unwrap();
    assert_eq!(a.pcm_hash, b.pcm_hash);
}
