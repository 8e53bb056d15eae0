//! PCM quantization, extraction and hashing.

use super::format::WavFormat;

/// Quantizes one sample to the integer range of `bits`, clamping to [-1, 1].
#[inline]
fn quantize(sample: f64, bits: u16) -> i64 {
    let full_scale = ((1_i64 << (bits - 1)) - 1) as f64;
    (sample.clamp(-1.0, 1.0) * full_scale).round() as i64
}

/// Appends planar samples to `out` as interleaved little-endian PCM.
///
/// Mono formats write the left channel only.
pub fn append_pcm(format: &WavFormat, left: &[f64], right: &[f64], out: &mut Vec<u8>) {
    let frames = left.len().min(right.len());
    let width = format.bytes_per_sample() as usize;
    out.reserve(frames * format.block_align() as usize);

    let channels = format.channels as usize;
    for i in 0..frames {
        let frame = [left[i], right[i]];
        for &sample in &frame[..channels] {
            let value = quantize(sample, format.bits_per_sample);
            out.extend_from_slice(&value.to_le_bytes()[..width]);
        }
    }
}

/// Extracts PCM data from a WAV file buffer.
///
/// # Returns
/// PCM data if found, or None if the format is invalid
pub fn extract_pcm_data(wav_data: &[u8]) -> Option<&[u8]> {
    if wav_data.len() < 44 {
        return None;
    }
    if &wav_data[0..4] != b"RIFF" || &wav_data[8..12] != b"WAVE" {
        return None;
    }

    let mut pos = 12;
    while pos + 8 <= wav_data.len() {
        let chunk_id = &wav_data[pos..pos + 4];
        let chunk_size = u32::from_le_bytes([
            wav_data[pos + 4],
            wav_data[pos + 5],
            wav_data[pos + 6],
            wav_data[pos + 7],
        ]) as usize;

        if chunk_id == b"data" {
            let data_start = pos + 8;
            let data_end = data_start + chunk_size;
            if data_end <= wav_data.len() {
                return Some(&wav_data[data_start..data_end]);
            }
        }

        pos += 8 + chunk_size;
        // Align to word boundary
        if chunk_size % 2 != 0 {
            pos += 1;
        }
    }

    None
}

/// Computes the BLAKE3 hash of the PCM data of a WAV file.
pub fn compute_pcm_hash(wav_data: &[u8]) -> Option<String> {
    extract_pcm_data(wav_data).map(|pcm| blake3::hash(pcm).to_hex().to_string())
}
