//! Integrated loudness measurement (ITU-R BS.1770).
//!
//! The meter is incremental: feeding a signal in arbitrary pieces gives the
//! same result as feeding it in one call. Blocks are 400 ms long with 75 %
//! overlap, built from 100 ms steps.

use crate::buffer::StereoBuffer;
use crate::filter::{BiquadCoeffs, BiquadFilter};

/// Absolute gating threshold (LUFS).
const ABSOLUTE_GATE: f64 = -70.0;
/// Relative gating threshold below the ungated mean (LU).
const RELATIVE_GATE: f64 = -10.0;
/// Steps per gating block.
const STEPS_PER_BLOCK: usize = 4;

/// K-weighting pre-filter.
const SHELF_HZ: f64 = 1681.97;
const SHELF_DB: f64 = 4.0;
const SHELF_Q: f64 = 0.7072;
const HIGHPASS_HZ: f64 = 38.14;
const HIGHPASS_Q: f64 = 0.5;

fn lufs_from_power(power: f64) -> f64 {
    -0.691 + 10.0 * power.log10()
}

#[derive(Debug, Clone)]
struct KWeighting {
    shelf: BiquadFilter,
    highpass: BiquadFilter,
}

impl KWeighting {
    fn new(sample_rate: f64) -> Self {
        Self {
            shelf: BiquadFilter::new(BiquadCoeffs::high_shelf_q(
                SHELF_HZ,
                SHELF_DB,
                SHELF_Q,
                sample_rate,
            )),
            highpass: BiquadFilter::new(BiquadCoeffs::highpass(HIGHPASS_HZ, HIGHPASS_Q, sample_rate)),
        }
    }

    #[inline]
    fn process(&mut self, x: f64) -> f64 {
        self.highpass.process(self.shelf.process(x))
    }
}

/// Incremental integrated-loudness meter.
#[derive(Debug, Clone)]
pub struct LoudnessMeter {
    channels: usize,
    filters: Vec<KWeighting>,
    step_len: usize,
    /// Sum of squares per channel in the current step.
    step_sum: [f64; 2],
    step_frames: usize,
    /// Completed steps not yet part of a full block, newest last.
    recent_steps: Vec<[f64; 2]>,
    /// Mean-square power of every completed block.
    blocks: Vec<f64>,
    total_sum: [f64; 2],
    total_frames: usize,
}

impl LoudnessMeter {
    /// Creates a meter for a mono (1) or stereo (2) signal.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        let channels = channels.clamp(1, 2) as usize;
        let sr = sample_rate as f64;
        Self {
            channels,
            filters: (0..channels).map(|_| KWeighting::new(sr)).collect(),
            step_len: ((sr * 0.1).round() as usize).max(1),
            step_sum: [0.0; 2],
            step_frames: 0,
            recent_steps: Vec::with_capacity(STEPS_PER_BLOCK),
            blocks: Vec::new(),
            total_sum: [0.0; 2],
            total_frames: 0,
        }
    }

    /// Feeds one frame. Mono meters ignore `right`.
    #[inline]
    pub fn push(&mut self, left: f64, right: f64) {
        let input = [left, right];
        for (ch, filter) in self.filters.iter_mut().enumerate() {
            let y = filter.process(input[ch]);
            self.step_sum[ch] += y * y;
        }
        self.step_frames += 1;
        if self.step_frames == self.step_len {
            self.finish_step();
        }
    }

    /// Feeds planar slices.
    pub fn push_slices(&mut self, left: &[f64], right: &[f64]) {
        for (l, r) in left.iter().zip(right.iter()) {
            self.push(*l, *r);
        }
    }

    /// Feeds a whole buffer.
    pub fn push_buffer(&mut self, buffer: &StereoBuffer) {
        self.push_slices(&buffer.left, &buffer.right);
    }

    fn finish_step(&mut self) {
        let step = self.step_sum;
        for ch in 0..self.channels {
            self.total_sum[ch] += step[ch];
        }
        self.total_frames += self.step_frames;
        self.step_sum = [0.0; 2];
        self.step_frames = 0;

        self.recent_steps.push(step);
        if self.recent_steps.len() == STEPS_PER_BLOCK {
            let block_frames = (self.step_len * STEPS_PER_BLOCK) as f64;
            let power = (0..self.channels)
                .map(|ch| self.recent_steps.iter().map(|s| s[ch]).sum::<f64>() / block_frames)
                .sum();
            self.blocks.push(power);
            self.recent_steps.remove(0);
        }
    }

    /// Integrated loudness of everything fed so far.
    ///
    /// A signal shorter than one block is measured as a single block. Returns
    /// `None` for silence or when every block is gated out.
    pub fn integrated(&self) -> Option<f64> {
        if self.blocks.is_empty() {
            let frames = self.total_frames + self.step_frames;
            if frames == 0 {
                return None;
            }
            let power: f64 = (0..self.channels)
                .map(|ch| (self.total_sum[ch] + self.step_sum[ch]) / frames as f64)
                .sum();
            return gate(&[power]);
        }
        gate(&self.blocks)
    }
}

fn gate(blocks: &[f64]) -> Option<f64> {
    let above_absolute: Vec<f64> = blocks
        .iter()
        .copied()
        .filter(|p| *p > 0.0 && lufs_from_power(*p) > ABSOLUTE_GATE)
        .collect();
    if above_absolute.is_empty() {
        return None;
    }
    let mean = above_absolute.iter().sum::<f64>() / above_absolute.len() as f64;
    let relative = lufs_from_power(mean) + RELATIVE_GATE;

    let gated: Vec<f64> = above_absolute
        .into_iter()
        .filter(|p| lufs_from_power(*p) > relative)
        .collect();
    if gated.is_empty() {
        return None;
    }
    Some(lufs_from_power(gated.iter().sum::<f64>() / gated.len() as f64))
}

/// Integrated loudness of a whole buffer.
pub fn measure_lufs(buffer: &StereoBuffer, sample_rate: u32, channels: u16) -> Option<f64> {
    let mut meter = LoudnessMeter::new(sample_rate, channels);
    meter.push_buffer(buffer);
    meter.integrated()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, amplitude: f64, seconds: f64, sample_rate: u32) -> StereoBuffer {
        let n = (seconds * sample_rate as f64) as usize;
        StereoBuffer::from_mono(
            (0..n)
                .map(|i| amplitude * (2.0 * PI * freq * i as f64 / sample_rate as f64).sin())
                .collect(),
        )
    }

    #[test]
    fn test_silence_is_unmeasurable() {
        assert_eq!(measure_lufs(&StereoBuffer::new(48000), 48000, 2), None);
        assert_eq!(measure_lufs(&StereoBuffer::default(), 48000, 2), None);
    }

    #[test]
    fn test_stereo_full_scale_1k_sine() {
        // 0 dBFS at 1 kHz reads -3.01 LUFS per channel; two channels sum to 0.
        let lufs = measure_lufs(&sine(1000.0, 1.0, 3.0, 48000), 48000, 2).unwrap();
        assert!(lufs.abs() < 0.3, "got {}", lufs);
    }

    #[test]
    fn test_mono_meter_reads_one_channel() {
        let buffer = sine(1000.0, 0.5, 2.0, 44100);
        let stereo = measure_lufs(&buffer, 44100, 2).unwrap();
        let mono = measure_lufs(&buffer, 44100, 1).unwrap();
        assert!((stereo - mono - 10.0 * 2.0_f64.log10()).abs() < 1e-9);
    }

    #[test]
    fn test_gain_shifts_loudness() {
        let loud = measure_lufs(&sine(500.0, 0.5, 2.0, 44100), 44100, 2).unwrap();
        let quiet = measure_lufs(&sine(500.0, 0.25, 2.0, 44100), 44100, 2).unwrap();
        assert!((loud - quiet - 6.0206).abs() < 0.01);
    }

    #[test]
    fn test_short_buffer_is_one_block() {
        let lufs = measure_lufs(&sine(1000.0, 0.5, 0.2, 44100), 44100, 2);
        assert!(lufs.is_some());
    }

    #[test]
    fn test_incremental_matches_batch() {
        let buffer = sine(220.0, 0.3, 2.5, 44100);
        let batch = measure_lufs(&buffer, 44100, 2);

        let mut meter = LoudnessMeter::new(44100, 2);
        for start in (0..buffer.len()).step_by(3001) {
            let end = (start + 3001).min(buffer.len());
            meter.push_slices(&buffer.left[start..end], &buffer.right[start..end]);
        }
        assert_eq!(meter.integrated(), batch);
    }
}
