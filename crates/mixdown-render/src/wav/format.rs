//! WAV file format parameters.

use crate::error::{RenderError, RenderResult};

/// Supported integer sample widths.
pub const SUPPORTED_BITS: [u16; 3] = [16, 24, 32];

/// WAV file format parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    /// Number of channels (1 = mono, 2 = stereo).
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bits per sample: 16, 24 or 32.
    pub bits_per_sample: u16,
}

impl WavFormat {
    /// Creates a format, rejecting unsupported channel counts and widths.
    pub fn new(channels: u16, sample_rate: u32, bits_per_sample: u16) -> RenderResult<Self> {
        if !(1..=2).contains(&channels) {
            return Err(RenderError::InvalidConfig(format!(
                "unsupported channel count {}",
                channels
            )));
        }
        if !SUPPORTED_BITS.contains(&bits_per_sample) {
            return Err(RenderError::InvalidConfig(format!(
                "unsupported bit depth {}",
                bits_per_sample
            )));
        }
        Ok(Self {
            channels,
            sample_rate,
            bits_per_sample,
        })
    }

    /// Calculates bytes per sample (per channel).
    pub(crate) fn bytes_per_sample(&self) -> u16 {
        self.bits_per_sample / 8
    }

    /// Calculates block align (bytes per sample frame).
    pub(crate) fn block_align(&self) -> u16 {
        self.channels * self.bytes_per_sample()
    }

    /// Calculates byte rate (bytes per second).
    pub(crate) fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    /// Size of the PCM data for a frame count.
    pub(crate) fn data_size(&self, frames: usize) -> u64 {
        frames as u64 * self.block_align() as u64
    }
}
