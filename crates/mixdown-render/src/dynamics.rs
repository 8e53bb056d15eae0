//! Dynamics processing: dialogue compressor.

use mixdown_spec::CompressionConfig;

use crate::buffer::{db_to_gain, gain_to_db};

const THRESHOLD_RANGE: (f64, f64) = (-60.0, 0.0);
const RATIO_RANGE: (f64, f64) = (1.0, 20.0);
const ATTACK_RANGE_MS: (f64, f64) = (0.1, 100.0);
const RELEASE_RANGE_MS: (f64, f64) = (10.0, 1000.0);

/// Feed-forward compressor with a stereo-linked peak envelope follower.
///
/// State lives in the compressor, so processing a clip in consecutive spans
/// gives the same result as processing it at once.
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold_db: f64,
    ratio: f64,
    attack_coeff: f64,
    release_coeff: f64,
    makeup_gain: f64,
    envelope: f64,
}

impl Compressor {
    /// Creates a compressor. Parameters are held to their usable ranges.
    pub fn new(config: &CompressionConfig, sample_rate: u32) -> Self {
        let sr = sample_rate as f64;
        let attack_ms = config.attack_ms.clamp(ATTACK_RANGE_MS.0, ATTACK_RANGE_MS.1);
        let release_ms = config
            .release_ms
            .clamp(RELEASE_RANGE_MS.0, RELEASE_RANGE_MS.1);

        Self {
            threshold_db: config.threshold.clamp(THRESHOLD_RANGE.0, THRESHOLD_RANGE.1),
            ratio: config.ratio.clamp(RATIO_RANGE.0, RATIO_RANGE.1),
            attack_coeff: (-1.0 / (attack_ms * 0.001 * sr)).exp(),
            release_coeff: (-1.0 / (release_ms * 0.001 * sr)).exp(),
            makeup_gain: db_to_gain(config.makeup_gain),
            envelope: 0.0,
        }
    }

    /// Processes one stereo frame.
    #[inline]
    pub fn process(&mut self, left: f64, right: f64) -> (f64, f64) {
        let level = left.abs().max(right.abs());
        let coeff = if level > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = coeff * self.envelope + (1.0 - coeff) * level;

        let envelope_db = gain_to_db(self.envelope);
        let gain_db = if envelope_db > self.threshold_db {
            let over_db = envelope_db - self.threshold_db;
            -over_db * (1.0 - 1.0 / self.ratio)
        } else {
            0.0
        };

        let gain = db_to_gain(gain_db) * self.makeup_gain;
        (left * gain, right * gain)
    }

    /// Processes planar stereo slices in place.
    pub fn process_slices(&mut self, left: &mut [f64], right: &mut [f64]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (out_l, out_r) = self.process(*l, *r);
            *l = out_l;
            *r = out_r;
        }
    }
}
