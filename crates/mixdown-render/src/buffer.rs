//! Stereo sample buffers and gain conversions.

/// Converts decibels to linear amplitude.
#[inline]
pub fn db_to_gain(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Converts linear amplitude to decibels.
#[inline]
pub fn gain_to_db(gain: f64) -> f64 {
    20.0 * gain.abs().max(1e-10).log10()
}

/// Planar stereo audio.
///
/// Mono material is stored with identical channels so every stage can treat
/// buffers uniformly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StereoBuffer {
    /// Left channel samples.
    pub left: Vec<f64>,
    /// Right channel samples.
    pub right: Vec<f64>,
}

impl StereoBuffer {
    /// Creates a silent buffer with the given number of frames.
    pub fn new(frames: usize) -> Self {
        Self {
            left: vec![0.0; frames],
            right: vec![0.0; frames],
        }
    }

    /// Creates a buffer from mono samples.
    pub fn from_mono(mono: Vec<f64>) -> Self {
        Self {
            left: mono.clone(),
            right: mono,
        }
    }

    /// Creates a buffer from interleaved samples.
    ///
    /// Mono input is duplicated. Input with more than two channels keeps the
    /// first two.
    pub fn from_interleaved(samples: &[f64], channels: usize) -> Self {
        match channels {
            0 => Self::default(),
            1 => Self::from_mono(samples.to_vec()),
            n => {
                let frames = samples.len() / n;
                let mut buffer = Self::new(frames);
                for (i, frame) in samples.chunks_exact(n).enumerate() {
                    buffer.left[i] = frame[0];
                    buffer.right[i] = frame[1];
                }
                buffer
            }
        }
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// Returns true if the buffer has no frames.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Multiplies every sample by a linear gain.
    pub fn scale(&mut self, gain: f64) {
        if gain == 1.0 {
            return;
        }
        for s in self.left.iter_mut().chain(self.right.iter_mut()) {
            *s *= gain;
        }
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f64 {
        self.left
            .iter()
            .chain(self.right.iter())
            .fold(0.0_f64, |acc, s| acc.max(s.abs()))
    }

    /// Mixes `other` into this buffer starting at `offset` frames.
    ///
    /// Frames of `other` past the end of this buffer are dropped.
    pub fn mix_at(&mut self, other: &StereoBuffer, offset: usize) {
        if offset >= self.len() {
            return;
        }
        let n = other.len().min(self.len() - offset);
        for i in 0..n {
            self.left[offset + i] += other.left[i];
            self.right[offset + i] += other.right[i];
        }
    }

    /// Replaces both channels with their average.
    pub fn fold_to_mono(&mut self) {
        for (l, r) in self.left.iter_mut().zip(self.right.iter_mut()) {
            let m = (*l + *r) * 0.5;
            *l = m;
            *r = m;
        }
    }

    /// Returns true if every sample is zero.
    pub fn is_silent(&self) -> bool {
        self.left.iter().chain(self.right.iter()).all(|s| *s == 0.0)
    }
}
