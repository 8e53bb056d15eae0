//! Biquad filter implementations.
//!
//! Coefficients follow the Audio EQ Cookbook. Filters are stateful so that a
//! signal processed in consecutive spans produces the same output as the
//! signal processed in one call.

use std::f64::consts::PI;

/// Q of a 2nd-order Butterworth section.
pub const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Biquad filter coefficients, normalized by `a0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Creates lowpass filter coefficients.
    ///
    /// # Arguments
    /// * `cutoff` - Cutoff frequency in Hz
    /// * `q` - Q factor, 0.707 is Butterworth
    /// * `sample_rate` - Audio sample rate in Hz
    pub fn lowpass(cutoff: f64, q: f64, sample_rate: f64) -> Self {
        let q = q.max(0.1);
        let omega = 2.0 * PI * cutoff / sample_rate;
        let cos_omega = omega.cos();
        let alpha = omega.sin() / (2.0 * q);

        Self::normalized(
            (1.0 - cos_omega) / 2.0,
            1.0 - cos_omega,
            (1.0 - cos_omega) / 2.0,
            1.0 + alpha,
            -2.0 * cos_omega,
            1.0 - alpha,
        )
    }

    /// Creates highpass filter coefficients.
    ///
    /// # Arguments
    /// * `cutoff` - Cutoff frequency in Hz
    /// * `q` - Q factor
    /// * `sample_rate` - Audio sample rate in Hz
    pub fn highpass(cutoff: f64, q: f64, sample_rate: f64) -> Self {
        let q = q.max(0.1);
        let omega = 2.0 * PI * cutoff / sample_rate;
        let cos_omega = omega.cos();
        let alpha = omega.sin() / (2.0 * q);

        Self::normalized(
            (1.0 + cos_omega) / 2.0,
            -(1.0 + cos_omega),
            (1.0 + cos_omega) / 2.0,
            1.0 + alpha,
            -2.0 * cos_omega,
            1.0 - alpha,
        )
    }

    /// Creates a peak EQ filter.
    ///
    /// # Arguments
    /// * `frequency` - Center frequency in Hz
    /// * `q` - Q factor
    /// * `db_gain` - Gain in dB (positive for boost, negative for cut)
    /// * `sample_rate` - Audio sample rate in Hz
    pub fn peaking_eq(frequency: f64, q: f64, db_gain: f64, sample_rate: f64) -> Self {
        let q = q.max(0.1);
        let a = 10.0_f64.powf(db_gain / 40.0);
        let omega = 2.0 * PI * frequency / sample_rate;
        let cos_omega = omega.cos();
        let alpha = omega.sin() / (2.0 * q);

        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos_omega,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_omega,
            1.0 - alpha / a,
        )
    }

    /// Creates a low-shelf filter with the given shelf slope (1.0 is steepest
    /// without overshoot).
    pub fn low_shelf(frequency: f64, db_gain: f64, slope: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(db_gain / 40.0);
        let omega = 2.0 * PI * frequency / sample_rate;
        let alpha = slope_alpha(omega.sin(), a, slope);
        low_shelf_from_alpha(a, omega.cos(), alpha)
    }

    /// Creates a high-shelf filter with the given shelf slope.
    pub fn high_shelf(frequency: f64, db_gain: f64, slope: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(db_gain / 40.0);
        let omega = 2.0 * PI * frequency / sample_rate;
        let alpha = slope_alpha(omega.sin(), a, slope);
        high_shelf_from_alpha(a, omega.cos(), alpha)
    }

    /// Creates a high-shelf filter parameterized by Q instead of slope.
    pub fn high_shelf_q(frequency: f64, db_gain: f64, q: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(db_gain / 40.0);
        let omega = 2.0 * PI * frequency / sample_rate;
        let alpha = omega.sin() / (2.0 * q.max(0.1));
        high_shelf_from_alpha(a, omega.cos(), alpha)
    }
}

fn slope_alpha(sin_omega: f64, a: f64, slope: f64) -> f64 {
    let slope = slope.clamp(0.1, 1.0);
    sin_omega / 2.0 * ((a + 1.0 / a) * (1.0 / slope - 1.0) + 2.0).sqrt()
}

fn low_shelf_from_alpha(a: f64, cos_omega: f64, alpha: f64) -> BiquadCoeffs {
    let sqrt_a = a.sqrt();
    BiquadCoeffs::normalized(
        a * ((a + 1.0) - (a - 1.0) * cos_omega + 2.0 * sqrt_a * alpha),
        2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega),
        a * ((a + 1.0) - (a - 1.0) * cos_omega - 2.0 * sqrt_a * alpha),
        (a + 1.0) + (a - 1.0) * cos_omega + 2.0 * sqrt_a * alpha,
        -2.0 * ((a - 1.0) + (a + 1.0) * cos_omega),
        (a + 1.0) + (a - 1.0) * cos_omega - 2.0 * sqrt_a * alpha,
    )
}

fn high_shelf_from_alpha(a: f64, cos_omega: f64, alpha: f64) -> BiquadCoeffs {
    let sqrt_a = a.sqrt();
    BiquadCoeffs::normalized(
        a * ((a + 1.0) + (a - 1.0) * cos_omega + 2.0 * sqrt_a * alpha),
        -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega),
        a * ((a + 1.0) + (a - 1.0) * cos_omega - 2.0 * sqrt_a * alpha),
        (a + 1.0) - (a - 1.0) * cos_omega + 2.0 * sqrt_a * alpha,
        2.0 * ((a - 1.0) - (a + 1.0) * cos_omega),
        (a + 1.0) - (a - 1.0) * cos_omega - 2.0 * sqrt_a * alpha,
    )
}

/// Biquad filter state (direct form I).
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadFilter {
    /// Creates a new biquad filter with the given coefficients.
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Resets the filter state.
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    /// Processes a single sample through the filter.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.coeffs.b0 * input + self.coeffs.b1 * self.x1 + self.coeffs.b2 * self.x2
            - self.coeffs.a1 * self.y1
            - self.coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    /// Processes a buffer of samples in place.
    pub fn process_buffer(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}

/// A cascade of biquads applied to both channels of a stereo signal.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    stages: Vec<(BiquadFilter, BiquadFilter)>,
}

impl FilterChain {
    /// Creates a chain from coefficient sets, applied in order.
    pub fn new(coeffs: impl IntoIterator<Item = BiquadCoeffs>) -> Self {
        Self {
            stages: coeffs
                .into_iter()
                .map(|c| (BiquadFilter::new(c), BiquadFilter::new(c)))
                .collect(),
        }
    }

    /// Returns true if the chain has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Clears all delay lines.
    pub fn reset(&mut self) {
        for (l, r) in &mut self.stages {
            l.reset();
            r.reset();
        }
    }

    /// Processes one stereo frame.
    #[inline]
    pub fn process(&mut self, mut left: f64, mut right: f64) -> (f64, f64) {
        for (filter_l, filter_r) in &mut self.stages {
            left = filter_l.process(left);
            right = filter_r.process(right);
        }
        (left, right)
    }

    /// Processes planar stereo slices in place.
    pub fn process_slices(&mut self, left: &mut [f64], right: &mut [f64]) {
        if self.is_empty() {
            return;
        }
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (out_l, out_r) = self.process(*l, *r);
            *l = out_l;
            *r = out_r;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(filter: &mut BiquadFilter, input: f64, n: usize) -> f64 {
        let mut out = 0.0;
        for _ in 0..n {
            out = filter.process(input);
        }
        out
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let mut filter = BiquadFilter::new(BiquadCoeffs::lowpass(1000.0, BUTTERWORTH_Q, 44100.0));
        assert!((settle(&mut filter, 1.0, 200) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let mut filter = BiquadFilter::new(BiquadCoeffs::highpass(1000.0, BUTTERWORTH_Q, 44100.0));
        assert!(settle(&mut filter, 1.0, 2000).abs() < 0.01);
    }

    #[test]
    fn test_shelves_at_dc() {
        // A low shelf scales DC by its gain, a high shelf leaves DC untouched.
        let mut low = BiquadFilter::new(BiquadCoeffs::low_shelf(200.0, 6.0, 1.0, 44100.0));
        assert!((settle(&mut low, 1.0, 5000) - 10.0_f64.powf(6.0 / 20.0)).abs() < 0.01);

        let mut high = BiquadFilter::new(BiquadCoeffs::high_shelf(4000.0, 6.0, 1.0, 44100.0));
        assert!((settle(&mut high, 1.0, 5000) - 1.0).abs() < 0.01);

        let mut high_q = BiquadFilter::new(BiquadCoeffs::high_shelf_q(1500.0, 4.0, 0.707, 48000.0));
        assert!((settle(&mut high_q, 1.0, 5000) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_chain_split_processing_matches() {
        let coeffs = [
            BiquadCoeffs::highpass(80.0, BUTTERWORTH_Q, 44100.0),
            BiquadCoeffs::peaking_eq(3000.0, 1.0, 2.0, 44100.0),
        ];
        let input: Vec<f64> = (0..512).map(|i| ((i * 7 % 13) as f64 - 6.0) / 6.0).collect();

        let mut whole = FilterChain::new(coeffs);
        let (mut l1, mut r1) = (input.clone(), input.clone());
        whole.process_slices(&mut l1, &mut r1);

        let mut split = FilterChain::new(coeffs);
        let (mut l2, mut r2) = (input.clone(), input);
        let (a, b) = l2.split_at_mut(100);
        let (c, d) = r2.split_at_mut(100);
        split.process_slices(a, c);
        split.process_slices(b, d);

        assert_eq!(l1, l2);
        assert_eq!(r1, r2);
    }
}
