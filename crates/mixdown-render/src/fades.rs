//! Fade curves and placed-clip fade envelopes.

use mixdown_spec::{seconds_to_frames, Fade, FadeCurve};

/// Fade-in gain for progress `p` in `[0, 1]`.
///
/// * linear: `p`
/// * logarithmic: `log10(1 + 9p)`
/// * exponential: `(10^p - 1) / 9`
#[inline]
pub fn fade_in_gain(curve: FadeCurve, p: f64) -> f64 {
    let p = p.clamp(0.0, 1.0);
    match curve {
        FadeCurve::Linear => p,
        FadeCurve::Logarithmic => (1.0 + 9.0 * p).log10(),
        FadeCurve::Exponential => (10.0_f64.powf(p) - 1.0) / 9.0,
    }
}

/// Fade-out gain for progress `p` in `[0, 1]`.
#[inline]
pub fn fade_out_gain(curve: FadeCurve, p: f64) -> f64 {
    1.0 - fade_in_gain(curve, p)
}

/// A fade resolved to frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameFade {
    pub frames: usize,
    pub curve: FadeCurve,
}

impl FrameFade {
    /// Resolves a fade at a sample rate. Zero-length fades resolve to `None`.
    pub fn from_fade(fade: Fade, sample_rate: u32) -> Option<Self> {
        let frames = seconds_to_frames(fade.duration, sample_rate);
        (frames > 0).then_some(Self {
            frames,
            curve: fade.curve,
        })
    }
}

/// Fade-in and fade-out over a placed range `[start, end)` in canvas frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipFades {
    start: usize,
    end: usize,
    fade_in: Option<FrameFade>,
    fade_out: Option<FrameFade>,
}

impl ClipFades {
    /// Creates fades for a placed range. Fade lengths are clamped to the range.
    pub fn new(
        start: usize,
        end: usize,
        fade_in: Option<FrameFade>,
        fade_out: Option<FrameFade>,
    ) -> Self {
        let len = end.saturating_sub(start);
        let clamp = |f: Option<FrameFade>| {
            f.map(|f| FrameFade {
                frames: f.frames.min(len),
                curve: f.curve,
            })
            .filter(|f| f.frames > 0)
        };
        Self {
            start,
            end,
            fade_in: clamp(fade_in),
            fade_out: clamp(fade_out),
        }
    }

    /// Returns true if neither fade is active.
    pub fn is_empty(&self) -> bool {
        self.fade_in.is_none() && self.fade_out.is_none()
    }

    /// Gain at an absolute canvas frame inside the placed range.
    #[inline]
    pub fn gain_at(&self, frame: usize) -> f64 {
        let mut gain = 1.0;
        if let Some(fade) = self.fade_in {
            let offset = frame.saturating_sub(self.start);
            if offset < fade.frames {
                gain *= fade_in_gain(fade.curve, offset as f64 / fade.frames as f64);
            }
        }
        if let Some(fade) = self.fade_out {
            let fade_start = self.end - fade.frames;
            if frame >= fade_start {
                let p = (frame - fade_start + 1) as f64 / fade.frames as f64;
                gain *= fade_out_gain(fade.curve, p);
            }
        }
        gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURVES: [FadeCurve; 3] = [
        FadeCurve::Linear,
        FadeCurve::Logarithmic,
        FadeCurve::Exponential,
    ];

    #[test]
    fn test_curve_boundaries() {
        for curve in CURVES {
            assert!(fade_in_gain(curve, 0.0).abs() < 1e-12);
            assert!((fade_in_gain(curve, 1.0) - 1.0).abs() < 1e-12);
            assert!((fade_out_gain(curve, 0.0) - 1.0).abs() < 1e-12);
            assert!(fade_out_gain(curve, 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_curve_ordering_on_fade_in() {
        for i in 1..100 {
            let p = i as f64 / 100.0;
            let log = fade_in_gain(FadeCurve::Logarithmic, p);
            let lin = fade_in_gain(FadeCurve::Linear, p);
            let exp = fade_in_gain(FadeCurve::Exponential, p);
            assert!(log >= lin && lin >= exp, "p={}: {} {} {}", p, log, lin, exp);
        }
    }

    #[test]
    fn test_clip_fades_reach_silence_at_edges() {
        let fade = Some(FrameFade {
            frames: 10,
            curve: FadeCurve::Linear,
        });
        let fades = ClipFades::new(100, 200, fade, fade);
        assert_eq!(fades.gain_at(100), 0.0);
        assert_eq!(fades.gain_at(150), 1.0);
        assert_eq!(fades.gain_at(199), 0.0);
        assert!((fades.gain_at(105) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_fade_longer_than_clip_is_clamped() {
        let fade = Some(FrameFade {
            frames: 1000,
            curve: FadeCurve::Exponential,
        });
        let fades = ClipFades::new(0, 10, fade, None);
        assert_eq!(fades.gain_at(0), 0.0);
        assert!(fades.gain_at(9) < 1.0);
        assert!(ClipFades::new(5, 5, fade, fade).is_empty());
    }

    #[test]
    fn test_zero_fade_resolves_to_none() {
        assert_eq!(FrameFade::from_fade(Fade::linear(0.0), 44100), None);
        assert_eq!(
            FrameFade::from_fade(Fade::linear(0.5), 48000).map(|f| f.frames),
            Some(24000)
        );
    }
}
