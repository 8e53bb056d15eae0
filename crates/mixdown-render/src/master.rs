//! Master bus processing.
//!
//! The master runs in two halves so the streaming renderer can measure
//! between them: [`MasterProcessor::shape`] applies tonal shaping and master
//! gain, and [`MasterProcessor::finish`] applies the loudness correction,
//! peak normalization and the master fade-out.

use mixdown_spec::{seconds_to_frames, CompiledTimeline, Fade, RenderSettings};
use serde::Serialize;

use crate::buffer::{db_to_gain, gain_to_db, StereoBuffer};
use crate::eq::ToneProfile;
use crate::fades::{ClipFades, FrameFade};
use crate::filter::FilterChain;

/// Largest loudness boost the master applies (dB).
pub const MAX_LUFS_BOOST_DB: f64 = 6.0;
/// Largest loudness cut the master applies (dB).
pub const MAX_LUFS_CUT_DB: f64 = -10.0;

/// Clamped master loudness correction in dB.
///
/// Returns 0 when loudness correction is disabled or the mix is unmeasurable.
pub fn lufs_correction_db(settings: &RenderSettings, measured: Option<f64>) -> f64 {
    match measured {
        Some(lufs) if settings.loudness.enabled => {
            (settings.loudness.target_lufs - lufs).clamp(MAX_LUFS_CUT_DB, MAX_LUFS_BOOST_DB)
        }
        _ => 0.0,
    }
}

/// Gains applied by [`MasterProcessor::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MasterGains {
    /// Integrated loudness of the shaped mix.
    pub measured_lufs: Option<f64>,
    pub lufs_gain_db: f64,
    pub peak_gain_db: f64,
}

impl Default for MasterGains {
    fn default() -> Self {
        Self {
            measured_lufs: None,
            lufs_gain_db: 0.0,
            peak_gain_db: 0.0,
        }
    }
}

impl MasterGains {
    /// Gains from a full measurement of the shaped mix.
    ///
    /// Peak normalization scales the corrected peak onto the ceiling.
    pub fn from_measurement(settings: &RenderSettings, measured: Option<f64>, peak: f64) -> Self {
        let lufs_gain_db = lufs_correction_db(settings, measured);
        let peak_after = peak * db_to_gain(lufs_gain_db);
        let peak_gain_db = if settings.normalize && peak_after > 0.0 {
            settings.peak_target_dbfs - gain_to_db(peak_after)
        } else {
            0.0
        };
        Self {
            measured_lufs: measured,
            lufs_gain_db,
            peak_gain_db,
        }
    }

    /// Gains from a running estimate over the mix heard so far.
    ///
    /// Without the whole mix, peak normalization only limits: it cuts when
    /// the running peak would exceed the ceiling and never boosts.
    pub fn running(settings: &RenderSettings, measured: Option<f64>, running_peak: f64) -> Self {
        let full = Self::from_measurement(settings, measured, running_peak);
        Self {
            peak_gain_db: full.peak_gain_db.min(0.0),
            ..full
        }
    }

    pub fn lufs_gain(&self) -> f64 {
        db_to_gain(self.lufs_gain_db)
    }

    pub fn peak_gain(&self) -> f64 {
        db_to_gain(self.peak_gain_db)
    }
}

/// A tonal shaping chain active over a frame window.
#[derive(Debug, Clone)]
struct ToneWindow {
    start: usize,
    end: usize,
    /// `None` for a flat profile.
    chain: Option<FilterChain>,
}

/// Global tonal shaping plus scene windows that override it.
///
/// Every chain runs on every frame so its state stays continuous; the output
/// of the last window covering a frame is used.
#[derive(Debug, Clone)]
pub struct ToneStage {
    global: Option<FilterChain>,
    windows: Vec<ToneWindow>,
}

impl ToneStage {
    pub fn new(timeline: &CompiledTimeline) -> Self {
        let sr = timeline.project.sample_rate;
        let build = |profile: ToneProfile| (!profile.is_flat()).then(|| profile.chain(sr));

        let global = timeline
            .settings
            .tone
            .as_ref()
            .and_then(|tone| build(ToneProfile::from_shaping(tone)));
        let windows = timeline
            .tone_map
            .iter()
            .map(|segment| ToneWindow {
                start: seconds_to_frames(segment.start, sr),
                end: seconds_to_frames(segment.end, sr),
                chain: build(ToneProfile::from_shaping(&segment.tone)),
            })
            .filter(|window| window.end > window.start)
            .collect();
        Self { global, windows }
    }

    /// Returns true if no frame is ever shaped.
    pub fn is_flat(&self) -> bool {
        self.global.is_none() && self.windows.iter().all(|w| w.chain.is_none())
    }

    #[inline]
    fn process(&mut self, frame: usize, left: f64, right: f64) -> (f64, f64) {
        let mut out = match self.global.as_mut() {
            Some(chain) => chain.process(left, right),
            None => (left, right),
        };
        for window in self.windows.iter_mut() {
            let shaped = match window.chain.as_mut() {
                Some(chain) => chain.process(left, right),
                None => (left, right),
            };
            if frame >= window.start && frame < window.end {
                out = shaped;
            }
        }
        out
    }

    /// Shapes a block whose first frame is `start_frame`.
    pub fn process_buffer(&mut self, buffer: &mut StereoBuffer, start_frame: usize) {
        if self.is_flat() {
            return;
        }
        for i in 0..buffer.len() {
            let (l, r) = self.process(start_frame + i, buffer.left[i], buffer.right[i]);
            buffer.left[i] = l;
            buffer.right[i] = r;
        }
    }
}

/// Master bus state for one pass over the mix.
#[derive(Debug, Clone)]
pub struct MasterProcessor {
    mono: bool,
    tone: ToneStage,
    master_gain: f64,
    fade_out: Option<ClipFades>,
}

impl MasterProcessor {
    pub fn new(timeline: &CompiledTimeline) -> Self {
        let project = &timeline.project;
        let settings = &timeline.settings;
        let total = project.total_frames();
        let fade_out = settings.master_fade_out.as_ref().and_then(|fade| {
            FrameFade::from_fade(Fade::new(fade.duration, fade.curve), project.sample_rate)
                .map(|frames| ClipFades::new(0, total, None, Some(frames)))
        });
        Self {
            mono: project.channels == 1,
            tone: ToneStage::new(timeline),
            master_gain: db_to_gain(settings.master_gain),
            fade_out,
        }
    }

    /// Mono fold, tonal shaping and master gain.
    pub fn shape(&mut self, buffer: &mut StereoBuffer, start_frame: usize) {
        if self.mono {
            buffer.fold_to_mono();
        }
        self.tone.process_buffer(buffer, start_frame);
        buffer.scale(self.master_gain);
    }

    /// Loudness correction, peak normalization and master fade-out.
    pub fn finish(&self, buffer: &mut StereoBuffer, start_frame: usize, gains: &MasterGains) {
        buffer.scale(gains.lufs_gain());
        buffer.scale(gains.peak_gain());
        if let Some(fade) = &self.fade_out {
            for i in 0..buffer.len() {
                let gain = fade.gain_at(start_frame + i);
                buffer.left[i] *= gain;
                buffer.right[i] *= gain;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixdown_spec::{compile, NoDurations, Timeline};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn timeline(settings: serde_json::Value) -> CompiledTimeline {
        let timeline: Timeline = serde_json::from_value(json!({
            "project": {"name": "t", "duration": 1.0, "sample_rate": 1000},
            "settings": settings,
            "tracks": [],
        }))
        .unwrap();
        compile(&timeline, &NoDurations).unwrap()
    }

    #[test]
    fn test_lufs_correction_hits_clamp_boundaries() {
        let settings = RenderSettings::default();
        assert_eq!(lufs_correction_db(&settings, Some(-40.0)), MAX_LUFS_BOOST_DB);
        assert_eq!(lufs_correction_db(&settings, Some(5.0)), MAX_LUFS_CUT_DB);
        assert_eq!(lufs_correction_db(&settings, Some(-23.0)), 3.0);
        assert_eq!(lufs_correction_db(&settings, None), 0.0);

        let mut disabled = RenderSettings::default();
        disabled.loudness.enabled = false;
        assert_eq!(lufs_correction_db(&disabled, Some(-40.0)), 0.0);
    }

    #[test]
    fn test_peak_normalization_targets_ceiling() {
        let mut settings = RenderSettings::default();
        settings.loudness.enabled = false;
        settings.normalize = true;

        let gains = MasterGains::from_measurement(&settings, Some(-30.0), 0.5);
        assert!((db_to_gain(gains.peak_gain_db) * 0.5 - db_to_gain(-1.0)).abs() < 1e-12);

        let running = MasterGains::running(&settings, Some(-30.0), 0.5);
        assert_eq!(running.peak_gain_db, 0.0);
        let running = MasterGains::running(&settings, Some(-30.0), 2.0);
        assert!(running.peak_gain_db < 0.0);
    }

    #[test]
    fn test_master_gain_and_fade_out() {
        let compiled = timeline(json!({
            "master_gain": -6.0,
            "loudness": {"enabled": false},
            "master_fade_out": {"duration": 0.1},
        }));
        let mut master = MasterProcessor::new(&compiled);
        let mut buffer = StereoBuffer::from_mono(vec![1.0; 1000]);
        master.shape(&mut buffer, 0);
        master.finish(&mut buffer, 0, &MasterGains::default());

        assert!((buffer.left[0] - db_to_gain(-6.0)).abs() < 1e-12);
        assert!((buffer.left[899] - db_to_gain(-6.0)).abs() < 1e-12);
        assert!(buffer.left[950] < buffer.left[899]);
        assert_eq!(buffer.left[999], 0.0);
    }

    #[test]
    fn test_flat_tone_passes_through() {
        let compiled = timeline(json!({"eq": {"tilt": "neutral"}}));
        let stage = ToneStage::new(&compiled);
        assert!(stage.is_flat());

        let compiled = timeline(json!({"eq": {"tilt": "warm"}}));
        assert!(!ToneStage::new(&compiled).is_flat());
    }
}
