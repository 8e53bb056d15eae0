//! EQ presets and master tonal shaping.
//!
//! Presets are intentionally broad: one high-pass, an optional low-pass and
//! at most one primary band held to musical ranges.

use mixdown_spec::{Clip, CompiledTrack, EqPresetName, SemanticRole, Tilt, ToneShaping};
use tracing::warn;

use crate::filter::{BiquadCoeffs, FilterChain, BUTTERWORTH_Q};

/// Primary band limits.
const BAND_Q_RANGE: (f64, f64) = (0.7, 1.2);
const BAND_GAIN_RANGE: (f64, f64) = (-3.0, 3.0);
const BAND_FREQ_RANGE: (f64, f64) = (80.0, 8000.0);
/// Bands quieter than this are skipped.
const MIN_BAND_GAIN: f64 = 0.1;

/// Tonal shelf corner frequencies.
const LOW_SHELF_HZ: f64 = 200.0;
const HIGH_SHELF_HZ: f64 = 4000.0;
const SHELF_SLOPE: f64 = 1.0;

/// The single peaking band of a preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqBand {
    pub frequency: f64,
    pub gain_db: f64,
    pub q: f64,
}

/// Filter parameters of an EQ preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqPreset {
    pub highpass: f64,
    pub lowpass: Option<f64>,
    pub band: Option<EqBand>,
}

const fn preset(highpass: f64, lowpass: Option<f64>, band: Option<(f64, f64, f64)>) -> EqPreset {
    EqPreset {
        highpass,
        lowpass,
        band: match band {
            Some((frequency, gain_db, q)) => Some(EqBand {
                frequency,
                gain_db,
                q,
            }),
            None => None,
        },
    }
}

/// Returns the parameters of a named preset.
pub fn preset_params(name: EqPresetName) -> EqPreset {
    match name {
        EqPresetName::DialogueClean => preset(80.0, None, Some((3000.0, 2.0, 1.0))),
        EqPresetName::DialogueWarm => preset(60.0, None, Some((200.0, 1.0, 0.8))),
        EqPresetName::DialogueBroadcast => preset(100.0, None, Some((3000.0, 3.0, 1.0))),
        EqPresetName::MusicFull => preset(40.0, None, None),
        EqPresetName::MusicBed => preset(80.0, Some(12000.0), Some((2500.0, -2.0, 0.8))),
        EqPresetName::BackgroundSoft => preset(100.0, Some(8000.0), None),
        EqPresetName::BackgroundDistant => preset(150.0, Some(6000.0), Some((1000.0, -2.0, 0.7))),
        EqPresetName::SfxPunch => preset(60.0, None, Some((100.0, 2.0, 0.8))),
        EqPresetName::SfxSubtle => preset(80.0, Some(10000.0), None),
    }
}

impl EqPreset {
    /// Builds the filter chain for this preset.
    pub fn chain(&self, sample_rate: u32) -> FilterChain {
        let sr = sample_rate as f64;
        let nyquist_guard = sr * 0.45;
        let mut coeffs = vec![BiquadCoeffs::highpass(
            self.highpass.min(nyquist_guard),
            BUTTERWORTH_Q,
            sr,
        )];
        if let Some(lowpass) = self.lowpass {
            if lowpass < nyquist_guard {
                coeffs.push(BiquadCoeffs::lowpass(lowpass, BUTTERWORTH_Q, sr));
            }
        }
        if let Some(band) = self.band {
            let gain = band.gain_db.clamp(BAND_GAIN_RANGE.0, BAND_GAIN_RANGE.1);
            if gain.abs() >= MIN_BAND_GAIN {
                let frequency = band
                    .frequency
                    .clamp(BAND_FREQ_RANGE.0, BAND_FREQ_RANGE.1)
                    .min(nyquist_guard);
                let q = band.q.clamp(BAND_Q_RANGE.0, BAND_Q_RANGE.1);
                coeffs.push(BiquadCoeffs::peaking_eq(frequency, q, gain, sr));
            }
        }
        FilterChain::new(coeffs)
    }
}

/// Resolves the preset for a clip.
///
/// Order: clip override, track override, mix-role default, semantic default.
/// An explicit but unknown name disables EQ for the clip.
pub fn resolve_preset(
    track: &CompiledTrack,
    clip: &Clip,
    semantic_role: Option<SemanticRole>,
) -> Option<EqPreset> {
    let explicit = clip.eq_preset.as_deref().or(track.eq_preset.as_deref());
    if let Some(name) = explicit {
        return match name.parse::<EqPresetName>() {
            Ok(name) => Some(preset_params(name)),
            Err(_) => {
                warn!(track = %track.id, file = %clip.file, preset = name, "unknown EQ preset, rendering without EQ");
                None
            }
        };
    }
    EqPresetName::for_role(track.kind, track.role)
        .or_else(|| semantic_role.and_then(EqPresetName::for_semantic))
        .map(preset_params)
}

/// Shelf kind used by tonal shaping.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Shelf {
    Low(f64),
    High(f64),
}

/// Broad master tonal shaping: tilt plus optional shelves.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToneProfile {
    shelves: Vec<Shelf>,
}

impl ToneProfile {
    /// Builds a profile from authored tonal shaping.
    pub fn from_shaping(tone: &ToneShaping) -> Self {
        let mut shelves = match tone.tilt_preset() {
            Tilt::Warm => vec![Shelf::Low(1.5), Shelf::High(-1.5)],
            Tilt::Bright => vec![Shelf::Low(-1.0), Shelf::High(2.0)],
            Tilt::Neutral => Vec::new(),
        };
        if let Some(db) = tone.low_shelf.filter(|db| *db != 0.0) {
            shelves.push(Shelf::Low(db));
        }
        if let Some(db) = tone.high_shelf.filter(|db| *db != 0.0) {
            shelves.push(Shelf::High(db));
        }
        Self { shelves }
    }

    /// Returns true if the profile leaves audio unchanged.
    pub fn is_flat(&self) -> bool {
        self.shelves.is_empty()
    }

    /// Builds the filter chain for this profile.
    pub fn chain(&self, sample_rate: u32) -> FilterChain {
        let sr = sample_rate as f64;
        let high_hz = HIGH_SHELF_HZ.min(sr * 0.45);
        FilterChain::new(self.shelves.iter().map(|shelf| match *shelf {
            Shelf::Low(db) => BiquadCoeffs::low_shelf(LOW_SHELF_HZ, db, SHELF_SLOPE, sr),
            Shelf::High(db) => BiquadCoeffs::high_shelf(high_hz, db, SHELF_SLOPE, sr),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixdown_spec::{ClipRules, MixRole, TrackKind};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn track(kind: TrackKind, role: MixRole, preset: Option<&str>) -> CompiledTrack {
        CompiledTrack {
            id: "t".into(),
            kind,
            role,
            semantic_role: None,
            eq_preset: preset.map(String::from),
            gain: 0.0,
            clips: Vec::new(),
        }
    }

    fn clip(preset: Option<&str>) -> Clip {
        Clip {
            file: "a.wav".into(),
            start: Some(0.0),
            end: None,
            looping: false,
            gain: 0.0,
            eq_preset: preset.map(String::from),
            semantic_role: None,
            fade_in: None,
            fade_out: None,
            rules: Arc::new(ClipRules::default()),
            crossfade_allowance: 0.0,
        }
    }

    #[test]
    fn test_resolution_order() {
        let voice = track(TrackKind::Voice, MixRole::Voice, Some("dialogue_warm"));
        assert_eq!(
            resolve_preset(&voice, &clip(Some("dialogue_broadcast@v1")), None),
            Some(preset_params(EqPresetName::DialogueBroadcast))
        );
        assert_eq!(
            resolve_preset(&voice, &clip(None), None),
            Some(preset_params(EqPresetName::DialogueWarm))
        );

        let music = track(TrackKind::Music, MixRole::Foreground, None);
        assert_eq!(
            resolve_preset(&music, &clip(None), None),
            Some(preset_params(EqPresetName::MusicBed))
        );

        let sfx = track(TrackKind::Sfx, MixRole::Foreground, None);
        assert_eq!(
            resolve_preset(&sfx, &clip(None), Some(SemanticRole::Impact)),
            Some(preset_params(EqPresetName::SfxPunch))
        );
        assert_eq!(resolve_preset(&sfx, &clip(None), Some(SemanticRole::Interaction)), None);
    }

    #[test]
    fn test_unknown_name_disables_eq() {
        let music = track(TrackKind::Music, MixRole::Foreground, Some("telephone"));
        assert_eq!(resolve_preset(&music, &clip(None), None), None);
    }

    #[test]
    fn test_band_is_clamped_and_small_bands_skipped() {
        let wild = EqPreset {
            highpass: 80.0,
            lowpass: None,
            band: Some(EqBand {
                frequency: 20000.0,
                gain_db: 12.0,
                q: 8.0,
            }),
        };
        let expected = FilterChain::new([
            BiquadCoeffs::highpass(80.0, BUTTERWORTH_Q, 44100.0),
            BiquadCoeffs::peaking_eq(8000.0, 1.2, 3.0, 44100.0),
        ]);
        assert_eq!(format!("{:?}", wild.chain(44100)), format!("{:?}", expected));

        let tiny = EqPreset {
            band: Some(EqBand {
                frequency: 1000.0,
                gain_db: 0.05,
                q: 1.0,
            }),
            ..wild
        };
        let expected = FilterChain::new([BiquadCoeffs::highpass(80.0, BUTTERWORTH_Q, 44100.0)]);
        assert_eq!(format!("{:?}", tiny.chain(44100)), format!("{:?}", expected));
    }

    #[test]
    fn test_tone_profiles() {
        let warm = ToneShaping {
            tilt: Some("warm".into()),
            high_shelf: Some(-1.0),
            low_shelf: None,
        };
        assert_eq!(ToneProfile::from_shaping(&warm).shelves.len(), 3);

        let neutral = ToneShaping {
            tilt: Some("sparkly".into()),
            high_shelf: None,
            low_shelf: Some(0.0),
        };
        assert!(ToneProfile::from_shaping(&neutral).is_flat());
        assert!(ToneProfile::from_shaping(&neutral).chain(44100).is_empty());
    }
}
