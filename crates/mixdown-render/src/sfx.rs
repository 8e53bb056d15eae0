//! Semantic sound-effect defaults: loudness targets, fade shapes and
//! scene-energy gain ranges.

use mixdown_spec::settings::EnergyGainRange;
use mixdown_spec::{Fade, FadeCurve, SemanticRole};

/// Loudness target for SFX clips without a semantic role.
pub const DEFAULT_SFX_LUFS: f64 = -20.0;

/// Bounds for the scene-energy gain of any SFX clip (dB).
const ENERGY_GAIN_LIMITS: (f64, f64) = (-6.0, 3.0);

/// Per-role defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemanticProfile {
    pub lufs: f64,
    pub fade_in_ms: f64,
    pub fade_out_ms: f64,
    pub curve: FadeCurve,
    /// Default scene-energy gain range `(min_db, max_db)`.
    pub energy_range: (f64, f64),
}

impl SemanticProfile {
    /// Looks up the profile of a semantic role.
    pub fn of(role: SemanticRole) -> Self {
        let (lufs, fade_in_ms, fade_out_ms, curve, energy_range) = match role {
            SemanticRole::Impact => (-18.0, 0.0, 75.0, FadeCurve::Exponential, (-1.5, 1.5)),
            SemanticRole::Movement => (-20.0, 150.0, 150.0, FadeCurve::Linear, (-1.0, 1.0)),
            SemanticRole::Ambience => (-22.0, 750.0, 750.0, FadeCurve::Logarithmic, (-2.0, 0.5)),
            SemanticRole::Interaction => (-20.0, 250.0, 250.0, FadeCurve::Linear, (-1.0, 1.0)),
            SemanticRole::Texture => (-24.0, 1500.0, 1500.0, FadeCurve::Logarithmic, (-2.5, 0.5)),
        };
        Self {
            lufs,
            fade_in_ms,
            fade_out_ms,
            curve,
            energy_range,
        }
    }

    /// Default fade-in, if the role has one.
    pub fn fade_in(&self) -> Option<Fade> {
        (self.fade_in_ms > 0.0).then(|| Fade::new(self.fade_in_ms / 1000.0, self.curve))
    }

    /// Default fade-out, if the role has one.
    pub fn fade_out(&self) -> Option<Fade> {
        (self.fade_out_ms > 0.0).then(|| Fade::new(self.fade_out_ms / 1000.0, self.curve))
    }
}

/// Loudness target of an SFX clip.
pub fn sfx_target_lufs(role: Option<SemanticRole>) -> f64 {
    role.map_or(DEFAULT_SFX_LUFS, |r| SemanticProfile::of(r).lufs)
}

/// Scene-energy gain in dB for an SFX clip.
///
/// Energy maps linearly onto the role's range (or its override) and the
/// result is held to the global limits.
pub fn scene_energy_gain_db(
    role: SemanticRole,
    energy: f64,
    range_override: Option<&EnergyGainRange>,
) -> f64 {
    let default = SemanticProfile::of(role).energy_range;
    let (min_db, max_db) = range_override.map_or(default, |r| r.resolve(role, default));
    let gain = min_db + energy.clamp(0.0, 1.0) * (max_db - min_db);
    gain.clamp(ENERGY_GAIN_LIMITS.0, ENERGY_GAIN_LIMITS.1)
}
