//! Typed configuration blocks read from rule trees.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SpecError;
use crate::rules::{parse_block, RuleMap};
use crate::timeline::{FadeCurve, RoleSelector, SemanticRole};

/// Ducking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuckingMode {
    /// Timing-aware gain envelope around trigger activity.
    #[default]
    #[serde(alias = "audacity")]
    Envelope,
    /// Constant attenuation whenever the trigger role is present at all.
    Scene,
}

/// Ducking configuration (`ducking` key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DuckingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub mode: DuckingMode,
    /// Attenuation in dB (negative).
    #[serde(default = "default_duck_amount")]
    pub duck_amount: f64,
    #[serde(default = "default_fade_down_ms")]
    pub fade_down_ms: f64,
    #[serde(default = "default_fade_up_ms")]
    pub fade_up_ms: f64,
    #[serde(default = "default_min_pause_ms")]
    pub min_pause_ms: f64,
    #[serde(default)]
    pub onset_delay_ms: f64,
    #[serde(default)]
    pub rules: Vec<DuckingRule>,
}

impl Default for DuckingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: DuckingMode::default(),
            duck_amount: default_duck_amount(),
            fade_down_ms: default_fade_down_ms(),
            fade_up_ms: default_fade_up_ms(),
            min_pause_ms: default_min_pause_ms(),
            onset_delay_ms: 0.0,
            rules: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_duck_amount() -> f64 {
    -6.0
}

fn default_fade_down_ms() -> f64 {
    250.0
}

fn default_fade_up_ms() -> f64 {
    500.0
}

fn default_min_pause_ms() -> f64 {
    300.0
}

/// A single `{when, duck}` rule. Timing fields override the block defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DuckingRule {
    pub when: String,
    pub duck: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duck_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_down_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_up_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_pause_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onset_delay_ms: Option<f64>,
}

impl DuckingRule {
    /// Parses the trigger selector.
    pub fn trigger(&self) -> Result<RoleSelector, SpecError> {
        self.when.parse()
    }

    /// Parses all target selectors.
    pub fn targets(&self) -> Result<Vec<RoleSelector>, SpecError> {
        self.duck.iter().map(|s| s.parse()).collect()
    }
}

/// Dialogue compressor configuration (`dialogue_compression` key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompressionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Threshold in dBFS.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_ratio")]
    pub ratio: f64,
    #[serde(default = "default_attack_ms")]
    pub attack_ms: f64,
    #[serde(default = "default_release_ms")]
    pub release_ms: f64,
    /// Makeup gain in dB.
    #[serde(default)]
    pub makeup_gain: f64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: default_threshold(),
            ratio: default_ratio(),
            attack_ms: default_attack_ms(),
            release_ms: default_release_ms(),
            makeup_gain: 0.0,
        }
    }
}

fn default_threshold() -> f64 {
    -18.0
}

fn default_ratio() -> f64 {
    4.0
}

fn default_attack_ms() -> f64 {
    10.0
}

fn default_release_ms() -> f64 {
    120.0
}

/// Tonal tilt presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tilt {
    Warm,
    Neutral,
    Bright,
}

impl Tilt {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "warm" => Some(Tilt::Warm),
            "neutral" => Some(Tilt::Neutral),
            "bright" => Some(Tilt::Bright),
            _ => None,
        }
    }
}

/// Broad tonal shaping (`eq` key). Only tilt and shelves are accepted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToneShaping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tilt: Option<String>,
    /// High shelf gain in dB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_shelf: Option<f64>,
    /// Low shelf gain in dB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_shelf: Option<f64>,
}

impl ToneShaping {
    /// The tilt preset. Unknown names resolve to neutral.
    pub fn tilt_preset(&self) -> Tilt {
        self.tilt
            .as_deref()
            .and_then(Tilt::from_name)
            .unwrap_or(Tilt::Neutral)
    }

    /// True when the shaping changes nothing.
    pub fn is_flat(&self) -> bool {
        self.tilt_preset() == Tilt::Neutral
            && self.high_shelf.unwrap_or(0.0) == 0.0
            && self.low_shelf.unwrap_or(0.0) == 0.0
    }
}

/// Scene crossfade configuration (`scene_crossfade` key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrossfadeConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Seconds.
    #[serde(default = "default_crossfade_duration")]
    pub duration: f64,
}

impl Default for CrossfadeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration: default_crossfade_duration(),
        }
    }
}

fn default_crossfade_duration() -> f64 {
    1.5
}

/// Override of the scene-energy gain range for sound effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnergyGainRange {
    /// `n` means `[-|n|, |n|]`.
    Symmetric(f64),
    /// `[min_db, max_db]`.
    Pair([f64; 2]),
    /// Either bound may be omitted to keep the role default.
    Bounds(EnergyGainBounds),
    /// A separate override per semantic role.
    PerRole(BTreeMap<SemanticRole, EnergyGainRange>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnergyGainBounds {
    #[serde(default, alias = "min", skip_serializing_if = "Option::is_none")]
    pub min_db: Option<f64>,
    #[serde(default, alias = "max", skip_serializing_if = "Option::is_none")]
    pub max_db: Option<f64>,
}

impl EnergyGainRange {
    /// Resolves the range for a role given its default `(min, max)`.
    pub fn resolve(&self, role: SemanticRole, default: (f64, f64)) -> (f64, f64) {
        match self {
            EnergyGainRange::Symmetric(n) => (-n.abs(), n.abs()),
            EnergyGainRange::Pair([min, max]) => (*min, *max),
            EnergyGainRange::Bounds(b) => (
                b.min_db.unwrap_or(default.0),
                b.max_db.unwrap_or(default.1),
            ),
            EnergyGainRange::PerRole(map) => match map.get(&role) {
                Some(inner) => inner.resolve(role, default),
                None => default,
            },
        }
    }
}

/// Master loudness normalization (`loudness` key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoudnessSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_target_lufs")]
    pub target_lufs: f64,
}

impl Default for LoudnessSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            target_lufs: default_target_lufs(),
        }
    }
}

fn default_target_lufs() -> f64 {
    -20.0
}

/// Master fade-out (`master_fade_out` key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MasterFadeOut {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds, measured back from the project end.
    #[serde(default = "default_master_fade_duration")]
    pub duration: f64,
    #[serde(default)]
    pub curve: FadeCurve,
}

fn default_master_fade_duration() -> f64 {
    10.0
}

/// Streaming render configuration (`streaming` key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamingSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_chunk_size")]
    pub chunk_size_sec: f64,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_true")]
    pub two_pass_lufs: bool,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            chunk_size_sec: default_chunk_size(),
            max_workers: default_max_workers(),
            two_pass_lufs: true,
        }
    }
}

fn default_chunk_size() -> f64 {
    1.0
}

fn default_max_workers() -> usize {
    4
}

/// Render-level settings, read from the global settings only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSettings {
    pub loudness: LoudnessSettings,
    pub normalize: bool,
    pub peak_target_dbfs: f64,
    pub master_gain: f64,
    pub master_fade_out: Option<MasterFadeOut>,
    pub tone: Option<ToneShaping>,
    pub scene_crossfade: CrossfadeConfig,
    /// Minimum gap in seconds kept between clips on a track.
    pub default_silence: f64,
    pub streaming: StreamingSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            loudness: LoudnessSettings::default(),
            normalize: false,
            peak_target_dbfs: -1.0,
            master_gain: 0.0,
            master_fade_out: None,
            tone: None,
            scene_crossfade: CrossfadeConfig::default(),
            default_silence: 0.0,
            streaming: StreamingSettings::default(),
        }
    }
}

impl RenderSettings {
    /// Reads render settings from the global settings tree.
    pub fn from_rules(settings: &RuleMap) -> Result<Self, SpecError> {
        let path = "settings";
        let defaults = Self::default();
        Ok(Self {
            loudness: parse_block(settings, "loudness", path)?.unwrap_or(defaults.loudness),
            normalize: parse_block(settings, "normalize", path)?.unwrap_or(defaults.normalize),
            peak_target_dbfs: parse_block(settings, "peak_target_dbfs", path)?
                .unwrap_or(defaults.peak_target_dbfs),
            master_gain: parse_block(settings, "master_gain", path)?
                .unwrap_or(defaults.master_gain),
            master_fade_out: parse_block::<MasterFadeOut>(settings, "master_fade_out", path)?
                .filter(|f| f.enabled),
            tone: parse_block(settings, "eq", path)?,
            scene_crossfade: parse_block(settings, "scene_crossfade", path)?
                .unwrap_or(defaults.scene_crossfade),
            default_silence: parse_block(settings, "default_silence", path)?
                .unwrap_or(defaults.default_silence),
            streaming: parse_block(settings, "streaming", path)?.unwrap_or(defaults.streaming),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_ducking_defaults_and_alias() {
        let cfg: DuckingConfig =
            serde_json::from_value(json!({"mode": "audacity", "rules": []})).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.mode, DuckingMode::Envelope);
        assert_eq!(cfg.duck_amount, -6.0);

        let cfg: DuckingConfig = serde_json::from_value(json!({"mode": "scene"})).unwrap();
        assert_eq!(cfg.mode, DuckingMode::Scene);
    }

    #[test]
    fn test_tone_shaping_rejects_narrow_bands() {
        let result: Result<ToneShaping, _> =
            serde_json::from_value(json!({"tilt": "warm", "peak": {"freq": 3000}}));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_tilt_is_neutral() {
        let tone = ToneShaping {
            tilt: Some("sparkly".into()),
            ..Default::default()
        };
        assert_eq!(tone.tilt_preset(), Tilt::Neutral);
        assert!(tone.is_flat());
    }

    #[test]
    fn test_energy_gain_override_forms() {
        let role = SemanticRole::Impact;
        let default = (-1.5, 1.5);

        let sym: EnergyGainRange = serde_json::from_value(json!(2.0)).unwrap();
        assert_eq!(sym.resolve(role, default), (-2.0, 2.0));

        let pair: EnergyGainRange = serde_json::from_value(json!([-3.0, 1.0])).unwrap();
        assert_eq!(pair.resolve(role, default), (-3.0, 1.0));

        let bounds: EnergyGainRange = serde_json::from_value(json!({"max_db": 2.5})).unwrap();
        assert_eq!(bounds.resolve(role, default), (-1.5, 2.5));

        let per_role: EnergyGainRange =
            serde_json::from_value(json!({"impact": 1.0, "texture": [0.0, 0.0]})).unwrap();
        assert_eq!(per_role.resolve(role, default), (-1.0, 1.0));
        assert_eq!(
            per_role.resolve(SemanticRole::Movement, (-1.0, 1.0)),
            (-1.0, 1.0)
        );
    }

    #[test]
    fn test_render_settings_from_rules() {
        let settings = json!({
            "loudness": {"target_lufs": -16.0},
            "normalize": true,
            "master_fade_out": {"enabled": false, "duration": 3.0},
            "streaming": {"enabled": true, "chunk_size_sec": 0.5},
            "ducking": {"duck_amount": -9.0}
        });
        let settings = settings.as_object().unwrap().clone();
        let parsed = RenderSettings::from_rules(&settings).unwrap();

        assert!(parsed.loudness.enabled);
        assert_eq!(parsed.loudness.target_lufs, -16.0);
        assert!(parsed.normalize);
        assert_eq!(parsed.peak_target_dbfs, -1.0);
        assert!(parsed.master_fade_out.is_none());
        assert!(parsed.streaming.enabled);
        assert_eq!(parsed.streaming.chunk_size_sec, 0.5);
        assert_eq!(parsed.streaming.max_workers, 4);
    }
}
