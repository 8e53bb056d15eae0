//! Rule trees and the merged, per-clip rule set.
//!
//! Rules are authored as JSON objects at three levels (global settings,
//! scene rules, clip rules) and merged in that order by [`merge`]. The typed
//! [`ClipRules`] view is produced once at compile time and shared read-only
//! by every DSP stage afterwards.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SpecError;
use crate::settings::{
    CompressionConfig, CrossfadeConfig, DuckingConfig, EnergyGainRange, ToneShaping,
};

/// An untyped rule tree.
pub type RuleMap = serde_json::Map<String, Value>;

/// Fixed energy ramp window in seconds.
pub const ENERGY_RAMP_DURATION: f64 = 3.0;

/// Scene energy used when a scene omits it.
pub const DEFAULT_SCENE_ENERGY: f64 = 0.5;

/// Keys produced by the compiler that must never appear in authored rules.
pub const ENGINE_KEYS: &[&str] = &[
    "_rules",
    "scene_energy",
    "prev_scene_energy",
    "energy_ramp_duration",
    "dialogue_density",
    "dialogue_density_label",
];

/// Merges `overlay` onto `base` without mutating either.
///
/// A key present in both as objects is merged one level deep: the overlay's
/// inner keys replace the base's inner keys. Every other key present in the
/// overlay replaces the base value wholesale.
pub fn merge(base: &RuleMap, overlay: &RuleMap) -> RuleMap {
    let mut merged = base.clone();
    for (key, value) in overlay {
        match (merged.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                for (inner_key, inner_value) in incoming {
                    existing.insert(inner_key.clone(), inner_value.clone());
                }
            }
            _ => {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

/// Merges a sequence of rule levels in order.
pub fn merge_all<'a>(levels: impl IntoIterator<Item = &'a RuleMap>) -> RuleMap {
    levels
        .into_iter()
        .fold(RuleMap::new(), |acc, level| merge(&acc, level))
}

/// Returns the first engine-generated key found in an authored rule tree.
pub fn find_engine_key(rules: &RuleMap) -> Option<&'static str> {
    ENGINE_KEYS
        .iter()
        .copied()
        .find(|key| rules.contains_key(*key))
}

/// Parses an optional typed block out of a rule tree.
pub(crate) fn parse_block<T: DeserializeOwned>(
    rules: &RuleMap,
    key: &str,
    path: &str,
) -> Result<Option<T>, SpecError> {
    match rules.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| SpecError::invalid_rules(format!("{}.{}", path, key), e.to_string())),
    }
}

/// Discrete dialogue density level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityLabel {
    Low,
    Medium,
    High,
}

impl DensityLabel {
    /// Classifies a voice-coverage ratio.
    pub fn classify(ratio: f64) -> Self {
        if ratio < 0.25 {
            DensityLabel::Low
        } else if ratio <= 0.60 {
            DensityLabel::Medium
        } else {
            DensityLabel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DensityLabel::Low => "low",
            DensityLabel::Medium => "medium",
            DensityLabel::High => "high",
        }
    }
}

/// Dialogue coverage of a scene. Only the label drives gain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DialogueDensity {
    pub ratio: f64,
    pub label: DensityLabel,
}

impl DialogueDensity {
    pub fn from_ratio(ratio: f64) -> Self {
        let ratio = ratio.clamp(0.0, 1.0);
        Self {
            ratio,
            label: DensityLabel::classify(ratio),
        }
    }
}

/// The merged rule set attached to a compiled clip.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ClipRules {
    pub ducking: Option<DuckingConfig>,
    pub compression: Option<CompressionConfig>,
    /// Broad tonal shaping (`eq` key).
    pub tone: Option<ToneShaping>,
    pub sfx_scene_energy_gain: Option<EnergyGainRange>,
    pub scene_crossfade: Option<CrossfadeConfig>,
    pub scene_energy: Option<f64>,
    pub prev_scene_energy: Option<f64>,
    /// Seconds. Only meaningful when `scene_energy` is set.
    pub energy_ramp_duration: f64,
    pub dialogue_density: Option<DialogueDensity>,
}

impl ClipRules {
    /// Interprets a merged rule tree. Engine keys in the tree are ignored.
    pub fn from_rules(rules: &RuleMap, path: &str) -> Result<Self, SpecError> {
        Ok(Self {
            ducking: parse_block(rules, "ducking", path)?,
            compression: parse_block(rules, "dialogue_compression", path)?,
            tone: parse_block(rules, "eq", path)?,
            sfx_scene_energy_gain: parse_block(rules, "sfx_scene_energy_gain", path)?,
            scene_crossfade: parse_block(rules, "scene_crossfade", path)?,
            scene_energy: None,
            prev_scene_energy: None,
            energy_ramp_duration: ENERGY_RAMP_DURATION,
            dialogue_density: None,
        })
    }

    /// Active ducking configuration, if any.
    pub fn active_ducking(&self) -> Option<&DuckingConfig> {
        self.ducking.as_ref().filter(|d| d.enabled)
    }

    /// Active compression configuration, if any.
    pub fn active_compression(&self) -> Option<&CompressionConfig> {
        self.compression.as_ref().filter(|c| c.enabled)
    }
}
