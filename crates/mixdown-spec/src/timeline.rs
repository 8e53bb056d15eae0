//! Authored timeline types.
//!
//! These types mirror the JSON document exactly. Scenes only exist at this
//! level; [`crate::compile`] turns them into placed clips.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::SpecError;
use crate::rules::RuleMap;

/// Default project sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
/// Default output bit depth.
pub const DEFAULT_BIT_DEPTH: u16 = 16;
/// Default output channel count.
pub const DEFAULT_CHANNELS: u16 = 2;

/// A complete authored timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Timeline {
    pub project: Project,
    /// Global rule defaults and render settings.
    #[serde(default)]
    pub settings: RuleMap,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub scenes: Vec<Scene>,
}

impl Timeline {
    /// Parses a timeline from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, SpecError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a timeline file.
    pub fn from_path(path: &Path) -> Result<Self, SpecError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Converts the timeline back to a JSON value.
    pub fn to_value(&self) -> Result<serde_json::Value, SpecError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Looks up a track by id.
    pub fn track(&self, id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }
}

/// Project-wide output parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Total length in seconds. All output is truncated to it.
    pub duration: f64,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_bit_depth")]
    pub bit_depth: u16,
    #[serde(default = "default_channels")]
    pub channels: u16,
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_bit_depth() -> u16 {
    DEFAULT_BIT_DEPTH
}

fn default_channels() -> u16 {
    DEFAULT_CHANNELS
}

impl Project {
    /// Number of output frames for the project duration.
    pub fn total_frames(&self) -> usize {
        seconds_to_frames(self.duration, self.sample_rate)
    }
}

/// Converts seconds to a frame count, rounding to the nearest frame.
pub fn seconds_to_frames(seconds: f64, sample_rate: u32) -> usize {
    if seconds <= 0.0 || !seconds.is_finite() {
        return 0;
    }
    (seconds * sample_rate as f64).round() as usize
}

/// What a track carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Music,
    Voice,
    Sfx,
    Ambience,
}

impl TrackKind {
    /// Returns the track kind as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Music => "music",
            TrackKind::Voice => "voice",
            TrackKind::Sfx => "sfx",
            TrackKind::Ambience => "ambience",
        }
    }

    /// The mix role assumed when a track does not declare one.
    pub fn default_role(&self) -> MixRole {
        match self {
            TrackKind::Voice => MixRole::Voice,
            TrackKind::Ambience => MixRole::Background,
            TrackKind::Music | TrackKind::Sfx => MixRole::Foreground,
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TrackKind {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "music" => Ok(TrackKind::Music),
            "voice" => Ok(TrackKind::Voice),
            "sfx" => Ok(TrackKind::Sfx),
            "ambience" => Ok(TrackKind::Ambience),
            _ => Err(SpecError::InvalidSelector(s.to_string())),
        }
    }
}

/// Where a track sits in the mix hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixRole {
    Foreground,
    Background,
    Voice,
}

impl MixRole {
    /// Returns the mix role as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            MixRole::Foreground => "foreground",
            MixRole::Background => "background",
            MixRole::Voice => "voice",
        }
    }
}

impl std::fmt::Display for MixRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MixRole {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "foreground" => Ok(MixRole::Foreground),
            "background" => Ok(MixRole::Background),
            "voice" => Ok(MixRole::Voice),
            _ => Err(SpecError::InvalidSelector(s.to_string())),
        }
    }
}

/// What a sound effect represents, independent of its mix role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticRole {
    Impact,
    Movement,
    Ambience,
    Interaction,
    Texture,
}

impl SemanticRole {
    /// Returns the semantic role as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticRole::Impact => "impact",
            SemanticRole::Movement => "movement",
            SemanticRole::Ambience => "ambience",
            SemanticRole::Interaction => "interaction",
            SemanticRole::Texture => "texture",
        }
    }

    /// Returns all semantic roles.
    pub fn all() -> &'static [SemanticRole] {
        &[
            SemanticRole::Impact,
            SemanticRole::Movement,
            SemanticRole::Ambience,
            SemanticRole::Interaction,
            SemanticRole::Texture,
        ]
    }
}

impl std::fmt::Display for SemanticRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SemanticRole {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SemanticRole::all()
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| SpecError::InvalidSelector(s.to_string()))
    }
}

/// A role selector as used by ducking rules.
///
/// Mix roles, track kinds and semantic roles are kept as separate variants so
/// that `voice` the mix role and `sfx:ambience` the semantic role never share
/// a lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleSelector {
    Mix(MixRole),
    Kind(TrackKind),
    Semantic(SemanticRole),
}

impl RoleSelector {
    /// Returns true if a clip on a track with the given attributes matches.
    pub fn matches(
        &self,
        kind: TrackKind,
        role: MixRole,
        semantic_role: Option<SemanticRole>,
    ) -> bool {
        match self {
            RoleSelector::Mix(r) => *r == role,
            RoleSelector::Kind(k) => *k == kind,
            RoleSelector::Semantic(s) => semantic_role == Some(*s),
        }
    }
}

impl std::fmt::Display for RoleSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoleSelector::Mix(r) => write!(f, "{}", r),
            RoleSelector::Kind(k) => write!(f, "{}", k),
            RoleSelector::Semantic(s) => write!(f, "sfx:{}", s),
        }
    }
}

impl FromStr for RoleSelector {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((prefix, role)) = s.split_once(':') {
            return match prefix {
                "sfx" | "semantic" => role
                    .parse::<SemanticRole>()
                    .map(RoleSelector::Semantic)
                    .map_err(|_| SpecError::InvalidSelector(s.to_string())),
                _ => Err(SpecError::InvalidSelector(s.to_string())),
            };
        }
        if let Ok(role) = s.parse::<MixRole>() {
            return Ok(RoleSelector::Mix(role));
        }
        s.parse::<TrackKind>()
            .map(RoleSelector::Kind)
            .map_err(|_| SpecError::InvalidSelector(s.to_string()))
    }
}

/// A track and its directly authored clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Track {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TrackKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MixRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_role: Option<SemanticRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq_preset: Option<String>,
    /// Track gain in dB.
    #[serde(default)]
    pub gain: f64,
    #[serde(default)]
    pub clips: Vec<TrackClip>,
}

impl Track {
    /// Effective mix role.
    pub fn mix_role(&self) -> MixRole {
        self.role.unwrap_or_else(|| self.kind.default_role())
    }

    /// True for dialogue tracks (voice kind or voice role).
    pub fn is_voice(&self) -> bool {
        self.kind == TrackKind::Voice || self.mix_role() == MixRole::Voice
    }
}

/// A clip authored directly on a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackClip {
    pub file: String,
    /// Absolute start in seconds. Clips without a start are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_until: Option<f64>,
    #[serde(default)]
    pub gain: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_in: Option<Fade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_out: Option<Fade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq_preset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_role: Option<SemanticRole>,
}

/// An authoring-time grouping of clips sharing timing and rule context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scene {
    pub id: String,
    pub start: f64,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
    #[serde(default)]
    pub rules: RuleMap,
    /// Track id to scene-local clip descriptors.
    #[serde(default)]
    pub tracks: BTreeMap<String, Vec<SceneClip>>,
}

impl Scene {
    /// Absolute end time in seconds.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A scene-local clip descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneClip {
    pub file: String,
    /// Offset from the scene start in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
    /// Absolute start in seconds, taking precedence over `offset`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_until: Option<f64>,
    #[serde(default)]
    pub gain: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_in: Option<Fade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_out: Option<Fade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq_preset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_role: Option<SemanticRole>,
    /// Clip-local rule overrides, merged after the scene rules.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub rules: RuleMap,
}

/// Fade gain curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    #[default]
    Linear,
    Logarithmic,
    Exponential,
}

impl FadeCurve {
    /// Returns the curve name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "linear",
            FadeCurve::Logarithmic => "logarithmic",
            FadeCurve::Exponential => "exponential",
        }
    }

    /// Parses a curve name. Unknown names fall back to linear.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "logarithmic" | "log" => FadeCurve::Logarithmic,
            "exponential" | "exp" => FadeCurve::Exponential,
            _ => FadeCurve::Linear,
        }
    }
}

impl<'de> Deserialize<'de> for FadeCurve {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(FadeCurve::from_name(&name))
    }
}

/// A fade with duration in seconds and curve kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "FadeRepr")]
pub struct Fade {
    pub duration: f64,
    pub curve: FadeCurve,
}

impl Fade {
    pub fn new(duration: f64, curve: FadeCurve) -> Self {
        Self { duration, curve }
    }

    /// A linear fade of the given length.
    pub fn linear(duration: f64) -> Self {
        Self::new(duration, FadeCurve::Linear)
    }

    /// Returns a fade at least `min_duration` long, keeping the curve.
    pub fn at_least(fade: Option<Fade>, min_duration: f64) -> Fade {
        match fade {
            Some(f) => Fade::new(f.duration.max(min_duration), f.curve),
            None => Fade::linear(min_duration),
        }
    }
}

/// Accepted authored forms of a fade.
#[derive(Deserialize)]
#[serde(untagged)]
enum FadeRepr {
    Seconds(f64),
    Shaped {
        duration: f64,
        #[serde(default)]
        curve: FadeCurve,
    },
}

impl From<FadeRepr> for Fade {
    fn from(repr: FadeRepr) -> Self {
        match repr {
            FadeRepr::Seconds(duration) => Fade::linear(duration),
            FadeRepr::Shaped { duration, curve } => Fade::new(duration, curve),
        }
    }
}
