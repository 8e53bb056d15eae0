//! Compilation of an authored timeline into placed clips.
//!
//! [`compile`] runs the scene compiler and then the overlap resolver. The
//! result no longer contains scenes: every clip carries its own absolute
//! position and an immutable merged rule set.

mod overlap;
mod scene;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::SpecError;
use crate::rules::ClipRules;
use crate::settings::{RenderSettings, ToneShaping};
use crate::timeline::{Fade, MixRole, Project, SemanticRole, TrackKind};

pub use overlap::OverlapResolver;
pub use scene::{SceneCompiler, CROSSFADE_TOUCH_TOLERANCE};

/// Source durations needed to place clips in time.
pub trait DurationProbe {
    /// Duration in seconds of the source file, or `None` if unknown.
    fn duration(&self, file: &str) -> Option<f64>;

    /// Why a source could not be read, when known.
    fn load_error(&self, _file: &str) -> Option<String> {
        None
    }
}

impl DurationProbe for HashMap<String, f64> {
    fn duration(&self, file: &str) -> Option<f64> {
        self.get(file).copied()
    }
}

impl DurationProbe for BTreeMap<String, f64> {
    fn duration(&self, file: &str) -> Option<f64> {
        self.get(file).copied()
    }
}

/// A probe that knows no durations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDurations;

impl DurationProbe for NoDurations {
    fn duration(&self, _file: &str) -> Option<f64> {
        None
    }
}

/// A placed clip after compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub file: String,
    /// Absolute start in seconds. `None` means not yet placed.
    pub start: Option<f64>,
    /// Absolute end (loop-until) in seconds.
    pub end: Option<f64>,
    pub looping: bool,
    /// Clip gain in dB.
    pub gain: f64,
    pub eq_preset: Option<String>,
    pub semantic_role: Option<SemanticRole>,
    pub fade_in: Option<Fade>,
    pub fade_out: Option<Fade>,
    pub rules: Arc<ClipRules>,
    /// Intentional overlap with the preceding clip, created by a crossfade.
    pub crossfade_allowance: f64,
}

impl Clip {
    /// Absolute end time, if the clip is placed and its length is known.
    pub fn end_time(&self, probe: &dyn DurationProbe) -> Option<f64> {
        let start = self.start?;
        if self.looping {
            return Some(self.end.unwrap_or(start).max(start));
        }
        let natural = start + probe.duration(&self.file)?;
        Some(match self.end {
            Some(end) => natural.min(end).max(start),
            None => natural,
        })
    }

    /// True if the clip was produced from a scene.
    pub fn is_scene_clip(&self) -> bool {
        self.rules.scene_energy.is_some()
    }
}

/// A track after compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTrack {
    pub id: String,
    pub kind: TrackKind,
    pub role: MixRole,
    pub semantic_role: Option<SemanticRole>,
    pub eq_preset: Option<String>,
    /// Track gain in dB.
    pub gain: f64,
    pub clips: Vec<Clip>,
}

impl CompiledTrack {
    /// The effective semantic role of a clip on this track.
    pub fn semantic_role_of(&self, clip: &Clip) -> Option<SemanticRole> {
        clip.semantic_role.or(self.semantic_role)
    }

    /// True for dialogue tracks.
    pub fn is_voice(&self) -> bool {
        self.kind == TrackKind::Voice || self.role == MixRole::Voice
    }

    /// True for tracks driven by scene energy and dialogue density.
    pub fn is_energy_driven(&self) -> bool {
        self.kind == TrackKind::Music || self.role == MixRole::Background
    }
}

/// Tonal shaping active over one scene window.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneSegment {
    pub start: f64,
    pub end: f64,
    pub tone: ToneShaping,
}

/// The fully compiled, render-ready timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTimeline {
    pub project: Project,
    pub settings: RenderSettings,
    pub tracks: Vec<CompiledTrack>,
    /// Scene-windowed tonal shaping, sorted by start.
    pub tone_map: Vec<ToneSegment>,
}

impl CompiledTimeline {
    /// Iterates over all placed clips with their tracks.
    pub fn placed_clips(&self) -> impl Iterator<Item = (&CompiledTrack, &Clip)> {
        self.tracks.iter().flat_map(|track| {
            track
                .clips
                .iter()
                .filter(|clip| clip.start.is_some())
                .map(move |clip| (track, clip))
        })
    }
}

/// Compiles scenes into clips and resolves same-track overlaps.
pub fn compile(
    timeline: &crate::timeline::Timeline,
    probe: &dyn DurationProbe,
) -> Result<CompiledTimeline, SpecError> {
    let mut compiled = SceneCompiler::new(timeline).compile(probe)?;
    let resolver = OverlapResolver::new(compiled.settings.default_silence);
    for track in &mut compiled.tracks {
        let shifted = resolver.resolve(&mut track.clips, probe);
        if shifted > 0 {
            tracing::debug!(track = %track.id, shifted, "resolved clip overlaps");
        }
    }
    Ok(compiled)
}
