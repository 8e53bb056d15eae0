//! Render plans: every placed clip resolved to frames, gains and processors.
//!
//! Planning happens once per render. Both render modes execute the same
//! plans, which keeps their output aligned to the frame.

use mixdown_spec::{
    seconds_to_frames, Clip, CompiledTimeline, CompiledTrack, CompressionConfig, MixRole,
    TrackKind,
};
use tracing::{debug, warn};

use crate::buffer::{db_to_gain, StereoBuffer};
use crate::error::RenderResult;
use crate::ducking::{ClipDucking, DuckingEngine};
use crate::energy::{density_gain_db, EnergyRamp};
use crate::eq::{resolve_preset, EqPreset};
use crate::fades::{ClipFades, FrameFade};
use crate::loudness::LoudnessMeter;
use crate::sfx::{scene_energy_gain_db, sfx_target_lufs, SemanticProfile};
use crate::source::{ClipSource, SourceCache};

/// Frames measured per read when computing a clip's semantic gain.
const MEASURE_BLOCK: usize = 1 << 16;

/// A clip ready to render.
#[derive(Debug, Clone)]
pub struct ClipPlan {
    pub track_index: usize,
    pub clip_index: usize,
    pub file: String,
    pub source: ClipSource,
    /// First canvas frame.
    pub start_frame: usize,
    /// One past the last canvas frame, never past the project end.
    pub end_frame: usize,
    pub looping: bool,
    /// Linear track plus clip gain.
    pub pre_gain: f64,
    pub eq: Option<EqPreset>,
    /// Linear semantic loudness and scene-energy gain for sound effects.
    pub semantic_gain: f64,
    pub ramp: Option<EnergyRamp>,
    /// Linear dialogue density gain.
    pub density_gain: f64,
    pub ducking: Option<ClipDucking>,
    pub compression: Option<CompressionConfig>,
    pub fades: ClipFades,
}

impl ClipPlan {
    /// Number of placed frames.
    pub fn len(&self) -> usize {
        self.end_frame - self.start_frame
    }

    /// Returns true if the clip places no frames.
    pub fn is_empty(&self) -> bool {
        self.end_frame <= self.start_frame
    }

    /// Source frame played at an absolute canvas frame.
    #[inline]
    pub fn source_frame(&self, frame: usize) -> usize {
        let offset = frame - self.start_frame;
        if self.looping {
            offset % self.source.len()
        } else {
            offset
        }
    }
}

/// Plans of one track, sorted by start frame.
#[derive(Debug, Clone)]
pub struct TrackPlan {
    pub index: usize,
    pub id: String,
    pub kind: TrackKind,
    /// Loudness target applied to the mixed track, if any.
    pub role_target: Option<f64>,
    pub clips: Vec<ClipPlan>,
}

/// All plans of a render.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub sample_rate: u32,
    pub channels: u16,
    pub total_frames: usize,
    pub tracks: Vec<TrackPlan>,
    /// Clips dropped during planning.
    pub skipped: usize,
}

impl RenderPlan {
    /// Number of clips that will render.
    pub fn clip_count(&self) -> usize {
        self.tracks.iter().map(|t| t.clips.len()).sum()
    }
}

/// Role loudness target of a mixed track. Sound effects are normalized per clip.
pub fn role_target(track: &CompiledTrack) -> Option<f64> {
    if track.kind == TrackKind::Sfx {
        return None;
    }
    Some(match track.role {
        MixRole::Voice => -18.0,
        MixRole::Foreground => -28.0,
        MixRole::Background => -30.0,
    })
}

/// Builds render plans for a compiled timeline.
pub struct Planner<'a> {
    timeline: &'a CompiledTimeline,
    sources: &'a SourceCache,
    ducking: DuckingEngine,
}

impl<'a> Planner<'a> {
    pub fn new(timeline: &'a CompiledTimeline, sources: &'a SourceCache) -> Self {
        Self {
            timeline,
            sources,
            ducking: DuckingEngine::new(timeline, sources),
        }
    }

    /// Plans every placed clip. Clips that cannot render are skipped with a warning.
    pub fn plan(&self) -> RenderPlan {
        let project = &self.timeline.project;
        let mut skipped = 0;
        let mut tracks = Vec::with_capacity(self.timeline.tracks.len());

        for (track_index, track) in self.timeline.tracks.iter().enumerate() {
            let mut clips = Vec::new();
            for (clip_index, clip) in track.clips.iter().enumerate() {
                match self.plan_clip(track_index, track, clip_index, clip) {
                    Some(plan) if !plan.is_empty() => clips.push(plan),
                    Some(_) => {
                        debug!(track = %track.id, file = %clip.file, "clip places no frames");
                    }
                    None => skipped += 1,
                }
            }
            clips.sort_by_key(|c| (c.start_frame, c.clip_index));
            debug!(track = %track.id, clips = clips.len(), "planned track");
            tracks.push(TrackPlan {
                index: track_index,
                id: track.id.clone(),
                kind: track.kind,
                role_target: role_target(track),
                clips,
            });
        }

        RenderPlan {
            sample_rate: project.sample_rate,
            channels: project.channels,
            total_frames: project.total_frames(),
            tracks,
            skipped,
        }
    }

    fn plan_clip(
        &self,
        track_index: usize,
        track: &CompiledTrack,
        clip_index: usize,
        clip: &Clip,
    ) -> Option<ClipPlan> {
        let Some(start) = clip.start else {
            warn!(track = %track.id, file = %clip.file, "skipping clip without start time");
            return None;
        };
        let Some(source) = self.sources.get(&clip.file) else {
            warn!(track = %track.id, file = %clip.file, "skipping clip with unavailable source");
            return None;
        };

        let sr = self.timeline.project.sample_rate;
        let total = self.timeline.project.total_frames();
        // Starts at or past the end collapse to an empty clip at `total`.
        let start_frame = seconds_to_frames(start, sr).min(total);
        let end_frame = if source.is_empty() {
            start_frame
        } else {
            let end = clip
                .end_time(self.sources)
                .map_or(start_frame, |end| seconds_to_frames(end, sr));
            if clip.looping {
                end
            } else {
                end.min(start_frame.saturating_add(source.len()))
            }
        }
        .min(total)
        .max(start_frame);

        let semantic = track.semantic_role_of(clip);
        let pre_gain = db_to_gain(track.gain + clip.gain);
        let eq = resolve_preset(track, clip, semantic);

        let mut semantic_gain = 1.0;
        if track.kind == TrackKind::Sfx && end_frame > start_frame {
            let target = sfx_target_lufs(semantic);
            semantic_gain = match self.semantic_gain(&source, pre_gain, eq.as_ref(), target) {
                Ok(gain) => gain,
                Err(e) => {
                    warn!(
                        track = %track.id,
                        file = %clip.file,
                        error = %e,
                        "skipping unmeasurable clip"
                    );
                    return None;
                }
            };
            if let (Some(role), Some(energy)) = (semantic, clip.rules.scene_energy) {
                let energy_db =
                    scene_energy_gain_db(role, energy, clip.rules.sfx_scene_energy_gain.as_ref());
                semantic_gain *= db_to_gain(energy_db);
            }
        }

        let (ramp, density_gain) = if track.is_energy_driven() {
            (
                EnergyRamp::from_rules(&clip.rules, sr),
                clip.rules
                    .dialogue_density
                    .map_or(1.0, |d| db_to_gain(density_gain_db(d.label))),
            )
        } else {
            (None, 1.0)
        };

        let compression = if track.is_voice() {
            clip.rules.active_compression().cloned()
        } else {
            None
        };

        let profile = semantic.map(SemanticProfile::of);
        let fade_in = clip.fade_in.or_else(|| profile.and_then(|p| p.fade_in()));
        let fade_out = clip.fade_out.or_else(|| profile.and_then(|p| p.fade_out()));
        let fades = ClipFades::new(
            start_frame,
            end_frame,
            fade_in.and_then(|f| FrameFade::from_fade(f, sr)),
            fade_out.and_then(|f| FrameFade::from_fade(f, sr)),
        );

        Some(ClipPlan {
            track_index,
            clip_index,
            file: clip.file.clone(),
            source,
            start_frame,
            end_frame,
            looping: clip.looping,
            pre_gain,
            eq,
            semantic_gain,
            ramp,
            density_gain,
            ducking: self.ducking.for_clip(track_index, track, clip),
            compression,
            fades,
        })
    }

    /// Gain bringing the source, after gain and EQ, to `target_lufs`.
    ///
    /// The source is read in blocks, so a streamed source is never held whole.
    fn semantic_gain(
        &self,
        source: &ClipSource,
        pre_gain: f64,
        eq: Option<&EqPreset>,
        target_lufs: f64,
    ) -> RenderResult<f64> {
        let project = &self.timeline.project;
        let mut chain = eq
            .map(|preset| preset.chain(project.sample_rate))
            .unwrap_or_default();
        let mut meter = LoudnessMeter::new(project.sample_rate, project.channels);
        let mut reader = source.reader();
        let mut block = StereoBuffer::default();

        let mut offset = 0;
        while offset < source.len() {
            let frames = MEASURE_BLOCK.min(source.len() - offset);
            reader.read_at(offset, frames, &mut block)?;
            for (l, r) in block.left.iter().zip(block.right.iter()) {
                let (l, r) = chain.process(l * pre_gain, r * pre_gain);
                meter.push(l, r);
            }
            offset += frames;
        }

        Ok(match meter.integrated() {
            Some(lufs) => db_to_gain(target_lufs - lufs),
            None => 1.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixdown_spec::{compile, Timeline};

    fn tone() -> StereoBuffer {
        StereoBuffer::from_mono(
            (0..800)
                .map(|i| 0.25 * (2.0 * std::f64::consts::PI * 440.0 * i as f64 / 8000.0).sin())
                .collect(),
        )
    }

    fn planned(json: &str) -> RenderPlan {
        let timeline = Timeline::from_json(json).unwrap();
        let mut sources = SourceCache::new(".", 8000);
        sources.insert("a.wav", tone());
        let compiled = compile(&timeline, &sources).unwrap();
        Planner::new(&compiled, &sources).plan()
    }

    #[test]
    fn test_far_future_start_places_nothing() {
        let plan = planned(
            r#"{"project": {"duration": 1.0, "sample_rate": 8000},
                "tracks": [{"id": "m", "type": "music", "clips": [
                    {"file": "a.wav", "start": 0.95},
                    {"file": "a.wav", "start": 1e300},
                    {"file": "a.wav", "start": 1e300, "loop": true}
                ]}]}"#,
        );
        assert_eq!(plan.skipped, 0);
        assert_eq!(plan.tracks[0].clips.len(), 1);
        let clip = &plan.tracks[0].clips[0];
        assert_eq!((clip.start_frame, clip.end_frame), (7600, 8000));
    }

    #[test]
    fn test_sfx_gain_measured_in_blocks_matches_whole_source() {
        let plan = planned(
            r#"{"project": {"duration": 1.0, "sample_rate": 8000},
                "tracks": [{"id": "fx", "type": "sfx", "semantic_role": "impact",
                            "clips": [{"file": "a.wav", "start": 0.0}]}]}"#,
        );
        let clip = &plan.tracks[0].clips[0];
        let mut shaped = tone();
        shaped.scale(clip.pre_gain);
        if let Some(preset) = clip.eq {
            let mut chain = preset.chain(8000);
            chain.process_slices(&mut shaped.left, &mut shaped.right);
        }
        let lufs = crate::loudness::measure_lufs(&shaped, 8000, 2).unwrap();
        let target = sfx_target_lufs(Some(mixdown_spec::SemanticRole::Impact));
        assert!((clip.semantic_gain - db_to_gain(target - lufs)).abs() < 1e-12);
    }
}
