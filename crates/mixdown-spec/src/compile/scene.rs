use std::sync::Arc;

use tracing::debug;

use super::{Clip, CompiledTimeline, CompiledTrack, DurationProbe, ToneSegment};
use crate::error::SpecError;
use crate::rules::{
    find_engine_key, merge, merge_all, ClipRules, DialogueDensity, RuleMap, DEFAULT_SCENE_ENERGY,
    ENERGY_RAMP_DURATION,
};
use crate::settings::RenderSettings;
use crate::timeline::{Fade, Scene, SceneClip, Timeline, Track};

/// Scene boundaries closer than this (seconds) count as touching.
pub const CROSSFADE_TOUCH_TOLERANCE: f64 = 0.05;

/// Expands scenes into absolute-time clips on their tracks.
pub struct SceneCompiler<'a> {
    timeline: &'a Timeline,
}

impl<'a> SceneCompiler<'a> {
    pub fn new(timeline: &'a Timeline) -> Self {
        Self { timeline }
    }

    /// Compiles the timeline. Scenes do not survive this step.
    pub fn compile(&self, probe: &dyn DurationProbe) -> Result<CompiledTimeline, SpecError> {
        let timeline = self.timeline;
        reject_engine_keys(&timeline.settings, "settings")?;
        let settings = RenderSettings::from_rules(&timeline.settings)?;
        let global_rules = Arc::new(ClipRules::from_rules(&timeline.settings, "settings")?);

        let mut tracks: Vec<CompiledTrack> = timeline
            .tracks
            .iter()
            .enumerate()
            .map(|(index, track)| compile_track(track, index, &global_rules, timeline))
            .collect();

        let previous_energy = previous_scene_energies(&timeline.scenes);
        let densities = self.dialogue_densities(probe);

        for (scene_index, scene) in timeline.scenes.iter().enumerate() {
            let scene_path = format!("scenes[{}]", scene_index);
            reject_engine_keys(&scene.rules, &format!("{}.rules", scene_path))?;
            let scene_rules = merge(&timeline.settings, &scene.rules);

            for (track_id, descriptors) in &scene.tracks {
                let track = tracks
                    .iter_mut()
                    .find(|t| &t.id == track_id)
                    .ok_or_else(|| SpecError::UnknownTrack {
                        scene: scene.id.clone(),
                        track: track_id.clone(),
                    })?;

                for (clip_index, descriptor) in descriptors.iter().enumerate() {
                    let clip_path =
                        format!("{}.tracks.{}[{}].rules", scene_path, track_id, clip_index);
                    reject_engine_keys(&descriptor.rules, &clip_path)?;

                    let merged = merge(&scene_rules, &descriptor.rules);
                    let mut rules = ClipRules::from_rules(&merged, &clip_path)?;
                    rules.scene_energy = Some(scene_energy(scene));
                    rules.prev_scene_energy = previous_energy[scene_index];
                    rules.energy_ramp_duration = ENERGY_RAMP_DURATION;
                    rules.dialogue_density = Some(densities[scene_index]);

                    track.clips.push(place_scene_clip(scene, descriptor, Arc::new(rules)));
                }
            }
            debug!(scene = %scene.id, density = %densities[scene_index].label.as_str(), "compiled scene");
        }

        if settings.scene_crossfade.enabled {
            let default_duration = settings.scene_crossfade.duration;
            for track in &mut tracks {
                apply_scene_crossfades(&mut track.clips, default_duration, probe);
            }
        }

        let tone_map = self.tone_map()?;

        Ok(CompiledTimeline {
            project: timeline.project.clone(),
            settings,
            tracks,
            tone_map,
        })
    }

    /// Voice coverage ratio for every scene, in scene order.
    fn dialogue_densities(&self, probe: &dyn DurationProbe) -> Vec<DialogueDensity> {
        let timeline = self.timeline;
        let mut voice_ranges: Vec<(f64, f64)> = Vec::new();

        for track in timeline.tracks.iter().filter(|t| t.is_voice()) {
            for clip in &track.clips {
                let Some(start) = clip.start else { continue };
                let end = if clip.looping {
                    clip.loop_until.unwrap_or(timeline.project.duration)
                } else {
                    match probe.duration(&clip.file) {
                        Some(d) => clip.loop_until.map_or(start + d, |e| e.min(start + d)),
                        None => continue,
                    }
                };
                voice_ranges.push((start, end));
            }
        }

        for scene in &timeline.scenes {
            for (track_id, descriptors) in &scene.tracks {
                let is_voice = timeline.track(track_id).is_some_and(|t| t.is_voice());
                if !is_voice {
                    continue;
                }
                for descriptor in descriptors {
                    let start = descriptor_start(scene, descriptor);
                    let end = if descriptor.looping {
                        descriptor.loop_until.unwrap_or_else(|| scene.end())
                    } else {
                        match probe.duration(&descriptor.file) {
                            Some(d) => descriptor
                                .loop_until
                                .map_or(start + d, |e| e.min(start + d)),
                            None => continue,
                        }
                    };
                    voice_ranges.push((start, end));
                }
            }
        }

        timeline
            .scenes
            .iter()
            .map(|scene| {
                if scene.duration <= 0.0 {
                    return DialogueDensity::from_ratio(0.0);
                }
                let covered: f64 = voice_ranges
                    .iter()
                    .map(|&(start, end)| (end.min(scene.end()) - start.max(scene.start)).max(0.0))
                    .sum();
                DialogueDensity::from_ratio(covered / scene.duration)
            })
            .collect()
    }

    /// Scene windows that override the global tonal shaping.
    fn tone_map(&self) -> Result<Vec<ToneSegment>, SpecError> {
        let timeline = self.timeline;
        let mut segments = Vec::new();
        for (index, scene) in timeline.scenes.iter().enumerate() {
            if !scene.rules.contains_key("eq") || scene.duration <= 0.0 {
                continue;
            }
            let merged = merge_all([&timeline.settings, &scene.rules]);
            let rules = ClipRules::from_rules(&merged, &format!("scenes[{}].rules", index))?;
            if let Some(tone) = rules.tone {
                segments.push(ToneSegment {
                    start: scene.start,
                    end: scene.end(),
                    tone,
                });
            }
        }
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
        Ok(segments)
    }
}

fn reject_engine_keys(rules: &RuleMap, path: &str) -> Result<(), SpecError> {
    match find_engine_key(rules) {
        Some(key) => Err(SpecError::EngineField {
            key: key.to_string(),
            path: path.to_string(),
        }),
        None => Ok(()),
    }
}

fn compile_track(
    track: &Track,
    index: usize,
    global_rules: &Arc<ClipRules>,
    timeline: &Timeline,
) -> CompiledTrack {
    let clips = track
        .clips
        .iter()
        .map(|clip| {
            let end = match (clip.looping, clip.loop_until) {
                (true, None) => Some(timeline.project.duration),
                (_, end) => end,
            };
            Clip {
                file: clip.file.clone(),
                start: clip.start,
                end,
                looping: clip.looping,
                gain: clip.gain,
                eq_preset: clip.eq_preset.clone(),
                semantic_role: clip.semantic_role,
                fade_in: clip.fade_in,
                fade_out: clip.fade_out,
                rules: Arc::clone(global_rules),
                crossfade_allowance: 0.0,
            }
        })
        .collect();

    debug!(track = %track.id, index, "compiled track");
    CompiledTrack {
        id: track.id.clone(),
        kind: track.kind,
        role: track.mix_role(),
        semantic_role: track.semantic_role,
        eq_preset: track.eq_preset.clone(),
        gain: track.gain,
        clips,
    }
}

fn scene_energy(scene: &Scene) -> f64 {
    scene.energy.unwrap_or(DEFAULT_SCENE_ENERGY).clamp(0.0, 1.0)
}

/// Energy of the scene immediately before each scene, ordered by start time.
fn previous_scene_energies(scenes: &[Scene]) -> Vec<Option<f64>> {
    let mut order: Vec<usize> = (0..scenes.len()).collect();
    order.sort_by(|&a, &b| scenes[a].start.total_cmp(&scenes[b].start));

    let mut previous = vec![None; scenes.len()];
    for pair in order.windows(2) {
        previous[pair[1]] = Some(scene_energy(&scenes[pair[0]]));
    }
    previous
}

fn descriptor_start(scene: &Scene, descriptor: &SceneClip) -> f64 {
    descriptor
        .start
        .unwrap_or_else(|| scene.start + descriptor.offset.unwrap_or(0.0))
}

fn place_scene_clip(scene: &Scene, descriptor: &SceneClip, rules: Arc<ClipRules>) -> Clip {
    let end = match (descriptor.looping, descriptor.loop_until) {
        (true, None) => Some(scene.end()),
        (_, end) => end,
    };
    Clip {
        file: descriptor.file.clone(),
        start: Some(descriptor_start(scene, descriptor)),
        end,
        looping: descriptor.looping,
        gain: descriptor.gain,
        eq_preset: descriptor.eq_preset.clone(),
        semantic_role: descriptor.semantic_role,
        fade_in: descriptor.fade_in,
        fade_out: descriptor.fade_out,
        rules,
        crossfade_allowance: 0.0,
    }
}

/// Overlaps touching scene clips on one track.
///
/// The outgoing clip's fade-out and the incoming clip's fade-in are raised to
/// the crossfade duration and the incoming clip moves earlier by it.
fn apply_scene_crossfades(clips: &mut [Clip], default_duration: f64, probe: &dyn DurationProbe) {
    let mut order: Vec<usize> = clips
        .iter()
        .enumerate()
        .filter(|(_, c)| c.start.is_some() && c.is_scene_clip())
        .map(|(i, _)| i)
        .collect();
    if order.len() < 2 {
        return;
    }
    order.sort_by(|&a, &b| {
        let (sa, sb) = (clips[a].start.unwrap_or(0.0), clips[b].start.unwrap_or(0.0));
        sa.total_cmp(&sb)
    });

    for pair in order.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let Some(end_a) = clips[a].end_time(probe).or(clips[a].start) else {
            continue;
        };
        let Some(start_b) = clips[b].start else {
            continue;
        };
        if (end_a - start_b).abs() >= CROSSFADE_TOUCH_TOLERANCE {
            continue;
        }

        let duration = clips[b]
            .rules
            .scene_crossfade
            .as_ref()
            .map_or(default_duration, |cf| cf.duration)
            .max(0.0);

        clips[a].fade_out = Some(Fade::at_least(clips[a].fade_out, duration));
        let incoming = &mut clips[b];
        incoming.fade_in = Some(Fade::at_least(incoming.fade_in, duration));
        let moved = (start_b - duration).max(0.0);
        incoming.start = Some(moved);
        incoming.crossfade_allowance = (start_b - moved) + CROSSFADE_TOUCH_TOLERANCE;
        debug!(file = %incoming.file, from = start_b, to = moved, "scene crossfade");
    }
}
