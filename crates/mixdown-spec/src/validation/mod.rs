//! Timeline validation.
//!
//! Validation runs before compilation and reports structural problems,
//! referential problems and timing anomalies. Timing checks that need source
//! lengths only run when a [`DurationProbe`] is supplied.

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::compile::DurationProbe;
use crate::error::{
    ErrorCode, ErrorScope, ValidationError, ValidationResult, ValidationWarning, WarningCode,
};
use crate::preset::EqPresetName;
use crate::rules::{find_engine_key, merge, ClipRules, RuleMap};
use crate::settings::{RenderSettings, Tilt, ToneShaping};
use crate::timeline::{Timeline, TrackKind};

/// Track ids: letters, digits, and `_ - .`, starting with a letter or digit.
pub const TRACK_ID_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$";

/// Supported output bit depths.
pub const SUPPORTED_BIT_DEPTHS: &[u16] = &[16, 24, 32];

static TRACK_ID_REGEX: OnceLock<Regex> = OnceLock::new();

fn track_id_regex() -> &'static Regex {
    TRACK_ID_REGEX.get_or_init(|| Regex::new(TRACK_ID_PATTERN).expect("invalid regex pattern"))
}

/// Returns true if `id` is a valid track id.
pub fn is_valid_track_id(id: &str) -> bool {
    track_id_regex().is_match(id)
}

/// Validates a timeline.
///
/// # Arguments
/// * `timeline` - The parsed timeline
/// * `base_dir` - Directory that relative clip paths are resolved against
/// * `probe` - Optional source duration lookup for timing checks
pub fn validate_timeline(
    timeline: &Timeline,
    base_dir: &Path,
    probe: Option<&dyn DurationProbe>,
) -> ValidationResult {
    let mut result = ValidationResult::success();

    validate_project(timeline, &mut result);
    validate_tracks(timeline, &mut result);
    validate_rules(timeline, &mut result);
    validate_track_clips(timeline, base_dir, probe, &mut result);
    validate_scenes(timeline, base_dir, probe, &mut result);

    result
}

/// Returns a copy of `timeline` without the clips named by scoped errors,
/// and the number of clips removed.
///
/// A track scope removes every clip on that track, including clips scenes
/// place on it. Unscoped errors remove nothing.
pub fn drop_invalid_clips(timeline: &Timeline, errors: &[ValidationError]) -> (Timeline, usize) {
    let mut track_clips = HashSet::new();
    let mut tracks = HashSet::new();
    let mut scene_clips = HashSet::new();
    for scope in errors.iter().filter_map(|e| e.scope.as_ref()) {
        match scope {
            ErrorScope::TrackClip { track, clip } => {
                track_clips.insert((*track, *clip));
            }
            ErrorScope::Track(track) => {
                tracks.insert(*track);
            }
            ErrorScope::SceneClip { scene, track, clip } => {
                scene_clips.insert((*scene, track.as_str(), *clip));
            }
        }
    }
    let dropped_ids: HashSet<&str> = tracks
        .iter()
        .filter_map(|i| timeline.tracks.get(*i))
        .map(|t| t.id.as_str())
        .collect();

    let mut stripped = timeline.clone();
    let mut removed = 0;
    for (i, track) in stripped.tracks.iter_mut().enumerate() {
        let before = track.clips.len();
        let mut j = 0;
        track.clips.retain(|_| {
            let keep = !tracks.contains(&i) && !track_clips.contains(&(i, j));
            j += 1;
            keep
        });
        removed += before - track.clips.len();
    }
    for (i, scene) in stripped.scenes.iter_mut().enumerate() {
        for (track_id, descriptors) in scene.tracks.iter_mut() {
            let before = descriptors.len();
            let whole_track = dropped_ids.contains(track_id.as_str());
            let mut j = 0;
            descriptors.retain(|_| {
                let keep = !whole_track && !scene_clips.contains(&(i, track_id.as_str(), j));
                j += 1;
                keep
            });
            removed += before - descriptors.len();
        }
    }
    (stripped, removed)
}

fn validate_project(timeline: &Timeline, result: &mut ValidationResult) {
    let project = &timeline.project;
    if !project.duration.is_finite() || project.duration <= 0.0 {
        result.add_error(ValidationError::with_path(
            ErrorCode::InvalidDuration,
            format!("project duration must be positive, got {}", project.duration),
            "project.duration",
        ));
    }
    if !(8_000..=192_000).contains(&project.sample_rate) {
        result.add_error(ValidationError::with_path(
            ErrorCode::InvalidOutputFormat,
            format!("unsupported sample rate {}", project.sample_rate),
            "project.sample_rate",
        ));
    }
    if !SUPPORTED_BIT_DEPTHS.contains(&project.bit_depth) {
        result.add_error(ValidationError::with_path(
            ErrorCode::InvalidOutputFormat,
            format!("unsupported bit depth {}", project.bit_depth),
            "project.bit_depth",
        ));
    }
    if !(1..=2).contains(&project.channels) {
        result.add_error(ValidationError::with_path(
            ErrorCode::InvalidOutputFormat,
            format!("unsupported channel count {}", project.channels),
            "project.channels",
        ));
    }
}

fn validate_tracks(timeline: &Timeline, result: &mut ValidationResult) {
    let mut seen = HashSet::new();
    for (i, track) in timeline.tracks.iter().enumerate() {
        let path = format!("tracks[{}]", i);
        if !is_valid_track_id(&track.id) {
            result.add_error(ValidationError::with_path(
                ErrorCode::InvalidTrackId,
                format!("invalid track id '{}'", track.id),
                format!("{}.id", path),
            ));
        }
        if !seen.insert(track.id.as_str()) {
            result.add_error(ValidationError::with_path(
                ErrorCode::DuplicateTrackId,
                format!("duplicate track id '{}'", track.id),
                format!("{}.id", path),
            ));
        }
        if track.semantic_role.is_some() && track.kind != TrackKind::Sfx {
            result.add_error(
                ValidationError::with_path(
                    ErrorCode::SemanticRoleOnNonSfx,
                    format!("track '{}' is not an sfx track", track.id),
                    format!("{}.semantic_role", path),
                )
                .scoped(ErrorScope::Track(i)),
            );
        }
        check_preset(track.eq_preset.as_deref(), &format!("{}.eq_preset", path), result);
        for (j, clip) in track.clips.iter().enumerate() {
            check_preset(
                clip.eq_preset.as_deref(),
                &format!("{}.clips[{}].eq_preset", path, j),
                result,
            );
        }
    }
}

fn check_preset(name: Option<&str>, path: &str, result: &mut ValidationResult) {
    if let Some(name) = name {
        if name.parse::<EqPresetName>().is_err() {
            result.add_warning(ValidationWarning::with_path(
                WarningCode::UnknownEqPreset,
                format!("unknown EQ preset '{}', rendering without EQ", name),
                path,
            ));
        }
    }
}

fn validate_rules(timeline: &Timeline, result: &mut ValidationResult) {
    check_rule_tree(&timeline.settings, "settings", None, result);
    if let Err(e) = RenderSettings::from_rules(&timeline.settings) {
        result.add_error(ValidationError::with_path(
            ErrorCode::InvalidRules,
            e.to_string(),
            "settings",
        ));
    }

    for (i, scene) in timeline.scenes.iter().enumerate() {
        let path = format!("scenes[{}].rules", i);
        check_rule_tree(&scene.rules, &path, None, result);
        let scene_rules = merge(&timeline.settings, &scene.rules);
        for (track_id, descriptors) in &scene.tracks {
            for (j, descriptor) in descriptors.iter().enumerate() {
                if descriptor.rules.is_empty() {
                    continue;
                }
                let clip_path = format!("scenes[{}].tracks.{}[{}].rules", i, track_id, j);
                let scope = ErrorScope::SceneClip {
                    scene: i,
                    track: track_id.clone(),
                    clip: j,
                };
                check_rule_tree(&descriptor.rules, &clip_path, Some(&scope), result);
                check_merged(
                    &merge(&scene_rules, &descriptor.rules),
                    &clip_path,
                    Some(&scope),
                    result,
                );
            }
        }
    }
}

/// Checks one authored rule level in isolation.
fn check_rule_tree(
    rules: &RuleMap,
    path: &str,
    scope: Option<&ErrorScope>,
    result: &mut ValidationResult,
) {
    if let Some(key) = find_engine_key(rules) {
        result.add_error(ValidationError::with_path(
            ErrorCode::EngineFieldInInput,
            format!("'{}' is generated by the engine and cannot be authored", key),
            format!("{}.{}", path, key),
        ));
    }
    check_merged(rules, path, scope, result);
}

/// Selector errors carry `scope`, so a bad clip-level selector drops only that clip.
fn check_merged(
    rules: &RuleMap,
    path: &str,
    scope: Option<&ErrorScope>,
    result: &mut ValidationResult,
) {
    let parsed = match ClipRules::from_rules(rules, path) {
        Ok(parsed) => parsed,
        Err(e) => {
            result.add_error(ValidationError::with_path(
                ErrorCode::InvalidRules,
                e.to_string(),
                path,
            ));
            return;
        }
    };

    if let Some(ducking) = &parsed.ducking {
        for (k, rule) in ducking.rules.iter().enumerate() {
            let rule_path = format!("{}.ducking.rules[{}]", path, k);
            let selectors = [
                (rule.trigger().err(), "when"),
                (rule.targets().err(), "duck"),
            ];
            for (error, field) in selectors {
                let Some(e) = error else { continue };
                let mut error = ValidationError::with_path(
                    ErrorCode::InvalidRoleSelector,
                    e.to_string(),
                    format!("{}.{}", rule_path, field),
                );
                error.scope = scope.cloned();
                result.add_error(error);
            }
        }
    }

    if let Some(tone) = &parsed.tone {
        check_tilt(tone, &format!("{}.eq.tilt", path), result);
    }
}

fn check_tilt(tone: &ToneShaping, path: &str, result: &mut ValidationResult) {
    if let Some(name) = tone.tilt.as_deref() {
        if Tilt::from_name(name).is_none() {
            result.add_warning(ValidationWarning::with_path(
                WarningCode::UnknownTilt,
                format!("unknown tilt '{}', treated as neutral", name),
                path,
            ));
        }
    }
}

/// Checks that a clip source exists and, when possible, can be decoded.
fn check_source(
    file: &str,
    base_dir: &Path,
    probe: Option<&dyn DurationProbe>,
    path: &str,
    scope: &ErrorScope,
    result: &mut ValidationResult,
) -> Option<f64> {
    if !base_dir.join(file).exists() {
        result.add_error(
            ValidationError::with_path(
                ErrorCode::MissingSource,
                format!("missing audio file: {}", file),
                path,
            )
            .scoped(scope.clone()),
        );
        return None;
    }
    let probe = probe?;
    let duration = probe.duration(file);
    if duration.is_none() {
        let message = match probe.load_error(file) {
            Some(reason) => format!("unreadable audio file: {} ({})", file, reason),
            None => format!("unreadable audio file: {}", file),
        };
        result.add_error(
            ValidationError::with_path(ErrorCode::UnreadableSource, message, path)
                .scoped(scope.clone()),
        );
    }
    duration
}

fn validate_track_clips(
    timeline: &Timeline,
    base_dir: &Path,
    probe: Option<&dyn DurationProbe>,
    result: &mut ValidationResult,
) {
    let project_end = timeline.project.duration;

    for (i, track) in timeline.tracks.iter().enumerate() {
        let mut placed: Vec<(f64, f64, usize)> = Vec::new();

        for (j, clip) in track.clips.iter().enumerate() {
            let path = format!("tracks[{}].clips[{}]", i, j);
            let scope = ErrorScope::TrackClip { track: i, clip: j };
            let source = check_source(
                &clip.file,
                base_dir,
                probe,
                &format!("{}.file", path),
                &scope,
                result,
            );

            let Some(start) = clip.start else {
                result.add_warning(ValidationWarning::with_path(
                    WarningCode::MissingStart,
                    format!("clip '{}' has no start time and will be skipped", clip.file),
                    format!("{}.start", path),
                ));
                continue;
            };

            if start < 0.0 {
                result.add_error(
                    ValidationError::with_path(
                        ErrorCode::NegativeStart,
                        format!("negative start time in '{}'", clip.file),
                        format!("{}.start", path),
                    )
                    .scoped(scope.clone()),
                );
            }

            let end = if clip.looping {
                let until = clip.loop_until.unwrap_or(project_end);
                if until <= start {
                    result.add_error(
                        ValidationError::with_path(
                            ErrorCode::InvalidLoopUntil,
                            format!("invalid loop_until for '{}'", clip.file),
                            format!("{}.loop_until", path),
                        )
                        .scoped(scope.clone()),
                    );
                }
                Some(until)
            } else {
                source.map(|d| clip.loop_until.map_or(start + d, |e| e.min(start + d)))
            };

            check_timing(start, end, project_end, &clip.file, &path, result);
            if let Some(end) = end {
                placed.push((start, end, j));
            }
        }

        placed.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut last_end = f64::NEG_INFINITY;
        for (start, end, j) in placed {
            if start < last_end - 1e-9 {
                result.add_warning(ValidationWarning::with_path(
                    WarningCode::OverlappingClips,
                    format!(
                        "overlap detected in track '{}', clip will be delayed",
                        track.id
                    ),
                    format!("tracks[{}].clips[{}]", i, j),
                ));
            }
            last_end = last_end.max(end);
        }
    }
}

fn check_timing(
    start: f64,
    end: Option<f64>,
    project_end: f64,
    file: &str,
    path: &str,
    result: &mut ValidationResult,
) {
    if start > project_end {
        result.add_warning(ValidationWarning::with_path(
            WarningCode::StartsAfterEnd,
            format!("clip '{}' starts after project end", file),
            format!("{}.start", path),
        ));
    } else if end.is_some_and(|e| e > project_end + 1e-9) {
        result.add_warning(ValidationWarning::with_path(
            WarningCode::ExceedsDuration,
            format!("clip '{}' exceeds project duration and will be truncated", file),
            path,
        ));
    }
}

fn validate_scenes(
    timeline: &Timeline,
    base_dir: &Path,
    probe: Option<&dyn DurationProbe>,
    result: &mut ValidationResult,
) {
    let project_end = timeline.project.duration;

    for (i, scene) in timeline.scenes.iter().enumerate() {
        let path = format!("scenes[{}]", i);
        if scene.duration <= 0.0 {
            result.add_warning(ValidationWarning::with_path(
                WarningCode::EmptyScene,
                format!("scene '{}' has no duration", scene.id),
                format!("{}.duration", path),
            ));
        }

        for (track_id, descriptors) in &scene.tracks {
            if timeline.track(track_id).is_none() {
                result.add_error(ValidationError::with_path(
                    ErrorCode::UnknownTrack,
                    format!("scene '{}' references unknown track '{}'", scene.id, track_id),
                    format!("{}.tracks.{}", path, track_id),
                ));
                continue;
            }

            for (j, descriptor) in descriptors.iter().enumerate() {
                let clip_path = format!("{}.tracks.{}[{}]", path, track_id, j);
                let scope = ErrorScope::SceneClip {
                    scene: i,
                    track: track_id.clone(),
                    clip: j,
                };
                let source = check_source(
                    &descriptor.file,
                    base_dir,
                    probe,
                    &format!("{}.file", clip_path),
                    &scope,
                    result,
                );
                check_preset(
                    descriptor.eq_preset.as_deref(),
                    &format!("{}.eq_preset", clip_path),
                    result,
                );

                let start = descriptor
                    .start
                    .unwrap_or_else(|| scene.start + descriptor.offset.unwrap_or(0.0));
                if start < 0.0 {
                    result.add_error(
                        ValidationError::with_path(
                            ErrorCode::NegativeStart,
                            format!("negative start time in '{}'", descriptor.file),
                            clip_path.clone(),
                        )
                        .scoped(scope.clone()),
                    );
                }

                let end = if descriptor.looping {
                    let until = descriptor.loop_until.unwrap_or_else(|| scene.end());
                    if until <= start {
                        result.add_error(
                            ValidationError::with_path(
                                ErrorCode::InvalidLoopUntil,
                                format!("invalid loop_until for '{}'", descriptor.file),
                                format!("{}.loop_until", clip_path),
                            )
                            .scoped(scope),
                        );
                    }
                    Some(until)
                } else {
                    source.map(|d| start + d)
                };
                check_timing(start, end, project_end, &descriptor.file, &clip_path, result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    fn fixture_dir(files: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            fs::write(dir.path().join(file), b"RIFF").unwrap();
        }
        dir
    }

    fn parse(json: &str) -> Timeline {
        Timeline::from_json(json).unwrap()
    }

    #[test]
    fn test_valid_timeline_passes() {
        let dir = fixture_dir(&["vo.wav", "bed.wav"]);
        let tl = parse(
            r#"{
                "project": {"duration": 10.0},
                "settings": {"ducking": {"rules": [{"when": "voice", "duck": ["music", "sfx:ambience"]}]}},
                "tracks": [
                    {"id": "vo", "type": "voice", "clips": [{"file": "vo.wav", "start": 1.0}]},
                    {"id": "music", "type": "music", "clips": [{"file": "bed.wav", "start": 0.0, "loop": true}]}
                ]
            }"#,
        );
        let probe: HashMap<String, f64> =
            [("vo.wav".to_string(), 3.0), ("bed.wav".to_string(), 4.0)].into();
        let result = validate_timeline(&tl, dir.path(), Some(&probe));
        assert!(result.is_ok(), "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_non_positive_duration() {
        let dir = fixture_dir(&[]);
        let tl = parse(r#"{"project": {"duration": 0.0}}"#);
        let result = validate_timeline(&tl, dir.path(), None);
        assert!(result.has_error(ErrorCode::InvalidDuration));
        assert!(result.has_structural_errors());
    }

    #[test]
    fn test_missing_file_and_bad_loop() {
        let dir = fixture_dir(&["a.wav"]);
        let tl = parse(
            r#"{
                "project": {"duration": 10.0},
                "tracks": [{"id": "m", "type": "music", "clips": [
                    {"file": "missing.wav", "start": 0.0},
                    {"file": "a.wav", "start": 5.0, "loop": true, "loop_until": 4.0},
                    {"file": "a.wav", "start": -1.0, "loop": true, "loop_until": 2.0}
                ]}]
            }"#,
        );
        let result = validate_timeline(&tl, dir.path(), None);
        assert!(result.has_error(ErrorCode::MissingSource));
        assert!(result.has_error(ErrorCode::InvalidLoopUntil));
        assert!(result.has_error(ErrorCode::NegativeStart));
        assert!(!result.has_structural_errors());
    }

    #[test]
    fn test_timing_warnings() {
        let dir = fixture_dir(&["a.wav"]);
        let tl = parse(
            r#"{
                "project": {"duration": 10.0},
                "tracks": [{"id": "m", "type": "music", "clips": [
                    {"file": "a.wav", "start": 0.0},
                    {"file": "a.wav", "start": 2.0},
                    {"file": "a.wav", "start": 8.0},
                    {"file": "a.wav", "start": 12.0},
                    {"file": "a.wav"}
                ]}]
            }"#,
        );
        let probe: HashMap<String, f64> = [("a.wav".to_string(), 4.0)].into();
        let result = validate_timeline(&tl, dir.path(), Some(&probe));
        assert!(result.is_ok());
        assert!(result.has_warning(WarningCode::OverlappingClips));
        assert!(result.has_warning(WarningCode::ExceedsDuration));
        assert!(result.has_warning(WarningCode::StartsAfterEnd));
        assert!(result.has_warning(WarningCode::MissingStart));
    }

    #[test]
    fn test_unreadable_source() {
        let dir = fixture_dir(&["broken.wav"]);
        let tl = parse(
            r#"{"project": {"duration": 5.0},
                "tracks": [{"id": "m", "type": "music", "clips": [{"file": "broken.wav", "start": 0.0}]}]}"#,
        );
        let probe: HashMap<String, f64> = HashMap::new();
        let result = validate_timeline(&tl, dir.path(), Some(&probe));
        assert!(result.has_error(ErrorCode::UnreadableSource));
    }

    #[test]
    fn test_rule_errors() {
        let dir = fixture_dir(&[]);
        let tl = parse(
            r#"{
                "project": {"duration": 5.0},
                "settings": {
                    "scene_energy": 0.3,
                    "ducking": {"rules": [{"when": "narrator", "duck": ["sfx:boom"]}]},
                    "eq": {"tilt": "sparkly"}
                },
                "tracks": [{"id": "bad id", "type": "music", "semantic_role": "impact", "eq_preset": "nope"}]
            }"#,
        );
        let result = validate_timeline(&tl, dir.path(), None);
        assert!(result.has_error(ErrorCode::EngineFieldInInput));
        assert!(result.has_error(ErrorCode::InvalidRoleSelector));
        assert!(result.has_error(ErrorCode::InvalidTrackId));
        assert!(result.has_error(ErrorCode::SemanticRoleOnNonSfx));
        assert!(result.has_warning(WarningCode::UnknownTilt));
        assert!(result.has_warning(WarningCode::UnknownEqPreset));
    }

    #[test]
    fn test_scene_errors() {
        let dir = fixture_dir(&[]);
        let tl = parse(
            r#"{
                "project": {"duration": 5.0},
                "tracks": [{"id": "a", "type": "music"}, {"id": "a", "type": "voice"}],
                "scenes": [{"id": "s", "start": 0.0, "duration": 0.0, "tracks": {"ghost": []}}]
            }"#,
        );
        let result = validate_timeline(&tl, dir.path(), None);
        assert!(result.has_error(ErrorCode::DuplicateTrackId));
        assert!(result.has_error(ErrorCode::UnknownTrack));
        assert!(result.has_warning(WarningCode::EmptyScene));
        assert!(!result.all_droppable());
    }

    // =========================================================================
    // Error scopes
    // =========================================================================

    fn scope_of(result: &ValidationResult, code: ErrorCode) -> Option<ErrorScope> {
        result
            .errors
            .iter()
            .find(|e| e.code == code)
            .and_then(|e| e.scope.clone())
    }

    #[test]
    fn test_clip_errors_name_their_clip() {
        let dir = fixture_dir(&["a.wav"]);
        let tl = parse(
            r#"{
                "project": {"duration": 10.0},
                "tracks": [{"id": "m", "type": "music", "clips": [
                    {"file": "missing.wav", "start": 0.0},
                    {"file": "a.wav", "start": 5.0, "loop": true, "loop_until": 4.0},
                    {"file": "a.wav", "start": -1.0, "loop": true, "loop_until": 2.0}
                ]}]
            }"#,
        );
        let result = validate_timeline(&tl, dir.path(), None);
        assert_eq!(
            scope_of(&result, ErrorCode::MissingSource),
            Some(ErrorScope::TrackClip { track: 0, clip: 0 })
        );
        assert_eq!(
            scope_of(&result, ErrorCode::InvalidLoopUntil),
            Some(ErrorScope::TrackClip { track: 0, clip: 1 })
        );
        assert_eq!(
            scope_of(&result, ErrorCode::NegativeStart),
            Some(ErrorScope::TrackClip { track: 0, clip: 2 })
        );
        assert!(result.all_droppable());
    }

    #[test]
    fn test_semantic_role_error_names_track() {
        let dir = fixture_dir(&[]);
        let tl = parse(
            r#"{"project": {"duration": 5.0},
                "tracks": [{"id": "m", "type": "music"}, {"id": "fx", "type": "music", "semantic_role": "impact"}]}"#,
        );
        let result = validate_timeline(&tl, dir.path(), None);
        assert_eq!(
            scope_of(&result, ErrorCode::SemanticRoleOnNonSfx),
            Some(ErrorScope::Track(1))
        );
    }

    #[test]
    fn test_selector_scope_follows_rule_level() {
        let dir = fixture_dir(&["a.wav"]);
        let tl = parse(
            r#"{
                "project": {"duration": 5.0},
                "tracks": [{"id": "m", "type": "music"}],
                "scenes": [{"id": "s", "start": 0.0, "duration": 5.0, "tracks": {"m": [
                    {"file": "a.wav"},
                    {"file": "a.wav", "offset": 1.0,
                     "rules": {"ducking": {"rules": [{"when": "narrator", "duck": ["music"]}]}}}
                ]}}]
            }"#,
        );
        let result = validate_timeline(&tl, dir.path(), None);
        assert_eq!(
            scope_of(&result, ErrorCode::InvalidRoleSelector),
            Some(ErrorScope::SceneClip {
                scene: 0,
                track: "m".into(),
                clip: 1
            })
        );
        assert!(result.all_droppable());

        let tl = parse(
            r#"{"project": {"duration": 5.0},
                "settings": {"ducking": {"rules": [{"when": "narrator", "duck": ["music"]}]}}}"#,
        );
        let result = validate_timeline(&tl, dir.path(), None);
        assert_eq!(scope_of(&result, ErrorCode::InvalidRoleSelector), None);
        assert!(!result.all_droppable());
    }

    #[test]
    fn test_unreadable_source_reports_reason() {
        struct Failing;
        impl DurationProbe for Failing {
            fn duration(&self, _file: &str) -> Option<f64> {
                None
            }
            fn load_error(&self, file: &str) -> Option<String> {
                Some(format!("bad header in {}", file))
            }
        }

        let dir = fixture_dir(&["broken.wav"]);
        let tl = parse(
            r#"{"project": {"duration": 5.0},
                "tracks": [{"id": "m", "type": "music", "clips": [{"file": "broken.wav", "start": 0.0}]}]}"#,
        );
        let result = validate_timeline(&tl, dir.path(), Some(&Failing));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("bad header in broken.wav"));
        assert!(result.errors[0].is_droppable());
    }

    #[test]
    fn test_drop_invalid_clips() {
        let dir = fixture_dir(&["a.wav"]);
        let tl = parse(
            r#"{
                "project": {"duration": 10.0},
                "tracks": [
                    {"id": "m", "type": "music", "clips": [
                        {"file": "a.wav", "start": 0.0},
                        {"file": "missing.wav", "start": 1.0},
                        {"file": "a.wav", "start": -0.25}
                    ]},
                    {"id": "fx", "type": "music", "semantic_role": "impact", "clips": [
                        {"file": "a.wav", "start": 2.0}
                    ]}
                ],
                "scenes": [{"id": "s", "start": 0.5, "duration": 4.0, "tracks": {
                    "m": [{"file": "a.wav", "offset": 1.0}, {"file": "a.wav", "offset": -1.0}],
                    "fx": [{"file": "a.wav"}]
                }}]
            }"#,
        );
        let result = validate_timeline(&tl, dir.path(), None);
        assert!(result.all_droppable(), "{:?}", result.errors);

        let (stripped, removed) = drop_invalid_clips(&tl, &result.errors);
        assert_eq!(removed, 5);
        assert_eq!(stripped.tracks[0].clips.len(), 1);
        assert_eq!(stripped.tracks[0].clips[0].start, Some(0.0));
        assert!(stripped.tracks[1].clips.is_empty());
        let scene = &stripped.scenes[0];
        assert_eq!(scene.tracks["m"].len(), 1);
        assert_eq!(scene.tracks["m"][0].offset, Some(1.0));
        assert!(scene.tracks["fx"].is_empty());

        let again = validate_timeline(&stripped, dir.path(), None);
        assert!(!again.has_error(ErrorCode::MissingSource));
        assert!(!again.has_error(ErrorCode::NegativeStart));
    }
}
