//! Inspect command implementation
//!
//! Compiles a timeline and prints where every clip lands: per track the
//! role and gain, then each placed clip in start order with its fades and
//! any scene rule overrides.

use anyhow::{Context, Result};
use colored::Colorize;
use mixdown_spec::{compile, Clip, CompiledTimeline, DurationProbe, SpecError};
use std::path::Path;
use std::process::ExitCode;

use super::json_output::{to_json, ClipSummary, InspectOutput, JsonError, TrackSummary};
use super::load_sources;
use crate::input::{load_timeline, LoadResult};

/// Run the inspect command
///
/// # Arguments
/// * `timeline_path` - Path to the timeline JSON file
/// * `json_output` - Whether to output machine-readable JSON
///
/// # Returns
/// Exit code: 0 if the timeline compiles, 1 otherwise
pub fn run(timeline_path: &str, json_output: bool) -> Result<ExitCode> {
    if json_output {
        run_json(timeline_path)
    } else {
        run_human(timeline_path)
    }
}

/// Compiles a loaded timeline and summarizes its tracks.
pub fn summarize(loaded: &LoadResult) -> Result<Vec<TrackSummary>, SpecError> {
    let sources = load_sources(&loaded.timeline, &loaded.base_dir);
    let compiled = compile(&loaded.timeline, &sources)?;
    Ok(track_summaries(&compiled, &sources))
}

fn track_summaries(
    compiled: &CompiledTimeline,
    durations: &dyn DurationProbe,
) -> Vec<TrackSummary> {
    compiled
        .tracks
        .iter()
        .map(|track| {
            let mut clips: Vec<ClipSummary> = track
                .clips
                .iter()
                .filter_map(|clip| clip_summary(clip, durations))
                .collect();
            clips.sort_by(|a, b| a.start.total_cmp(&b.start));
            TrackSummary {
                id: track.id.clone(),
                kind: track.kind.to_string(),
                role: track.role.to_string(),
                gain: track.gain,
                clips,
            }
        })
        .collect()
}

fn clip_summary(clip: &Clip, durations: &dyn DurationProbe) -> Option<ClipSummary> {
    let start = clip.start?;
    // Track clips carry the global rules; only scene clips override them.
    let (duck_amount, compression_threshold) = if clip.is_scene_clip() {
        (
            clip.rules.active_ducking().map(|d| d.duck_amount),
            clip.rules.active_compression().map(|c| c.threshold),
        )
    } else {
        (None, None)
    };
    Some(ClipSummary {
        file: clip.file.clone(),
        start,
        end: clip.end_time(durations),
        looping: clip.looping,
        fade_in: clip.fade_in.as_ref().map(|f| f.duration),
        fade_out: clip.fade_out.as_ref().map(|f| f.duration),
        duck_amount,
        compression_threshold,
    })
}

/// Run inspect with human-readable (colored) output
fn run_human(timeline_path: &str) -> Result<ExitCode> {
    println!("{} {}", "Inspecting timeline:".cyan().bold(), timeline_path);

    let loaded = load_timeline(Path::new(timeline_path))
        .with_context(|| format!("Failed to load timeline: {}", timeline_path))?;
    let tracks = summarize(&loaded).context("Failed to compile timeline")?;

    println!(
        "{} {:.2}s\n",
        "Project duration:".dimmed(),
        loaded.timeline.project.duration
    );
    for track in &tracks {
        print_track(track);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_track(track: &TrackSummary) {
    println!("{} {}", "Track:".bold(), track.id.cyan());
    println!(
        "   Type: {} | Role: {} | Gain: {} dB",
        track.kind, track.role, track.gain
    );
    if track.clips.is_empty() {
        println!("   {}\n", "(no clips)".dimmed());
        return;
    }

    for clip in &track.clips {
        let end = match clip.end {
            Some(end) => format!("{:.2}s", end),
            None => "?".to_string(),
        };
        let looping = if clip.looping { " (loop)" } else { "" };
        println!("   - {}", clip.file);
        println!("       {:.2}s -> {}{}", clip.start, end, looping);
        if let Some(fade) = clip.fade_in {
            println!("       Fade in: {}s", fade);
        }
        if let Some(fade) = clip.fade_out {
            println!("       Fade out: {}s", fade);
        }
        if let Some(amount) = clip.duck_amount {
            println!("       Ducking: {} dB", amount);
        }
        if let Some(threshold) = clip.compression_threshold {
            println!("       Compression threshold: {} dB", threshold);
        }
    }
    println!();
}

/// Run inspect with machine-readable JSON output
fn run_json(timeline_path: &str) -> Result<ExitCode> {
    let failed = |error: JsonError| InspectOutput {
        success: false,
        errors: vec![error],
        duration: None,
        tracks: Vec::new(),
    };

    let output = match load_timeline(Path::new(timeline_path)) {
        Err(e) => failed(JsonError::new(e.code(), e.to_string())),
        Ok(loaded) => match summarize(&loaded) {
            Err(e) => failed(JsonError::new("CLI_004", e.to_string())),
            Ok(tracks) => InspectOutput {
                success: true,
                errors: Vec::new(),
                duration: Some(loaded.timeline.project.duration),
                tracks,
            },
        },
    };
    println!("{}", to_json(&output));

    Ok(if output.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
