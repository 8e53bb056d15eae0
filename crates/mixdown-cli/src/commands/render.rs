//! Render command implementation
//!
//! Renders a timeline to a WAV file, in standard or streaming mode.

use anyhow::{Context, Result};
use colored::Colorize;
use mixdown_render::{render_timeline, RenderMode, RenderOptions, RenderReport};
use std::path::Path;
use std::process::ExitCode;

use super::json_output::{to_json, JsonError, RenderOutput};
use crate::input::load_timeline;

/// Run the render command
///
/// # Arguments
/// * `timeline_path` - Path to the timeline JSON file
/// * `output` - Destination WAV path
/// * `options` - Render mode overrides and validation policy
/// * `json_output` - Whether to output machine-readable JSON
///
/// # Returns
/// Exit code: 0 on success, 1 on failure
pub fn run(
    timeline_path: &str,
    output: &str,
    options: &RenderOptions,
    json_output: bool,
) -> Result<ExitCode> {
    if json_output {
        run_json(timeline_path, output, options)
    } else {
        run_human(timeline_path, output, options)
    }
}

fn run_human(timeline_path: &str, output: &str, options: &RenderOptions) -> Result<ExitCode> {
    println!("{} {}", "Rendering:".cyan().bold(), timeline_path);

    let loaded = load_timeline(Path::new(timeline_path))
        .with_context(|| format!("Failed to load timeline: {}", timeline_path))?;
    let report = render_timeline(&loaded.timeline, &loaded.base_dir, Path::new(output), options)
        .with_context(|| format!("Failed to render {}", timeline_path))?;

    print_report(&report);
    Ok(ExitCode::SUCCESS)
}

fn run_json(timeline_path: &str, output: &str, options: &RenderOptions) -> Result<ExitCode> {
    let failure = |error: JsonError| {
        let output = RenderOutput {
            success: false,
            errors: vec![error],
            report: None,
        };
        println!("{}", to_json(&output));
        Ok(ExitCode::from(1))
    };

    let loaded = match load_timeline(Path::new(timeline_path)) {
        Ok(loaded) => loaded,
        Err(e) => return failure(JsonError::new(e.code(), e.to_string())),
    };
    match render_timeline(&loaded.timeline, &loaded.base_dir, Path::new(output), options) {
        Ok(report) => {
            let output = RenderOutput {
                success: true,
                errors: Vec::new(),
                report: Some(report),
            };
            println!("{}", to_json(&output));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => failure(JsonError::new(e.code(), e.to_string())),
    }
}

fn print_report(report: &RenderReport) {
    let mode = match report.mode {
        RenderMode::Standard => "standard",
        RenderMode::Streaming => "streaming",
    };
    println!(
        "{} {} frames at {} Hz, {}-bit, {} channel(s) ({})",
        "Output:".dimmed(),
        report.frames,
        report.sample_rate,
        report.bit_depth,
        report.channels,
        mode
    );
    println!(
        "{} {} rendered, {} skipped",
        "Clips:".dimmed(),
        report.clips_rendered,
        report.clips_skipped
    );
    match report.measured_lufs {
        Some(lufs) => println!(
            "{} {:.2} LUFS measured, {:+.2} dB correction",
            "Loudness:".dimmed(),
            lufs,
            report.lufs_gain_db
        ),
        None => println!("{} silent mix, no correction", "Loudness:".dimmed()),
    }
    if report.peak_gain_db != 0.0 {
        println!("{} {:+.2} dB", "Peak gain:".dimmed(), report.peak_gain_db);
    }
    if report.warnings > 0 {
        println!(
            "{} {} validation warning(s)",
            "!".yellow(),
            report.warnings
        );
    }
    println!("{} {}", "PCM hash:".dimmed(), report.pcm_hash);
    println!(
        "\n{} Wrote {} ({}ms)",
        "SUCCESS".green().bold(),
        report.output.display(),
        report.duration_ms
    );
}
