//! Validate command implementation
//!
//! Validates a timeline and its sources without rendering.

use anyhow::{Context, Result};
use colored::Colorize;
use mixdown_spec::hash::canonical_timeline_hash;
use mixdown_spec::{validate_timeline, DurationProbe, ValidationResult};
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use super::json_output::{to_json, JsonError, JsonWarning, ValidateOutput};
use super::load_sources;
use crate::input::{load_timeline, LoadResult};

/// Run the validate command
///
/// # Arguments
/// * `timeline_path` - Path to the timeline JSON file
/// * `json_output` - Whether to output machine-readable JSON diagnostics
///
/// # Returns
/// Exit code: 0 if valid, 1 if invalid
pub fn run(timeline_path: &str, json_output: bool) -> Result<ExitCode> {
    if json_output {
        run_json(timeline_path)
    } else {
        run_human(timeline_path)
    }
}

/// Validates a loaded timeline, measuring its sources for duration checks.
pub fn check(loaded: &LoadResult) -> ValidationResult {
    let sources = load_sources(&loaded.timeline, &loaded.base_dir);
    validate_timeline(
        &loaded.timeline,
        &loaded.base_dir,
        Some(&sources as &dyn DurationProbe),
    )
}

/// Run validate with human-readable (colored) output
fn run_human(timeline_path: &str) -> Result<ExitCode> {
    let start = Instant::now();
    println!("{} {}", "Validating:".cyan().bold(), timeline_path);

    let loaded = load_timeline(Path::new(timeline_path))
        .with_context(|| format!("Failed to load timeline: {}", timeline_path))?;
    println!(
        "{} {} track(s), {} scene(s) ({})",
        "Timeline:".dimmed(),
        loaded.timeline.tracks.len(),
        loaded.timeline.scenes.len(),
        &loaded.source_hash[..16]
    );

    let result = check(&loaded);
    let duration_ms = start.elapsed().as_millis() as u64;
    print_validation_results(&result);

    if result.ok {
        println!(
            "\n{} Timeline is valid ({}ms)",
            "SUCCESS".green().bold(),
            duration_ms
        );
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "\n{} Timeline has {} error(s) ({}ms)",
            "FAILED".red().bold(),
            result.errors.len(),
            duration_ms
        );
        Ok(ExitCode::from(1))
    }
}

/// Run validate with machine-readable JSON output
fn run_json(timeline_path: &str) -> Result<ExitCode> {
    let start = Instant::now();

    let loaded = match load_timeline(Path::new(timeline_path)) {
        Ok(loaded) => loaded,
        Err(e) => {
            let output = ValidateOutput {
                success: false,
                errors: vec![JsonError::new(e.code(), e.to_string())],
                warnings: Vec::new(),
                timeline_hash: None,
                source_hash: None,
                duration_ms: start.elapsed().as_millis() as u64,
            };
            println!("{}", to_json(&output));
            return Ok(ExitCode::from(1));
        }
    };

    let result = check(&loaded);
    let output = ValidateOutput {
        success: result.ok,
        errors: result.errors.iter().map(JsonError::from).collect(),
        warnings: result.warnings.iter().map(JsonWarning::from).collect(),
        timeline_hash: canonical_timeline_hash(&loaded.timeline).ok(),
        source_hash: Some(loaded.source_hash),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    println!("{}", to_json(&output));

    Ok(if result.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Print validation errors and warnings
pub(crate) fn print_validation_results(result: &ValidationResult) {
    if !result.errors.is_empty() {
        println!("\n{}", "Errors:".red().bold());
        for error in &result.errors {
            let path_info = error
                .path
                .as_ref()
                .map(|p| format!(" at {}", p))
                .unwrap_or_default();
            println!(
                "  {} [{}]{}: {}",
                "x".red(),
                error.code.to_string().red(),
                path_info.dimmed(),
                error.message
            );
        }
    }

    if !result.warnings.is_empty() {
        println!("\n{}", "Warnings:".yellow().bold());
        for warning in &result.warnings {
            let path_info = warning
                .path
                .as_ref()
                .map(|p| format!(" at {}", p))
                .unwrap_or_default();
            println!(
                "  {} [{}]{}: {}",
                "!".yellow(),
                warning.code.to_string().yellow(),
                path_info.dimmed(),
                warning.message
            );
        }
    }
}
