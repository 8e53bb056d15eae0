//! Render entry points.

use std::path::{Path, PathBuf};
use std::time::Instant;

use mixdown_spec::hash::canonical_timeline_hash;
use mixdown_spec::{
    compile, drop_invalid_clips, seconds_to_frames, validate_timeline, DurationProbe,
    RenderSettings, Timeline,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{RenderError, RenderResult};
use crate::loudness::measure_lufs;
use crate::master::{MasterGains, MasterProcessor};
use crate::plan::Planner;
use crate::source::SourceCache;
use crate::streaming::{ChunkProcessor, StreamingConfig};
use crate::track::{worker_pool, TrackMixer};
use crate::wav::{write_wav, WavFormat};

/// Caller overrides for a render. Unset fields fall back to the timeline's
/// `settings.streaming` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    pub streaming: Option<bool>,
    pub chunk_size_sec: Option<f64>,
    pub max_workers: Option<usize>,
    pub two_pass_lufs: Option<bool>,
    /// Render despite clip-level validation errors, dropping the affected
    /// clips.
    pub skip_invalid: bool,
}

/// How a render was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    Standard,
    Streaming,
}

/// Summary of a finished render.
#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    pub output: PathBuf,
    pub mode: RenderMode,
    pub frames: usize,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub clips_rendered: usize,
    pub clips_skipped: usize,
    pub measured_lufs: Option<f64>,
    pub lufs_gain_db: f64,
    pub peak_gain_db: f64,
    /// Peak of the shaped mix before master correction.
    pub peak: f64,
    /// BLAKE3 hash of the PCM data.
    pub pcm_hash: String,
    /// Canonical hash of the input timeline.
    pub timeline_hash: String,
    pub warnings: usize,
    pub duration_ms: u64,
}

/// Reads a timeline file and renders it. Relative clip paths resolve against
/// the timeline's directory.
pub fn render_file(
    timeline_path: &Path,
    output: &Path,
    options: &RenderOptions,
) -> RenderResult<RenderReport> {
    let timeline = Timeline::from_path(timeline_path)?;
    let base_dir = timeline_path.parent().unwrap_or_else(|| Path::new("."));
    render_timeline(&timeline, base_dir, output, options)
}

/// Validates, compiles and renders a timeline to a WAV file.
pub fn render_timeline(
    timeline: &Timeline,
    base_dir: &Path,
    output: &Path,
    options: &RenderOptions,
) -> RenderResult<RenderReport> {
    let started = Instant::now();
    let project = &timeline.project;

    // Unparseable settings fail validation below.
    let streaming_enabled = RenderSettings::from_rules(&timeline.settings)
        .map(|s| s.streaming.enabled)
        .unwrap_or_default();
    let mode = if options.streaming.unwrap_or(streaming_enabled) {
        RenderMode::Streaming
    } else {
        RenderMode::Standard
    };

    let mut sources = match mode {
        RenderMode::Standard => SourceCache::new(base_dir, project.sample_rate),
        RenderMode::Streaming => SourceCache::streamed(base_dir, project.sample_rate),
    };
    sources.load(timeline_files(timeline));

    let validation = validate_timeline(timeline, base_dir, Some(&sources as &dyn DurationProbe));
    for warning in &validation.warnings {
        warn!("{}", warning);
    }
    let mut dropped = 0;
    let stripped;
    let to_render = if validation.errors.is_empty() {
        timeline
    } else {
        if !options.skip_invalid || !validation.all_droppable() {
            return Err(RenderError::Invalid {
                count: validation.errors.len(),
                first: validation.errors[0].to_string(),
            });
        }
        for error in &validation.errors {
            warn!("dropping clips for validation error: {}", error);
        }
        let (kept, removed) = drop_invalid_clips(timeline, &validation.errors);
        stripped = kept;
        dropped = removed;
        &stripped
    };

    let compiled = compile(to_render, &sources)?;
    let plan = Planner::new(&compiled, &sources).plan();
    let format = WavFormat::new(project.channels, project.sample_rate, project.bit_depth)?;

    let streaming = &compiled.settings.streaming;
    let max_workers = options.max_workers.unwrap_or(streaming.max_workers);
    debug!(
        ?mode,
        tracks = plan.tracks.len(),
        clips = plan.clip_count(),
        frames = plan.total_frames,
        "render planned"
    );

    let (gains, peak, pcm_hash) = match mode {
        RenderMode::Standard => {
            let pool = worker_pool(max_workers)?;
            let mixer = TrackMixer::new(&plan);
            let mut mix = pool.install(|| mixer.mix(&plan))?;

            let mut master = MasterProcessor::new(&compiled);
            master.shape(&mut mix, 0);
            let peak = mix.peak();
            let measured = measure_lufs(&mix, plan.sample_rate, plan.channels);
            let gains = MasterGains::from_measurement(&compiled.settings, measured, peak);
            master.finish(&mut mix, 0, &gains);
            (gains, peak, write_wav(output, format, &mix)?)
        }
        RenderMode::Streaming => {
            let chunk_size = options.chunk_size_sec.unwrap_or(streaming.chunk_size_sec);
            if !(chunk_size > 0.0 && chunk_size.is_finite()) {
                return Err(RenderError::InvalidConfig(format!(
                    "chunk size must be positive, got {}",
                    chunk_size
                )));
            }
            let config = StreamingConfig {
                chunk_frames: seconds_to_frames(chunk_size, plan.sample_rate).max(1),
                max_workers,
                two_pass: options.two_pass_lufs.unwrap_or(streaming.two_pass_lufs),
            };
            let outcome = ChunkProcessor::new(&compiled, &plan, config)?.render(output, format)?;
            (outcome.gains, outcome.peak, outcome.pcm_hash)
        }
    };

    let report = RenderReport {
        output: output.to_path_buf(),
        mode,
        frames: plan.total_frames,
        sample_rate: plan.sample_rate,
        channels: plan.channels,
        bit_depth: project.bit_depth,
        clips_rendered: plan.clip_count(),
        clips_skipped: dropped + plan.skipped,
        measured_lufs: gains.measured_lufs,
        lufs_gain_db: gains.lufs_gain_db,
        peak_gain_db: gains.peak_gain_db,
        peak,
        pcm_hash,
        timeline_hash: canonical_timeline_hash(timeline)?,
        warnings: validation.warnings.len(),
        duration_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        output = %report.output.display(),
        ?mode,
        frames = report.frames,
        clips = report.clips_rendered,
        skipped = report.clips_skipped,
        lufs = ?report.measured_lufs,
        lufs_gain_db = report.lufs_gain_db,
        "render complete"
    );
    Ok(report)
}

/// Every source file a timeline names, scenes included.
pub fn timeline_files(timeline: &Timeline) -> impl Iterator<Item = &str> {
    timeline
        .tracks
        .iter()
        .flat_map(|t| t.clips.iter().map(|c| c.file.as_str()))
        .chain(
            timeline
                .scenes
                .iter()
                .flat_map(|s| s.tracks.values().flatten().map(|c| c.file.as_str())),
        )
}
