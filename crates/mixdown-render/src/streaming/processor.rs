//! Chunked rendering with bounded memory.

use std::path::Path;

use mixdown_spec::CompiledTimeline;
use rayon::prelude::*;
use tracing::{debug, info};

use super::scheduler::{Chunk, ChunkScheduler};
use super::state::FilterArena;
use crate::buffer::StereoBuffer;
use crate::clip::ClipProcessor;
use crate::error::RenderResult;
use crate::loudness::LoudnessMeter;
use crate::master::{MasterGains, MasterProcessor};
use crate::plan::{RenderPlan, TrackPlan};
use crate::track::{role_gain, worker_pool};
use crate::wav::{WavFileWriter, WavFormat};

/// Streaming render configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamingConfig {
    pub chunk_frames: usize,
    pub max_workers: usize,
    /// Measure the whole mix before writing. Otherwise the master gain is
    /// estimated per chunk from the mix so far.
    pub two_pass: bool,
}

/// Result of a finished streaming render.
#[derive(Debug, Clone)]
pub struct StreamingOutcome {
    pub gains: MasterGains,
    /// Peak of the shaped mix before the master correction.
    pub peak: f64,
    pub pcm_hash: String,
    pub chunks: usize,
}

/// One track's worker for a single pass.
struct TrackWorker<'p> {
    track: &'p TrackPlan,
    arena: FilterArena,
}

impl<'p> TrackWorker<'p> {
    fn new(track: &'p TrackPlan) -> Self {
        Self {
            track,
            arena: FilterArena::new(),
        }
    }

    fn render(
        &mut self,
        scheduler: &ChunkScheduler,
        clips: &ClipProcessor,
        sample_rate: u32,
        chunk: Chunk,
    ) -> RenderResult<StereoBuffer> {
        let track = self.track;
        let mut out = StereoBuffer::new(chunk.len());
        for slice in scheduler.slices(track, chunk) {
            let plan = &track.clips[slice.clip];
            let key = (slice.track_index, slice.clip);
            let state = self.arena.state(key, plan, sample_rate);
            clips.process_slice(plan, state, &slice, chunk.start, &mut out)?;
            if slice.end() >= plan.end_frame {
                self.arena.release(key);
            }
        }
        Ok(out)
    }
}

/// Renders a plan chunk by chunk on a bounded worker pool.
pub struct ChunkProcessor<'a> {
    timeline: &'a CompiledTimeline,
    plan: &'a RenderPlan,
    scheduler: ChunkScheduler,
    clips: ClipProcessor,
    config: StreamingConfig,
    pool: rayon::ThreadPool,
}

impl<'a> ChunkProcessor<'a> {
    pub fn new(
        timeline: &'a CompiledTimeline,
        plan: &'a RenderPlan,
        config: StreamingConfig,
    ) -> RenderResult<Self> {
        let pool = worker_pool(config.max_workers)?;
        Ok(Self {
            timeline,
            plan,
            scheduler: ChunkScheduler::new(plan.total_frames, config.chunk_frames),
            clips: ClipProcessor::new(plan.sample_rate),
            config,
            pool,
        })
    }

    fn workers(&self) -> Vec<TrackWorker<'a>> {
        self.plan.tracks.iter().map(TrackWorker::new).collect()
    }

    /// Renders every track's part of a chunk in parallel, in track order.
    fn render_tracks(
        &self,
        workers: &mut [TrackWorker<'a>],
        chunk: Chunk,
    ) -> RenderResult<Vec<StereoBuffer>> {
        let scheduler = &self.scheduler;
        let clips = &self.clips;
        let sample_rate = self.plan.sample_rate;
        self.pool.install(|| {
            workers
                .par_iter_mut()
                .map(|worker| worker.render(scheduler, clips, sample_rate, chunk))
                .collect::<RenderResult<Vec<_>>>()
        })
    }

    /// Sums a chunk's tracks after role correction and shapes the master.
    fn mix_chunk(
        &self,
        workers: &mut [TrackWorker<'a>],
        chunk: Chunk,
        role_gains: &[f64],
        master: &mut MasterProcessor,
    ) -> RenderResult<StereoBuffer> {
        let mut mix = StereoBuffer::new(chunk.len());
        for (mut track, gain) in self
            .render_tracks(workers, chunk)?
            .into_iter()
            .zip(role_gains.iter())
        {
            track.scale(*gain);
            mix.mix_at(&track, 0);
        }
        master.shape(&mut mix, chunk.start);
        Ok(mix)
    }

    /// Measures each track with a loudness target over the whole render.
    fn analyze_tracks(&self) -> RenderResult<Vec<f64>> {
        let tracks = &self.plan.tracks;
        if tracks.iter().all(|t| t.role_target.is_none()) {
            return Ok(vec![1.0; tracks.len()]);
        }

        let mut workers = self.workers();
        let mut meters: Vec<Option<LoudnessMeter>> = tracks
            .iter()
            .map(|t| {
                t.role_target
                    .map(|_| LoudnessMeter::new(self.plan.sample_rate, self.plan.channels))
            })
            .collect();
        for chunk in self.scheduler.chunks() {
            let buffers = self.render_tracks(&mut workers, chunk)?;
            for (meter, buffer) in meters.iter_mut().zip(buffers.iter()) {
                if let Some(meter) = meter {
                    meter.push_buffer(buffer);
                }
            }
        }

        Ok(tracks
            .iter()
            .zip(meters.iter())
            .map(|(track, meter)| {
                let measured = meter.as_ref().and_then(LoudnessMeter::integrated);
                let gain = role_gain(track.role_target, measured);
                debug!(track = %track.id, lufs = ?measured, gain, "analyzed track");
                gain
            })
            .collect())
    }

    /// Measures the shaped master over the whole render.
    fn measure_master(&self, role_gains: &[f64]) -> RenderResult<(Option<f64>, f64)> {
        let mut workers = self.workers();
        let mut master = MasterProcessor::new(self.timeline);
        let mut meter = LoudnessMeter::new(self.plan.sample_rate, self.plan.channels);
        let mut peak = 0.0_f64;
        for chunk in self.scheduler.chunks() {
            let mix = self.mix_chunk(&mut workers, chunk, role_gains, &mut master)?;
            meter.push_buffer(&mix);
            peak = peak.max(mix.peak());
        }
        Ok((meter.integrated(), peak))
    }

    /// Runs all passes and writes the output file.
    pub fn render(&self, output: &Path, format: WavFormat) -> RenderResult<StreamingOutcome> {
        let settings = &self.timeline.settings;
        let role_gains = self.analyze_tracks()?;

        let mut gains = MasterGains::default();
        if self.config.two_pass {
            let (measured, peak) = self.measure_master(&role_gains)?;
            gains = MasterGains::from_measurement(settings, measured, peak);
            debug!(lufs = ?measured, peak, "measured master");
        }

        let mut workers = self.workers();
        let mut master = MasterProcessor::new(self.timeline);
        let mut meter = LoudnessMeter::new(self.plan.sample_rate, self.plan.channels);
        let mut peak = 0.0_f64;
        let mut writer = WavFileWriter::create(output, format, self.plan.total_frames)?;

        for chunk in self.scheduler.chunks() {
            let mut mix = self.mix_chunk(&mut workers, chunk, &role_gains, &mut master)?;
            peak = peak.max(mix.peak());
            if !self.config.two_pass {
                meter.push_buffer(&mix);
                gains = MasterGains::running(settings, meter.integrated(), peak);
            }
            master.finish(&mut mix, chunk.start, &gains);
            writer.write(&mix)?;
        }

        let pcm_hash = writer.finish()?;
        let chunks = self.scheduler.chunk_count();
        info!(
            chunks,
            workers = self.config.max_workers,
            two_pass = self.config.two_pass,
            "streaming render complete"
        );
        Ok(StreamingOutcome {
            gains,
            peak,
            pcm_hash,
            chunks,
        })
    }
}
