//! Track mixing for the standard renderer.

use rayon::prelude::*;
use tracing::debug;

use crate::buffer::{db_to_gain, StereoBuffer};
use crate::clip::ClipProcessor;
use crate::error::{RenderError, RenderResult};
use crate::loudness::measure_lufs;
use crate::plan::{RenderPlan, TrackPlan};

/// Builds the bounded pool that runs per-track work.
pub fn worker_pool(workers: usize) -> RenderResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| RenderError::InvalidConfig(format!("failed to create worker pool: {e}")))
}

/// Linear role correction for a track with a loudness target.
///
/// Unmeasurable (silent) tracks are left alone.
pub fn role_gain(target: Option<f64>, measured: Option<f64>) -> f64 {
    match (target, measured) {
        (Some(target), Some(lufs)) => db_to_gain(target - lufs),
        _ => 1.0,
    }
}

/// Renders tracks onto project-length canvases.
#[derive(Debug, Clone, Copy)]
pub struct TrackMixer {
    sample_rate: u32,
    channels: u16,
    total_frames: usize,
    clips: ClipProcessor,
}

impl TrackMixer {
    pub fn new(plan: &RenderPlan) -> Self {
        Self {
            sample_rate: plan.sample_rate,
            channels: plan.channels,
            total_frames: plan.total_frames,
            clips: ClipProcessor::new(plan.sample_rate),
        }
    }

    /// Renders every clip of a track in start order, then applies the role target.
    pub fn mix_track(&self, track: &TrackPlan) -> RenderResult<StereoBuffer> {
        let mut canvas = StereoBuffer::new(self.total_frames);
        for clip in &track.clips {
            self.clips.render_onto(clip, &mut canvas)?;
        }

        let measured = track
            .role_target
            .and_then(|_| measure_lufs(&canvas, self.sample_rate, self.channels));
        let gain = role_gain(track.role_target, measured);
        debug!(track = %track.id, lufs = ?measured, gain, "mixed track");
        canvas.scale(gain);
        Ok(canvas)
    }

    /// Mixes all tracks in parallel and sums them in track order.
    pub fn mix(&self, plan: &RenderPlan) -> RenderResult<StereoBuffer> {
        let tracks: Vec<StereoBuffer> = plan
            .tracks
            .par_iter()
            .map(|track| self.mix_track(track))
            .collect::<RenderResult<_>>()?;

        let mut master = StereoBuffer::new(self.total_frames);
        for track in &tracks {
            master.mix_at(track, 0);
        }
        Ok(master)
    }
}
