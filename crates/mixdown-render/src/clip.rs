//! The per-clip DSP chain.
//!
//! Stage order: gain, EQ, semantic gain, energy ramp, density gain, looping,
//! ducking, compression, fades, then summing onto the track. Stages before
//! looping run on source frames, so every loop repetition replays the same
//! shaped audio. Stages after looping run on canvas frames.
//!
//! [`ClipProcessor::render`] processes a whole clip at once and
//! [`ClipProcessor::process_slice`] processes it piecewise with persistent
//! [`ClipState`]. Both go through the same per-frame helpers.

use crate::buffer::StereoBuffer;
use crate::dynamics::Compressor;
use crate::error::RenderResult;
use crate::filter::FilterChain;
use crate::plan::ClipPlan;
use crate::source::SourceReader;
use crate::streaming::ClipSlice;

/// Filter, compressor and source cursor state owned by one clip.
#[derive(Debug)]
pub struct ClipState {
    eq: FilterChain,
    compressor: Option<Compressor>,
    reader: SourceReader,
    /// Source frames of the current slice.
    block: StereoBuffer,
}

impl ClipState {
    /// Creates fresh state for a clip.
    pub fn new(plan: &ClipPlan, sample_rate: u32) -> Self {
        Self {
            eq: plan
                .eq
                .map(|preset| preset.chain(sample_rate))
                .unwrap_or_default(),
            compressor: plan
                .compression
                .as_ref()
                .map(|config| Compressor::new(config, sample_rate)),
            reader: plan.source.reader(),
            block: StereoBuffer::default(),
        }
    }
}

/// Stages that precede looping, for the source sample at `source_frame`.
#[inline]
fn shape_source(
    plan: &ClipPlan,
    eq: &mut FilterChain,
    source_frame: usize,
    left: f64,
    right: f64,
) -> (f64, f64) {
    let mut left = left * plan.pre_gain;
    let mut right = right * plan.pre_gain;

    (left, right) = eq.process(left, right);

    left *= plan.semantic_gain;
    right *= plan.semantic_gain;

    if let Some(ramp) = &plan.ramp {
        let gain = ramp.gain_at(source_frame);
        left *= gain;
        right *= gain;
    }

    left *= plan.density_gain;
    right *= plan.density_gain;
    (left, right)
}

/// Stages that follow looping, at an absolute canvas frame.
#[inline]
fn finish_frame(
    plan: &ClipPlan,
    compressor: Option<&mut Compressor>,
    frame: usize,
    sample_rate: u32,
    mut left: f64,
    mut right: f64,
) -> (f64, f64) {
    if let Some(ducking) = &plan.ducking {
        let gain = ducking.gain_at_frame(frame, sample_rate);
        left *= gain;
        right *= gain;
    }

    if let Some(compressor) = compressor {
        (left, right) = compressor.process(left, right);
    }

    let fade = plan.fades.gain_at(frame);
    (left * fade, right * fade)
}

/// Runs the clip chain at a fixed sample rate.
#[derive(Debug, Clone, Copy)]
pub struct ClipProcessor {
    sample_rate: u32,
}

impl ClipProcessor {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    /// Renders the placed frames of a clip.
    pub fn render(&self, plan: &ClipPlan) -> RenderResult<StereoBuffer> {
        let len = plan.len();
        let source = plan.source.load()?;
        let shaped_len = source.len().min(len);
        let mut state = ClipState::new(plan, self.sample_rate);

        let mut shaped = StereoBuffer::new(shaped_len);
        for s in 0..shaped_len {
            let (l, r) = shape_source(plan, &mut state.eq, s, source.left[s], source.right[s]);
            shaped.left[s] = l;
            shaped.right[s] = r;
        }

        let mut out = StereoBuffer::new(len);
        for i in 0..len {
            let s = i % shaped_len;
            let (l, r) = finish_frame(
                plan,
                state.compressor.as_mut(),
                plan.start_frame + i,
                self.sample_rate,
                shaped.left[s],
                shaped.right[s],
            );
            out.left[i] = l;
            out.right[i] = r;
        }
        Ok(out)
    }

    /// Renders a clip and sums it onto a track canvas.
    pub fn render_onto(&self, plan: &ClipPlan, canvas: &mut StereoBuffer) -> RenderResult<()> {
        let placed = self.render(plan)?;
        canvas.mix_at(&placed, plan.start_frame);
        Ok(())
    }

    /// Processes one slice and sums it into a chunk buffer starting at `chunk_start`.
    ///
    /// A slice that restarts the source at frame 0 after the clip start is a
    /// new loop repetition and begins with cleared EQ delay lines. The
    /// compressor runs on uninterrupted. Only the slice's source frames are
    /// read.
    pub fn process_slice(
        &self,
        plan: &ClipPlan,
        state: &mut ClipState,
        slice: &ClipSlice,
        chunk_start: usize,
        out: &mut StereoBuffer,
    ) -> RenderResult<()> {
        let ClipState {
            eq,
            compressor,
            reader,
            block,
        } = state;
        if slice.source_offset == 0 && slice.start > plan.start_frame {
            eq.reset();
        }
        reader.read_at(slice.source_offset, slice.frames, block)?;

        for k in 0..slice.frames {
            let frame = slice.start + k;
            let (l, r) = shape_source(
                plan,
                eq,
                slice.source_offset + k,
                block.left[k],
                block.right[k],
            );
            let (l, r) = finish_frame(plan, compressor.as_mut(), frame, self.sample_rate, l, r);
            out.left[frame - chunk_start] += l;
            out.right[frame - chunk_start] += r;
        }
        Ok(())
    }
}
