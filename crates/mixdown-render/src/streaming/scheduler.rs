//! Chunk partitioning and per-chunk clip slices.

use crate::plan::TrackPlan;

/// A half-open frame interval `[start, end)` of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// The part of a clip that falls inside one chunk and one loop repetition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipSlice {
    pub track_index: usize,
    /// Position of the clip in its track plan.
    pub clip: usize,
    /// First absolute canvas frame.
    pub start: usize,
    pub frames: usize,
    /// Source frame played at `start`.
    pub source_offset: usize,
}

impl ClipSlice {
    /// One past the last canvas frame.
    pub fn end(&self) -> usize {
        self.start + self.frames
    }
}

/// Splits a render into fixed-size chunks.
#[derive(Debug, Clone, Copy)]
pub struct ChunkScheduler {
    total_frames: usize,
    chunk_frames: usize,
}

impl ChunkScheduler {
    pub fn new(total_frames: usize, chunk_frames: usize) -> Self {
        Self {
            total_frames,
            chunk_frames: chunk_frames.max(1),
        }
    }

    /// Number of chunks covering the render.
    pub fn chunk_count(&self) -> usize {
        self.total_frames.div_ceil(self.chunk_frames)
    }

    /// All chunks in order. The last one may be shorter.
    pub fn chunks(&self) -> impl Iterator<Item = Chunk> + '_ {
        (0..self.chunk_count()).map(move |index| {
            let start = index * self.chunk_frames;
            Chunk {
                index,
                start,
                end: (start + self.chunk_frames).min(self.total_frames),
            }
        })
    }

    /// Slices of a track's clips inside a chunk, in plan order.
    ///
    /// A looping clip yields one slice per repetition touched by the chunk.
    pub fn slices(&self, track: &TrackPlan, chunk: Chunk) -> Vec<ClipSlice> {
        let mut slices = Vec::new();
        for (position, plan) in track.clips.iter().enumerate() {
            if plan.end_frame <= chunk.start || plan.start_frame >= chunk.end {
                continue;
            }
            let end = plan.end_frame.min(chunk.end);
            let mut frame = plan.start_frame.max(chunk.start);
            while frame < end {
                let source_offset = plan.source_frame(frame);
                let mut frames = end - frame;
                if plan.looping {
                    frames = frames.min(plan.source.len() - source_offset);
                }
                slices.push(ClipSlice {
                    track_index: track.index,
                    clip: position,
                    start: frame,
                    frames,
                    source_offset,
                });
                frame += frames;
            }
        }
        slices
    }
}
