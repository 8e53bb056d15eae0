//! Mixdown Render Engine
//!
//! Renders a compiled Mixdown timeline to a single WAV file.
//!
//! # Overview
//!
//! Every placed clip runs through a fixed chain:
//!
//! 1. track and clip gain
//! 2. EQ preset
//! 3. semantic loudness and scene-energy gain (sound effects)
//! 4. energy ramp and dialogue density gain (music and background)
//! 5. looping
//! 6. ducking
//! 7. dialogue compression
//! 8. fades
//!
//! Tracks are then corrected to their role loudness target and summed. The
//! master applies tonal shaping, master gain, a clamped loudness correction,
//! optional peak normalization and an optional fade-out.
//!
//! # Render modes
//!
//! The standard renderer holds every track in memory and processes tracks in
//! parallel. The streaming renderer processes fixed-size chunks with per-clip
//! filter state carried across chunk boundaries and decodes each source range
//! as it plays. Both execute the same [`plan::RenderPlan`], so their output
//! matches.
//!
//! # Determinism
//!
//! Rendering the same timeline twice produces byte-identical files. Output is
//! written to a temporary file and moved into place only when complete.
//!
//! # Example
//!
//! ```ignore
//! use mixdown_render::{render_file, RenderOptions};
//!
//! let report = render_file("story.json".as_ref(), "story.wav".as_ref(), &RenderOptions::default())?;
//! println!("PCM hash: {}", report.pcm_hash);
//! ```

pub mod buffer;
pub mod clip;
pub mod ducking;
pub mod dynamics;
pub mod energy;
pub mod eq;
pub mod error;
pub mod fades;
pub mod filter;
pub mod loudness;
pub mod master;
pub mod plan;
pub mod render;
pub mod sfx;
pub mod source;
pub mod streaming;
pub mod track;
pub mod wav;

// Re-export main types at crate root
pub use buffer::StereoBuffer;
pub use error::{RenderError, RenderResult};
pub use loudness::{measure_lufs, LoudnessMeter};
pub use plan::{Planner, RenderPlan};
pub use render::{
    render_file, render_timeline, timeline_files, RenderMode, RenderOptions, RenderReport,
};
pub use source::{ClipSource, SourceCache, SourceMode};
