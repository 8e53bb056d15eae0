//! Streaming render mode.
//!
//! The project is cut into fixed-size chunks. Each chunk runs the same clip
//! chain as the standard renderer, restricted to its window, with EQ and
//! compressor state carried from chunk to chunk per clip. Only one chunk of
//! audio per track is held in memory at a time.
//!
//! Sources are not decoded up front. Each clip's state owns a cursor into its
//! file and decodes the frames of the slice being rendered.

mod processor;
mod scheduler;
mod state;

pub use processor::{ChunkProcessor, StreamingConfig, StreamingOutcome};
pub use scheduler::{Chunk, ChunkScheduler, ClipSlice};
pub use state::FilterArena;
