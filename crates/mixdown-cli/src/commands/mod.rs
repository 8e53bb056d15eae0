//! CLI command implementations

pub mod inspect;
pub mod json_output;
pub mod render;
pub mod validate;

use mixdown_render::{timeline_files, SourceCache};
use mixdown_spec::Timeline;
use std::path::Path;

/// Measures every source a timeline references without keeping its audio.
pub(crate) fn load_sources(timeline: &Timeline, base_dir: &Path) -> SourceCache {
    let mut sources = SourceCache::streamed(base_dir, timeline.project.sample_rate);
    sources.load(timeline_files(timeline));
    sources
}
