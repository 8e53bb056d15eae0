//! Source decoding and the per-render source cache.

mod stream;

pub use stream::{resample, SourceStream};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mixdown_spec::DurationProbe;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::buffer::StereoBuffer;
use crate::error::RenderResult;

/// Decodes an audio file to a stereo buffer at `target_rate`.
pub fn decode_file(path: &Path, target_rate: u32) -> RenderResult<StereoBuffer> {
    SourceStream::open(path, target_rate)?.read_to_end()
}

/// How a cache holds its sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// Every source is decoded into memory.
    Decoded,
    /// Only frame counts are kept. Clips decode their range as they play.
    Streamed,
}

/// The audio behind one placed clip.
#[derive(Debug, Clone)]
pub enum ClipSource {
    Decoded(Arc<StereoBuffer>),
    Streamed {
        path: Arc<PathBuf>,
        frames: usize,
        sample_rate: u32,
    },
}

impl ClipSource {
    /// Number of frames at the render sample rate.
    pub fn len(&self) -> usize {
        match self {
            ClipSource::Decoded(buffer) => buffer.len(),
            ClipSource::Streamed { frames, .. } => *frames,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A cursor over the source. Nothing is opened until the first read.
    pub fn reader(&self) -> SourceReader {
        SourceReader {
            source: self.clone(),
            stream: None,
            position: 0,
        }
    }

    /// The whole source in memory. Streamed sources are decoded on each call.
    pub fn load(&self) -> RenderResult<Arc<StereoBuffer>> {
        match self {
            ClipSource::Decoded(buffer) => Ok(Arc::clone(buffer)),
            ClipSource::Streamed {
                path, sample_rate, ..
            } => Ok(Arc::new(decode_file(path, *sample_rate)?)),
        }
    }
}

impl From<StereoBuffer> for ClipSource {
    fn from(buffer: StereoBuffer) -> Self {
        ClipSource::Decoded(Arc::new(buffer))
    }
}

/// Per-clip read cursor.
///
/// Streamed sources keep one decoder open and advance it. Reading behind the
/// cursor, as a loop restart does, reopens the file. Frames past the end of
/// the source read as silence.
#[derive(Debug)]
pub struct SourceReader {
    source: ClipSource,
    stream: Option<SourceStream>,
    position: usize,
}

impl SourceReader {
    /// Replaces `out` with `frames` source frames starting at `offset`.
    pub fn read_at(
        &mut self,
        offset: usize,
        frames: usize,
        out: &mut StereoBuffer,
    ) -> RenderResult<()> {
        out.left.clear();
        out.right.clear();

        match &self.source {
            ClipSource::Decoded(buffer) => {
                let start = offset.min(buffer.len());
                let end = offset.saturating_add(frames).min(buffer.len());
                out.left.extend_from_slice(&buffer.left[start..end]);
                out.right.extend_from_slice(&buffer.right[start..end]);
            }
            ClipSource::Streamed {
                path, sample_rate, ..
            } => {
                let stream = match &mut self.stream {
                    Some(stream) if offset >= self.position => stream,
                    slot => {
                        self.position = 0;
                        slot.insert(SourceStream::open(path, *sample_rate)?)
                    }
                };
                if offset > self.position {
                    self.position += stream.skip(offset - self.position)?;
                }
                if offset == self.position {
                    self.position += stream.read(frames, out)?;
                }
            }
        }

        out.left.resize(frames, 0.0);
        out.right.resize(frames, 0.0);
        Ok(())
    }
}

/// Sources of one render, keyed by the file name as authored.
#[derive(Debug)]
pub struct SourceCache {
    base_dir: PathBuf,
    sample_rate: u32,
    mode: SourceMode,
    sources: BTreeMap<String, ClipSource>,
    failures: BTreeMap<String, String>,
}

impl SourceCache {
    /// Creates an empty cache that decodes sources into memory.
    pub fn new(base_dir: impl Into<PathBuf>, sample_rate: u32) -> Self {
        Self::with_mode(base_dir, sample_rate, SourceMode::Decoded)
    }

    /// Creates an empty cache that records only source lengths.
    pub fn streamed(base_dir: impl Into<PathBuf>, sample_rate: u32) -> Self {
        Self::with_mode(base_dir, sample_rate, SourceMode::Streamed)
    }

    pub fn with_mode(base_dir: impl Into<PathBuf>, sample_rate: u32, mode: SourceMode) -> Self {
        Self {
            base_dir: base_dir.into(),
            sample_rate,
            mode,
            sources: BTreeMap::new(),
            failures: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> SourceMode {
        self.mode
    }

    /// Path of an authored file name.
    pub fn resolve(&self, file: &str) -> PathBuf {
        self.base_dir.join(file)
    }

    /// Loads every file not already cached. Failures are recorded, not returned.
    pub fn load<'a>(&mut self, files: impl IntoIterator<Item = &'a str>) {
        let pending: BTreeSet<&str> = files
            .into_iter()
            .filter(|f| !self.sources.contains_key(*f) && !self.failures.contains_key(*f))
            .collect();
        let pending: Vec<&str> = pending.into_iter().collect();

        let results: Vec<(&str, RenderResult<ClipSource>)> = pending
            .par_iter()
            .map(|file| (*file, self.load_one(file)))
            .collect();

        for (file, result) in results {
            match result {
                Ok(source) => {
                    debug!(file, frames = source.len(), mode = ?self.mode, "loaded source");
                    self.sources.insert(file.to_string(), source);
                }
                Err(e) => {
                    warn!(file, error = %e, "failed to load source");
                    self.failures.insert(file.to_string(), e.to_string());
                }
            }
        }
    }

    fn load_one(&self, file: &str) -> RenderResult<ClipSource> {
        let path = self.resolve(file);
        match self.mode {
            SourceMode::Decoded => Ok(decode_file(&path, self.sample_rate)?.into()),
            SourceMode::Streamed => {
                let frames = SourceStream::count_frames(&path, self.sample_rate)?;
                Ok(ClipSource::Streamed {
                    path: Arc::new(path),
                    frames,
                    sample_rate: self.sample_rate,
                })
            }
        }
    }

    /// Inserts an already decoded buffer.
    pub fn insert(&mut self, file: impl Into<String>, buffer: StereoBuffer) {
        let file = file.into();
        self.failures.remove(&file);
        self.sources.insert(file, buffer.into());
    }

    /// Returns a loaded source.
    pub fn get(&self, file: &str) -> Option<ClipSource> {
        self.sources.get(file).cloned()
    }
}

impl DurationProbe for SourceCache {
    fn duration(&self, file: &str) -> Option<f64> {
        self.sources
            .get(file)
            .map(|s| s.len() as f64 / self.sample_rate as f64)
    }

    fn load_error(&self, file: &str) -> Option<String> {
        self.failures.get(file).cloned()
    }
}
