//! Timeline loading.
//!
//! Reads a timeline document, records a hash of the raw source and the
//! directory that relative clip paths resolve against.

use mixdown_spec::Timeline;
use std::path::{Path, PathBuf};

/// Recognized timeline extensions.
pub const JSON_EXTENSIONS: &[&str] = &["json"];

/// Result of loading a timeline file.
#[derive(Debug)]
pub struct LoadResult {
    /// The parsed timeline.
    pub timeline: Timeline,
    /// Directory of the timeline file.
    pub base_dir: PathBuf,
    /// BLAKE3 hash of the source file content (hex string).
    pub source_hash: String,
}

/// Errors that can occur during timeline loading.
#[derive(Debug)]
pub enum InputError {
    /// File could not be read.
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Unknown file extension.
    UnknownExtension { extension: Option<String> },

    /// JSON parsing failed.
    JsonParse { message: String },
}

impl InputError {
    /// Returns a stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            InputError::FileRead { .. } => "CLI_001",
            InputError::UnknownExtension { .. } => "CLI_002",
            InputError::JsonParse { .. } => "CLI_003",
        }
    }
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::FileRead { path, source } => {
                write!(f, "failed to read file '{}': {}", path.display(), source)
            }
            InputError::UnknownExtension { extension } => match extension {
                Some(ext) => write!(f, "unknown file extension '.{}' (expected .json)", ext),
                None => write!(f, "file has no extension (expected .json)"),
            },
            InputError::JsonParse { message } => {
                write!(f, "JSON parse error: {}", message)
            }
        }
    }
}

impl std::error::Error for InputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InputError::FileRead { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Loads a timeline from a JSON file.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use mixdown_cli::input::load_timeline;
///
/// let result = load_timeline(Path::new("story.json")).unwrap();
/// println!("{} tracks", result.timeline.tracks.len());
/// ```
pub fn load_timeline(path: &Path) -> Result<LoadResult, InputError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase());
    if !extension
        .as_deref()
        .is_some_and(|ext| JSON_EXTENSIONS.contains(&ext))
    {
        return Err(InputError::UnknownExtension { extension });
    }

    let content = std::fs::read(path).map_err(|source| InputError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let source_hash = blake3::hash(&content).to_hex().to_string();

    let text = String::from_utf8_lossy(&content);
    let timeline = Timeline::from_json(&text).map_err(|e| InputError::JsonParse {
        message: e.to_string(),
    })?;

    let base_dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok(LoadResult {
        timeline,
        base_dir,
        source_hash,
    })
}
