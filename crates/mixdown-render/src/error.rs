//! Error types for the render engine.

use mixdown_spec::SpecError;
use thiserror::Error;

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while rendering a timeline.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The timeline could not be loaded or compiled.
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Validation reported errors and the render policy does not skip them.
    #[error("timeline is invalid: {count} error(s), first: {first}")]
    Invalid {
        /// Number of validation errors.
        count: usize,
        /// The first error message.
        first: String,
    },

    /// A source file could not be opened or decoded.
    #[error("failed to decode '{file}': {message}")]
    Decode {
        /// Source file as authored.
        file: String,
        /// Error message.
        message: String,
    },

    /// Sample rate conversion failed.
    #[error("resampling failed: {0}")]
    Resample(String),

    /// Invalid render configuration.
    #[error("invalid render configuration: {0}")]
    InvalidConfig(String),

    /// The finished output could not be moved into place.
    #[error("failed to persist output: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Creates a decode error.
    pub fn decode(file: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            file: file.into(),
            message: message.to_string(),
        }
    }

    /// Returns a stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            RenderError::Spec(_) => "RENDER_001",
            RenderError::Invalid { .. } => "RENDER_002",
            RenderError::Decode { .. } => "RENDER_003",
            RenderError::Resample(_) => "RENDER_004",
            RenderError::InvalidConfig(_) => "RENDER_005",
            RenderError::Persist(_) => "RENDER_006",
            RenderError::Io(_) => "RENDER_007",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_helper() {
        let err = RenderError::decode("bed.wav", "unexpected end of stream");
        assert_eq!(err.code(), "RENDER_003");
        assert!(err.to_string().contains("bed.wav"));
        assert!(err.to_string().contains("unexpected end"));
    }

    #[test]
    fn test_spec_errors_pass_through() {
        let err: RenderError = SpecError::InvalidSelector("narrator".into()).into();
        assert_eq!(err.code(), "RENDER_001");
        assert!(err.to_string().contains("narrator"));
    }
}
