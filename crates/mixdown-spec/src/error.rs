//! Error types for timeline loading, compilation, and validation.

use thiserror::Error;

/// Error codes reported by timeline validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Structural errors (E001, E009, E012, E013, plus E002, E003, E007)
    /// E001: Project duration missing or not positive
    InvalidDuration,
    /// E009: Unsupported sample rate, bit depth, or channel count
    InvalidOutputFormat,
    /// E012: Track id contains unsupported characters
    InvalidTrackId,
    /// E013: A rule block does not match its schema
    InvalidRules,

    // Referential errors (E002-E008, E010, E011)
    // Those with an ErrorScope can be skipped by dropping the scoped clips.
    /// E002: Scene references a track that does not exist
    UnknownTrack,
    /// E003: Two tracks share the same id
    DuplicateTrackId,
    /// E004: Clip source file does not exist
    MissingSource,
    /// E005: Clip starts before zero
    NegativeStart,
    /// E006: Looping clip ends at or before its start
    InvalidLoopUntil,
    /// E007: Authored rules contain an engine-generated key
    EngineFieldInInput,
    /// E008: Ducking rule names an unknown role
    InvalidRoleSelector,
    /// E010: Semantic role declared on a non-sfx track
    SemanticRoleOnNonSfx,
    /// E011: Clip source exists but cannot be decoded
    UnreadableSource,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "E001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::InvalidDuration => "E001",
            ErrorCode::UnknownTrack => "E002",
            ErrorCode::DuplicateTrackId => "E003",
            ErrorCode::MissingSource => "E004",
            ErrorCode::NegativeStart => "E005",
            ErrorCode::InvalidLoopUntil => "E006",
            ErrorCode::EngineFieldInInput => "E007",
            ErrorCode::InvalidRoleSelector => "E008",
            ErrorCode::InvalidOutputFormat => "E009",
            ErrorCode::SemanticRoleOnNonSfx => "E010",
            ErrorCode::UnreadableSource => "E011",
            ErrorCode::InvalidTrackId => "E012",
            ErrorCode::InvalidRules => "E013",
        }
    }

    /// Returns true for errors that make a render impossible regardless of policy.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ErrorCode::InvalidDuration
                | ErrorCode::InvalidOutputFormat
                | ErrorCode::InvalidTrackId
                | ErrorCode::InvalidRules
                | ErrorCode::UnknownTrack
                | ErrorCode::DuplicateTrackId
                | ErrorCode::EngineFieldInInput
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Warning codes reported by timeline validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningCode {
    /// W001: Clips overlap on the same track (resolved automatically)
    OverlappingClips,
    /// W002: Clip starts after the project end
    StartsAfterEnd,
    /// W003: Clip extends past the project end
    ExceedsDuration,
    /// W004: Clip has no start time and will be skipped
    MissingStart,
    /// W005: Unknown EQ preset name
    UnknownEqPreset,
    /// W006: Unknown tonal tilt preset
    UnknownTilt,
    /// W007: Scene has no duration
    EmptyScene,
}

impl WarningCode {
    /// Returns the warning code string (e.g., "W001").
    pub fn code(&self) -> &'static str {
        match self {
            WarningCode::OverlappingClips => "W001",
            WarningCode::StartsAfterEnd => "W002",
            WarningCode::ExceedsDuration => "W003",
            WarningCode::MissingStart => "W004",
            WarningCode::UnknownEqPreset => "W005",
            WarningCode::UnknownTilt => "W006",
            WarningCode::EmptyScene => "W007",
        }
    }
}

impl std::fmt::Display for WarningCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The clips a validation error disqualifies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorScope {
    /// `tracks[track].clips[clip]`
    TrackClip { track: usize, clip: usize },
    /// Every clip placed on `tracks[track]`, authored or from a scene.
    Track(usize),
    /// `scenes[scene].tracks.{track}[clip]`
    SceneClip {
        scene: usize,
        track: String,
        clip: usize,
    },
}

/// A validation error with code, message, and optional JSON path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// JSON path to the problematic field (e.g., "tracks\[0\].clips\[2\].file").
    pub path: Option<String>,
    /// Clips that can be dropped to render past this error.
    pub scope: Option<ErrorScope>,
}

impl ValidationError {
    /// Creates a new validation error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
            scope: None,
        }
    }

    /// Creates a new validation error with a JSON path.
    pub fn with_path(code: ErrorCode, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: Some(path.into()),
            scope: None,
        }
    }

    /// Attaches the clips this error disqualifies.
    pub fn scoped(mut self, scope: ErrorScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// True if the error can be skipped by dropping clips.
    pub fn is_droppable(&self) -> bool {
        self.scope.is_some() && !self.code.is_structural()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: {} (at {})", self.code, self.message, path)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// A validation warning with code, message, and optional JSON path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The warning code.
    pub code: WarningCode,
    /// Human-readable warning message.
    pub message: String,
    /// JSON path to the problematic field.
    pub path: Option<String>,
}

impl ValidationWarning {
    /// Creates a new validation warning.
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
        }
    }

    /// Creates a new validation warning with a JSON path.
    pub fn with_path(
        code: WarningCode,
        message: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            path: Some(path.into()),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: {} (at {})", self.code, self.message, path)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

/// Top-level error type for timeline operations.
#[derive(Debug, Error)]
pub enum SpecError {
    /// Timeline validation failed with one or more errors.
    #[error("timeline validation failed with {0} error(s)")]
    ValidationFailed(usize),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A rule block could not be interpreted.
    #[error("invalid rules at '{path}': {message}")]
    InvalidRules { path: String, message: String },

    /// A scene references a track id that does not exist.
    #[error("scene '{scene}' references unknown track '{track}'")]
    UnknownTrack { scene: String, track: String },

    /// A role selector string could not be parsed.
    #[error("invalid role selector '{0}'")]
    InvalidSelector(String),

    /// An authored rule tree carries an engine-generated key.
    #[error("engine-generated field '{key}' is not accepted as input (at {path})")]
    EngineField { key: String, path: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpecError {
    /// Creates an invalid-rules error.
    pub fn invalid_rules(path: impl Into<String>, message: impl Into<String>) -> Self {
        SpecError::InvalidRules {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of timeline validation.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether validation passed (no errors).
    pub ok: bool,
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of validation warnings.
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    /// Creates a successful validation result.
    pub fn success() -> Self {
        Self {
            ok: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
        self.ok = false;
    }

    /// Adds a warning to the result.
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// Returns true if any error is structural.
    pub fn has_structural_errors(&self) -> bool {
        self.errors.iter().any(|e| e.code.is_structural())
    }

    /// Returns true if every error can be skipped by dropping clips.
    pub fn all_droppable(&self) -> bool {
        self.errors.iter().all(ValidationError::is_droppable)
    }

    /// Returns true if the given error code was reported.
    pub fn has_error(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    /// Returns true if the given warning code was reported.
    pub fn has_warning(&self, code: WarningCode) -> bool {
        self.warnings.iter().any(|w| w.code == code)
    }

    /// Converts to a Result, returning Err if there are errors.
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, Vec<ValidationError>> {
        if self.ok {
            Ok(self.warnings)
        } else {
            Err(self.errors)
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ErrorCode::InvalidDuration.code(), "E001");
        assert_eq!(ErrorCode::UnreadableSource.code(), "E011");
        assert_eq!(WarningCode::OverlappingClips.code(), "W001");
        assert_eq!(WarningCode::EmptyScene.code(), "W007");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::with_path(
            ErrorCode::MissingSource,
            "file not found: vo.wav",
            "tracks[0].clips[0].file",
        );
        assert_eq!(
            err.to_string(),
            "E004: file not found: vo.wav (at tracks[0].clips[0].file)"
        );
    }

    #[test]
    fn test_result_tracks_errors() {
        let mut result = ValidationResult::success();
        assert!(result.is_ok());
        result.add_warning(ValidationWarning::new(WarningCode::MissingStart, "skipped"));
        assert!(result.is_ok());
        result.add_error(ValidationError::new(ErrorCode::MissingSource, "missing"));
        assert!(!result.is_ok());
        assert!(!result.has_structural_errors());
        result.add_error(ValidationError::new(ErrorCode::InvalidDuration, "bad"));
        assert!(result.has_structural_errors());
    }
}
