//! JSON output types for machine-readable CLI output.
//!
//! These types back the `--json` flag on `validate`, `render` and `inspect`.

use mixdown_render::RenderReport;
use mixdown_spec::{ValidationError, ValidationWarning};
use serde::Serialize;

/// A structured error in JSON output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct JsonError {
    /// Stable error code (e.g., "CLI_001", "E001", "RENDER_002")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// JSON path to the problematic field (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl JsonError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            path: None,
        }
    }
}

impl From<&ValidationError> for JsonError {
    fn from(err: &ValidationError) -> Self {
        Self {
            code: err.code.to_string(),
            message: err.message.clone(),
            path: err.path.clone(),
        }
    }
}

/// A structured warning in JSON output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct JsonWarning {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl From<&ValidationWarning> for JsonWarning {
    fn from(warn: &ValidationWarning) -> Self {
        Self {
            code: warn.code.to_string(),
            message: warn.message.clone(),
            path: warn.path.clone(),
        }
    }
}

/// JSON output for the `validate` command.
#[derive(Debug, Clone, Serialize)]
pub struct ValidateOutput {
    /// Whether validation succeeded (no errors)
    pub success: bool,
    pub errors: Vec<JsonError>,
    pub warnings: Vec<JsonWarning>,
    /// Canonical timeline hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline_hash: Option<String>,
    /// BLAKE3 hash of the source file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<String>,
    pub duration_ms: u64,
}

/// JSON output for the `render` command.
#[derive(Debug, Clone, Serialize)]
pub struct RenderOutput {
    pub success: bool,
    pub errors: Vec<JsonError>,
    /// Render summary (on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RenderReport>,
}

/// One placed clip in the `inspect` view.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClipSummary {
    pub file: String,
    /// Seconds.
    pub start: f64,
    /// Seconds. Absent when the source length is unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    pub looping: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fade_in: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fade_out: Option<f64>,
    /// Ducking amount in dB from the clip's rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duck_amount: Option<f64>,
    /// Compression threshold in dBFS from the clip's rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_threshold: Option<f64>,
}

/// One compiled track in the `inspect` view.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrackSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    /// Track gain in dB.
    pub gain: f64,
    /// Placed clips sorted by start.
    pub clips: Vec<ClipSummary>,
}

/// JSON output for the `inspect` command.
#[derive(Debug, Clone, Serialize)]
pub struct InspectOutput {
    pub success: bool,
    pub errors: Vec<JsonError>,
    /// Project duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub tracks: Vec<TrackSummary>,
}

/// Serializes command output for stdout.
pub fn to_json<T: Serialize>(output: &T) -> String {
    serde_json::to_string_pretty(output).unwrap_or_else(|e| {
        format!(
            r#"{{"success": false, "errors": [{{"code": "CLI_009", "message": "{}"}}]}}"#,
            e
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixdown_spec::ErrorCode;

    #[test]
    fn test_validation_error_conversion() {
        let err = ValidationError::with_path(
            ErrorCode::MissingSource,
            "missing audio file: a.wav",
            "tracks[0].clips[0].file",
        );
        let json = JsonError::from(&err);
        assert_eq!(json.code, "E004");
        assert_eq!(json.path.as_deref(), Some("tracks[0].clips[0].file"));
    }

    #[test]
    fn test_path_is_omitted_when_absent() {
        let json = to_json(&JsonError::new("CLI_001", "failed to read"));
        assert!(json.contains("\"code\": \"CLI_001\""));
        assert!(!json.contains("path"));
    }

    #[test]
    fn test_clip_summary_omits_unset_overrides() {
        let clip = ClipSummary {
            file: "bed.wav".to_string(),
            start: 0.0,
            end: Some(4.0),
            looping: true,
            fade_in: Some(1.0),
            fade_out: None,
            duck_amount: None,
            compression_threshold: None,
        };
        let json = to_json(&clip);
        assert!(json.contains("\"fade_in\": 1.0"));
        assert!(!json.contains("fade_out"));
        assert!(!json.contains("duck_amount"));
    }
}
