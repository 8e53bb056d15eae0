//! Mixdown Timeline Library
//!
//! This crate provides the timeline document model, rule merging, scene
//! compilation, validation, and hashing for Mixdown. A timeline is a JSON
//! document describing tracks of audio clips, optional scenes that group
//! clips under shared rules, and global render settings.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use mixdown_spec::{compile, Timeline};
//!
//! let timeline = Timeline::from_json(r#"{
//!     "project": {"duration": 10.0},
//!     "tracks": [{"id": "vo", "type": "voice", "clips": [{"file": "line.wav", "start": 1.0}]}]
//! }"#).unwrap();
//!
//! let durations: HashMap<String, f64> = [("line.wav".to_string(), 2.5)].into();
//! let compiled = compile(&timeline, &durations).unwrap();
//! assert_eq!(compiled.placed_clips().count(), 1);
//! ```
//!
//! # Modules
//!
//! - [`timeline`]: Authored document types
//! - [`rules`]: Rule trees, merging, and the per-clip rule set
//! - [`settings`]: Typed configuration blocks
//! - [`preset`]: EQ preset names
//! - [`compile`]: Scene compilation and overlap resolution
//! - [`validation`]: Timeline validation
//! - [`hash`]: Canonical timeline hashing
//! - [`error`]: Error and warning types

pub mod compile;
pub mod error;
pub mod hash;
pub mod preset;
pub mod rules;
pub mod settings;
pub mod timeline;
pub mod validation;

pub use compile::{
    compile, Clip, CompiledTimeline, CompiledTrack, DurationProbe, NoDurations, OverlapResolver,
    SceneCompiler, ToneSegment,
};
pub use error::{
    ErrorCode, ErrorScope, SpecError, ValidationError, ValidationResult, ValidationWarning,
    WarningCode,
};
pub use preset::EqPresetName;
pub use rules::{ClipRules, DensityLabel, DialogueDensity, RuleMap};
pub use settings::{
    CompressionConfig, CrossfadeConfig, DuckingConfig, DuckingMode, DuckingRule, LoudnessSettings,
    MasterFadeOut, RenderSettings, StreamingSettings, Tilt, ToneShaping,
};
pub use timeline::{
    seconds_to_frames, Fade, FadeCurve, MixRole, Project, RoleSelector, Scene, SceneClip,
    SemanticRole, Timeline, Track, TrackClip, TrackKind,
};
pub use validation::{drop_invalid_clips, validate_timeline};
