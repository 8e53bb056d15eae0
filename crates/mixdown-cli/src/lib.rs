//! Mixdown CLI library.
//!
//! This crate provides the core functionality for the Mixdown CLI: timeline
//! loading, logging setup and the `validate`, `inspect` and `render`
//! commands.

pub mod commands;
pub mod input;
pub mod logging;
