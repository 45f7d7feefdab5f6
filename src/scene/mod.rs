//! Scene description: layer list, keying rule, and how to assemble the runtime pieces from it.

/// Scene JSON model and assembly.
pub mod config;

pub use config::{DEFAULT_SEQUENCE_FPS, KeyingDef, SceneConfig, SceneLayer, SourceDef};
