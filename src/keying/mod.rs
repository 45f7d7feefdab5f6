//! Chroma keying: per-pixel backdrop classification and the per-frame keying pass.

/// Per-pixel backdrop classification.
pub mod classify;
/// Whole-frame keying pass.
pub mod keyer;

pub use classify::{
    ColorClassifier, EdgeMode, Hsv, KeyChannel, KeyColorSpec, KeyRule, VALUE_FLOOR, rgb_to_hsv,
};
pub use keyer::{FrameKeyer, KeyedFrame, KeyerOpts};
