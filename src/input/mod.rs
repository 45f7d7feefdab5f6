//! Calibration gestures: wheel, drag, buttons, and keyboard chords.

/// Gesture dispatch onto the calibration store.
pub mod controller;

pub use controller::{
    ControlButton, InputBindings, InputController, InputEvent, InputOutcome, KeyChord,
    ModifierKey, Modifiers,
};
