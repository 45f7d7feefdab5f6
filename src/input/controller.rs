use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::calibration::config::CalibrationBackend;
use crate::calibration::store::CalibrationStore;
use crate::calibration::transform::{LayerTransform, TransformDelta};
use crate::foundation::core::Point;
use crate::foundation::error::{CompositeError, CompositeResult};

/// Modifier keys held during an event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Shift.
    pub shift: bool,
    /// Control.
    pub ctrl: bool,
    /// Alt / Option.
    pub alt: bool,
}

impl Modifiers {
    /// Only Shift held.
    pub const SHIFT: Self = Self {
        shift: true,
        ctrl: false,
        alt: false,
    };

    /// Only Ctrl held.
    pub const CTRL: Self = Self {
        shift: false,
        ctrl: true,
        alt: false,
    };

    fn holds(self, key: ModifierKey) -> bool {
        match key {
            ModifierKey::Shift => self.shift,
            ModifierKey::Ctrl => self.ctrl,
            ModifierKey::Alt => self.alt,
        }
    }
}

/// A single modifier used to gate a gesture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKey {
    /// Shift.
    Shift,
    /// Control.
    Ctrl,
    /// Alt / Option.
    Alt,
}

/// Key plus exact modifier set, e.g. Ctrl+J.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChord {
    /// Key, compared case-insensitively.
    pub key: char,
    /// Ctrl required.
    #[serde(default)]
    pub ctrl: bool,
    /// Shift required.
    #[serde(default)]
    pub shift: bool,
    /// Alt required.
    #[serde(default)]
    pub alt: bool,
}

impl KeyChord {
    /// Ctrl + `key`.
    pub const fn ctrl(key: char) -> Self {
        Self {
            key,
            ctrl: true,
            shift: false,
            alt: false,
        }
    }

    fn matches(&self, key: char, m: Modifiers) -> bool {
        key.eq_ignore_ascii_case(&self.key)
            && m.ctrl == self.ctrl
            && m.shift == self.shift
            && m.alt == self.alt
    }
}

/// On-screen calibration buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlButton {
    /// Move up by one offset step.
    Up,
    /// Move down by one offset step.
    Down,
    /// Move left by one offset step.
    Left,
    /// Move right by one offset step.
    Right,
    /// Grow by one scale step.
    ZoomIn,
    /// Shrink by one scale step.
    ZoomOut,
    /// Restore the target layer's defaults.
    Reset,
    /// Persist the calibration.
    Save,
}

impl std::str::FromStr for ControlButton {
    type Err = CompositeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "up" => Self::Up,
            "down" => Self::Down,
            "left" => Self::Left,
            "right" => Self::Right,
            "zoom_in" | "in" | "+" => Self::ZoomIn,
            "zoom_out" | "out" | "-" => Self::ZoomOut,
            "reset" => Self::Reset,
            "save" => Self::Save,
            other => {
                return Err(CompositeError::validation(format!(
                    "unknown control button '{other}'"
                )));
            }
        })
    }
}

/// User gestures, as delivered by the host UI.
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    /// Mouse wheel; positive `delta_y` scrolls down.
    Wheel {
        /// Vertical scroll amount.
        delta_y: f64,
        /// Held modifiers.
        modifiers: Modifiers,
    },
    /// Pointer pressed.
    PointerDown {
        /// Canvas position.
        at: Point,
        /// Held modifiers.
        modifiers: Modifiers,
        /// Pressed on the drag handle.
        on_handle: bool,
    },
    /// Pointer moved.
    PointerMove {
        /// Canvas position.
        at: Point,
    },
    /// Pointer released.
    PointerUp,
    /// Calibration panel button.
    Button(ControlButton),
    /// Key press.
    Key {
        /// Key character.
        key: char,
        /// Held modifiers.
        modifiers: Modifiers,
    },
    /// Choose which layer the gestures act on.
    SelectLayer(String),
}

/// Step sizes and gating for each gesture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputBindings {
    /// Scale change per wheel notch.
    pub wheel_step: f64,
    /// Modifier that must be held for the wheel to scale. `None` scales on every wheel event.
    pub wheel_modifier: Option<ModifierKey>,
    /// Modifier that enables dragging anywhere. `None` disables modifier-dragging.
    pub drag_modifier: Option<ModifierKey>,
    /// Whether pressing on the drag handle starts a drag.
    pub drag_handle: bool,
    /// Offset change per direction button, in canvas pixels.
    pub offset_step: f64,
    /// Scale change per zoom button.
    pub scale_step: f64,
    /// Shows or hides the calibration panel.
    pub toggle_panel: KeyChord,
    /// Saves the calibration.
    pub save: KeyChord,
}

impl Default for InputBindings {
    fn default() -> Self {
        Self {
            wheel_step: 0.1,
            wheel_modifier: Some(ModifierKey::Shift),
            drag_modifier: Some(ModifierKey::Shift),
            drag_handle: true,
            offset_step: 10.0,
            scale_step: 0.1,
            toggle_panel: KeyChord::ctrl('j'),
            save: KeyChord::ctrl('s'),
        }
    }
}

/// What handling an event did.
#[derive(Clone, Debug, PartialEq)]
pub enum InputOutcome {
    /// Nothing changed.
    Ignored,
    /// The target layer's transform changed.
    Updated {
        /// Layer that changed.
        layer: String,
        /// New transform.
        transform: LayerTransform,
    },
    /// Panel visibility flipped.
    PanelToggled {
        /// Visibility after the toggle.
        visible: bool,
    },
    /// Gestures now act on another layer.
    TargetChanged {
        /// New target.
        layer: String,
    },
    /// Calibration persisted.
    Saved,
    /// Persisting failed; the in-memory calibration is untouched. Show this once.
    SaveFailed {
        /// User-facing message.
        message: String,
    },
}

/// Turns gestures into [`CalibrationStore`] mutations.
pub struct InputController {
    store: Arc<CalibrationStore>,
    backend: Option<Arc<dyn CalibrationBackend>>,
    bindings: InputBindings,
    target: String,
    panel_visible: bool,
    drag_from: Option<Point>,
}

impl std::fmt::Debug for InputController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputController")
            .field("target", &self.target)
            .field("panel_visible", &self.panel_visible)
            .field("dragging", &self.drag_from.is_some())
            .finish_non_exhaustive()
    }
}

impl InputController {
    /// Controller acting on `target`, which must be a layer the store knows.
    pub fn new(store: Arc<CalibrationStore>, target: impl Into<String>) -> CompositeResult<Self> {
        let target = target.into();
        if store.bounds(&target).is_none() {
            return Err(CompositeError::validation(format!(
                "unknown calibration layer '{target}'"
            )));
        }
        Ok(Self {
            store,
            backend: None,
            bindings: InputBindings::default(),
            target,
            panel_visible: false,
            drag_from: None,
        })
    }

    /// Where `Save` persists to.
    pub fn with_backend(mut self, backend: Arc<dyn CalibrationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Replace the default bindings.
    pub fn with_bindings(mut self, bindings: InputBindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Layer gestures currently act on.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Whether the calibration panel is shown.
    pub fn panel_visible(&self) -> bool {
        self.panel_visible
    }

    /// Whether a drag is in progress.
    pub fn is_dragging(&self) -> bool {
        self.drag_from.is_some()
    }

    /// Dispatch one event.
    pub fn handle(&mut self, event: InputEvent) -> InputOutcome {
        match event {
            InputEvent::Wheel { delta_y, modifiers } => {
                let gated = self
                    .bindings
                    .wheel_modifier
                    .is_none_or(|k| modifiers.holds(k));
                if !gated || delta_y == 0.0 || !delta_y.is_finite() {
                    return InputOutcome::Ignored;
                }
                let step = self.bindings.wheel_step;
                let ds = if delta_y > 0.0 { -step } else { step };
                self.apply(TransformDelta::scale(ds))
            }
            InputEvent::PointerDown {
                at,
                modifiers,
                on_handle,
            } => {
                let by_modifier = self
                    .bindings
                    .drag_modifier
                    .is_some_and(|k| modifiers.holds(k));
                let by_handle = on_handle && self.bindings.drag_handle;
                if by_modifier || by_handle {
                    self.drag_from = Some(at);
                }
                InputOutcome::Ignored
            }
            InputEvent::PointerMove { at } => {
                let Some(from) = self.drag_from else {
                    return InputOutcome::Ignored;
                };
                let d = at - from;
                if d.x == 0.0 && d.y == 0.0 {
                    return InputOutcome::Ignored;
                }
                self.drag_from = Some(at);
                self.apply(TransformDelta::offset(d.x, d.y))
            }
            InputEvent::PointerUp => {
                self.drag_from = None;
                InputOutcome::Ignored
            }
            InputEvent::Button(button) => self.press(button),
            InputEvent::Key { key, modifiers } => {
                if self.bindings.toggle_panel.matches(key, modifiers) {
                    self.panel_visible = !self.panel_visible;
                    InputOutcome::PanelToggled {
                        visible: self.panel_visible,
                    }
                } else if self.bindings.save.matches(key, modifiers) {
                    self.save()
                } else {
                    InputOutcome::Ignored
                }
            }
            InputEvent::SelectLayer(layer) => {
                if self.store.bounds(&layer).is_none() {
                    tracing::warn!(%layer, "cannot target unknown layer");
                    return InputOutcome::Ignored;
                }
                self.drag_from = None;
                self.target = layer.clone();
                InputOutcome::TargetChanged { layer }
            }
        }
    }

    fn press(&mut self, button: ControlButton) -> InputOutcome {
        let o = self.bindings.offset_step;
        let s = self.bindings.scale_step;
        match button {
            ControlButton::Up => self.apply(TransformDelta::offset(0.0, -o)),
            ControlButton::Down => self.apply(TransformDelta::offset(0.0, o)),
            ControlButton::Left => self.apply(TransformDelta::offset(-o, 0.0)),
            ControlButton::Right => self.apply(TransformDelta::offset(o, 0.0)),
            ControlButton::ZoomIn => self.apply(TransformDelta::scale(s)),
            ControlButton::ZoomOut => self.apply(TransformDelta::scale(-s)),
            ControlButton::Reset => match self.store.reset(&self.target) {
                Ok(transform) => InputOutcome::Updated {
                    layer: self.target.clone(),
                    transform,
                },
                Err(e) => {
                    tracing::warn!(error = %e, "reset failed");
                    InputOutcome::Ignored
                }
            },
            ControlButton::Save => self.save(),
        }
    }

    fn apply(&mut self, delta: TransformDelta) -> InputOutcome {
        match self.store.update(&self.target, delta) {
            Ok(transform) => InputOutcome::Updated {
                layer: self.target.clone(),
                transform,
            },
            Err(e) => {
                tracing::warn!(error = %e, "calibration update failed");
                InputOutcome::Ignored
            }
        }
    }

    fn save(&mut self) -> InputOutcome {
        let Some(backend) = self.backend.as_deref() else {
            return InputOutcome::SaveFailed {
                message: "no calibration backend configured".to_owned(),
            };
        };
        match self.store.save(backend) {
            Ok(()) => InputOutcome::Saved,
            Err(e) => InputOutcome::SaveFailed {
                message: format!("failed to save calibration: {e}"),
            },
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/input/controller.rs"]
mod tests;
