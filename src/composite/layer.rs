use serde::{Deserialize, Serialize};

use crate::composite::geometry::{FitPolicy, VerticalAnchor};
use crate::foundation::error::{CompositeError, CompositeResult};

/// Whether a layer is drawn as-is or run through the chroma keyer first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// Opaque rectangle (or the source's own alpha).
    #[default]
    Raw,
    /// Backdrop removed by the keyer before drawing.
    Keyed,
}

/// One entry of the draw order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerSpec {
    /// Layer name; also the calibration and source key.
    pub name: String,
    /// Raw or keyed.
    pub kind: LayerKind,
    /// Fit policy.
    pub fit: FitPolicy,
    /// Vertical anchor.
    pub anchor: VerticalAnchor,
    /// Frames wait for this layer's source to be ready.
    pub required: bool,
}

impl LayerSpec {
    /// Required raw layer with default fit and anchor.
    pub fn raw(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Raw,
            fit: FitPolicy::default(),
            anchor: VerticalAnchor::default(),
            required: true,
        }
    }

    /// Required keyed layer with default fit and anchor.
    pub fn keyed(name: impl Into<String>) -> Self {
        Self {
            kind: LayerKind::Keyed,
            ..Self::raw(name)
        }
    }

    /// Override the fit policy.
    pub fn with_fit(mut self, fit: FitPolicy) -> Self {
        self.fit = fit;
        self
    }

    /// Override the vertical anchor.
    pub fn with_anchor(mut self, anchor: VerticalAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    /// Set whether frames wait on this layer.
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

/// Check a draw order: unique non-empty names, at most one keyed layer, and it comes last.
pub fn validate_layers(layers: &[LayerSpec]) -> CompositeResult<()> {
    let mut seen = std::collections::HashSet::new();
    for l in layers {
        if l.name.trim().is_empty() {
            return Err(CompositeError::validation("layer name must be non-empty"));
        }
        if !seen.insert(l.name.as_str()) {
            return Err(CompositeError::validation(format!(
                "duplicate layer name '{}'",
                l.name
            )));
        }
    }
    let keyed = layers
        .iter()
        .enumerate()
        .filter(|(_, l)| l.kind == LayerKind::Keyed)
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    match keyed.as_slice() {
        [] => Ok(()),
        [i] if *i + 1 == layers.len() => Ok(()),
        [i] => Err(CompositeError::validation(format!(
            "keyed layer '{}' must be drawn last",
            layers[*i].name
        ))),
        _ => Err(CompositeError::validation(
            "at most one keyed layer is supported",
        )),
    }
}

/// Soft fade at the keyed layer's bottom edge, hiding the seam with the layer below.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeamBlend {
    /// Turn the fade on or off.
    pub enabled: bool,
    /// Height of the fade band in canvas pixels.
    pub height_px: f64,
}

impl Default for SeamBlend {
    fn default() -> Self {
        Self {
            enabled: true,
            height_px: 20.0,
        }
    }
}

impl SeamBlend {
    /// Band height when active.
    pub(crate) fn active_height(&self) -> Option<f64> {
        (self.enabled && self.height_px.is_finite() && self.height_px > 0.0)
            .then_some(self.height_px)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/composite/layer.rs"]
mod tests;
