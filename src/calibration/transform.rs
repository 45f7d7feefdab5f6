use serde::{Deserialize, Serialize};

use crate::foundation::core::Vec2;
use crate::foundation::error::{CompositeError, CompositeResult};

/// Placement of one layer relative to its fitted position on the canvas.
///
/// `offset` is in canvas pixels and unbounded. `scale` multiplies the fitted size.
/// `crop_top` and `crop_height` are fractions of the source height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerTransform {
    /// Displacement from the anchored position, in canvas pixels.
    pub offset: Vec2,
    /// Multiplier on the fitted size.
    pub scale: f64,
    /// First visible source row, as a fraction of source height.
    pub crop_top: f64,
    /// Visible source band height, as a fraction of source height.
    pub crop_height: f64,
}

impl Default for LayerTransform {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            scale: 1.0,
            crop_top: 0.0,
            crop_height: 1.0,
        }
    }
}

impl LayerTransform {
    /// Check that every field is finite and the crop band is well-formed.
    pub fn validate(&self) -> CompositeResult<()> {
        let fields = [
            ("offset.x", self.offset.x),
            ("offset.y", self.offset.y),
            ("scale", self.scale),
            ("crop_top", self.crop_top),
            ("crop_height", self.crop_height),
        ];
        for (name, v) in fields {
            if !v.is_finite() {
                return Err(CompositeError::validation(format!(
                    "transform {name} must be finite"
                )));
            }
        }
        if self.scale <= 0.0 {
            return Err(CompositeError::validation("transform scale must be > 0"));
        }
        if !(0.0..1.0).contains(&self.crop_top) {
            return Err(CompositeError::validation(
                "transform crop_top must be in [0, 1)",
            ));
        }
        if self.crop_height <= 0.0 || self.crop_top + self.crop_height > 1.0 + f64::EPSILON {
            return Err(CompositeError::validation(
                "transform crop_height must be > 0 and crop_top + crop_height <= 1",
            ));
        }
        Ok(())
    }

    /// Crop band `(top, height)` clamped into the source so that `top + height <= 1`.
    pub fn crop_fractions(&self) -> (f64, f64) {
        let top = if self.crop_top.is_finite() {
            self.crop_top.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let height = if self.crop_height.is_finite() {
            self.crop_height.clamp(0.0, 1.0 - top)
        } else {
            1.0 - top
        };
        (top, height)
    }

    /// Apply `delta` and re-clamp the scale into `bounds`.
    pub fn apply(&mut self, delta: TransformDelta, bounds: ScaleBounds) {
        if delta.offset.x.is_finite() && delta.offset.y.is_finite() {
            self.offset += delta.offset;
        }
        if delta.scale.is_finite() {
            self.scale += delta.scale;
        }
        self.scale = bounds.clamp(self.scale);
    }
}

/// Inclusive range a layer's scale is kept in.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaleBounds {
    /// Smallest allowed scale, `> 0`.
    pub min: f64,
    /// Largest allowed scale, `>= min`.
    pub max: f64,
}

impl Default for ScaleBounds {
    fn default() -> Self {
        Self { min: 0.2, max: 3.0 }
    }
}

impl ScaleBounds {
    /// Build validated bounds.
    pub fn new(min: f64, max: f64) -> CompositeResult<Self> {
        let b = Self { min, max };
        b.validate()?;
        Ok(b)
    }

    /// Require `0 < min <= max`, both finite.
    pub fn validate(&self) -> CompositeResult<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(CompositeError::validation("scale bounds must be finite"));
        }
        if self.min <= 0.0 || self.min > self.max {
            return Err(CompositeError::validation(format!(
                "scale bounds must satisfy 0 < min <= max, got [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }

    /// Clamp `scale` into the range. Non-finite input maps to `min`.
    pub fn clamp(&self, scale: f64) -> f64 {
        if scale.is_nan() {
            return self.min;
        }
        scale.clamp(self.min, self.max)
    }
}

/// Relative change requested by a gesture.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TransformDelta {
    /// Offset change in canvas pixels.
    pub offset: Vec2,
    /// Additive scale change.
    pub scale: f64,
}

impl TransformDelta {
    /// Pure translation.
    pub fn offset(dx: f64, dy: f64) -> Self {
        Self {
            offset: Vec2::new(dx, dy),
            scale: 0.0,
        }
    }

    /// Pure scale change.
    pub fn scale(ds: f64) -> Self {
        Self {
            offset: Vec2::ZERO,
            scale: ds,
        }
    }
}

/// Per-layer defaults, taken from the scene.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerDefaults {
    /// Transform used before calibration loads and for missing fields.
    pub transform: LayerTransform,
    /// Allowed scale range.
    pub scale_bounds: ScaleBounds,
}

impl LayerDefaults {
    /// Validate both parts and check that the default scale sits inside the bounds.
    pub fn validate(&self) -> CompositeResult<()> {
        self.scale_bounds.validate()?;
        self.transform.validate()?;
        if self.scale_bounds.clamp(self.transform.scale) != self.transform.scale {
            return Err(CompositeError::validation(format!(
                "default scale {} is outside [{}, {}]",
                self.transform.scale, self.scale_bounds.min, self.scale_bounds.max
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/calibration/transform.rs"]
mod tests;
