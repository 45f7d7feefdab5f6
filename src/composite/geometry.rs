use serde::{Deserialize, Serialize};

use crate::calibration::transform::LayerTransform;
use crate::foundation::core::{Canvas, Rect, Size};

/// Crops thinner than this many source rows are not drawn.
const MIN_CROP_ROWS: f64 = 1.0;

/// How a layer's cropped source is fitted into the canvas before the transform scale applies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitPolicy {
    /// Largest size that fits entirely inside the canvas.
    #[default]
    Contain,
    /// Smallest size that covers the whole canvas.
    Cover,
    /// Match the canvas width.
    FillWidth,
    /// Match the canvas height.
    FillHeight,
}

/// Where the fitted layer sits vertically before its offset applies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAnchor {
    /// Top edge on the canvas top.
    Top,
    /// Centered.
    #[default]
    Center,
    /// Bottom edge on the canvas bottom.
    Bottom,
}

/// Resolved placement of one layer for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerGeometry {
    /// Visible band of the source, in source pixels.
    pub src: Rect,
    /// Destination rectangle on the canvas, in canvas pixels. May extend past the canvas.
    pub dst: Rect,
}

/// Compute where a layer lands on the canvas.
///
/// The crop band is taken from the source first; the band is then fitted into the canvas with
/// its aspect ratio preserved, multiplied by `transform.scale`, centered horizontally, anchored
/// vertically, and finally displaced by `transform.offset`.
///
/// Returns `None` when any size involved is non-positive or non-finite, so callers never draw a
/// degenerate rectangle.
pub fn layer_rect(
    canvas: Canvas,
    source: Size,
    transform: &LayerTransform,
    fit: FitPolicy,
    anchor: VerticalAnchor,
) -> Option<LayerGeometry> {
    let (sw, sh) = (source.width, source.height);
    if !(sw.is_finite() && sh.is_finite()) || sw <= 0.0 || sh <= 0.0 {
        return None;
    }
    let (cw, ch) = (f64::from(canvas.width), f64::from(canvas.height));
    if cw <= 0.0 || ch <= 0.0 {
        return None;
    }

    let (top, band) = transform.crop_fractions();
    let crop_y0 = top * sh;
    let crop_h = band * sh;
    if crop_h < MIN_CROP_ROWS.min(sh) {
        return None;
    }
    let src = Rect::new(0.0, crop_y0, sw, crop_y0 + crop_h);

    let fit_scale = match fit {
        FitPolicy::Contain => (cw / sw).min(ch / crop_h),
        FitPolicy::Cover => (cw / sw).max(ch / crop_h),
        FitPolicy::FillWidth => cw / sw,
        FitPolicy::FillHeight => ch / crop_h,
    };
    let scale = fit_scale * transform.scale;
    let w = sw * scale;
    let h = crop_h * scale;
    if !(w.is_finite() && h.is_finite()) || w <= 0.0 || h <= 0.0 {
        return None;
    }

    let x = (cw - w) / 2.0 + transform.offset.x;
    let y = match anchor {
        VerticalAnchor::Top => 0.0,
        VerticalAnchor::Center => (ch - h) / 2.0,
        VerticalAnchor::Bottom => ch - h,
    } + transform.offset.y;
    if !(x.is_finite() && y.is_finite()) {
        return None;
    }

    Some(LayerGeometry {
        src,
        dst: Rect::new(x, y, x + w, y + h),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/composite/geometry.rs"]
mod tests;
