//! Layer compositing: geometry, blending and the per-frame compositor.

/// Premultiplied sampling and source-over drawing.
pub mod blend;
/// Per-frame layer compositor.
pub mod compositor;
/// Fit, anchor, and crop placement.
pub mod geometry;
/// Draw-order entries and seam options.
pub mod layer;

pub use blend::PremulRgba8;
pub use compositor::{
    CompositeFrame, CompositorOpts, LayerCompositor, RenderOutcome, RenderReport, SkipReason,
};
pub use geometry::{FitPolicy, LayerGeometry, VerticalAnchor, layer_rect};
pub use layer::{LayerKind, LayerSpec, SeamBlend, validate_layers};
