use crate::calibration::config::CalibrationConfig;
use crate::composite::blend::{draw_layer, fill};
use crate::composite::geometry::layer_rect;
use crate::composite::layer::{LayerKind, LayerSpec, SeamBlend, validate_layers};
use crate::foundation::core::{Canvas, Rgba8Premul, Size};
use crate::foundation::error::CompositeResult;
use crate::foundation::math::unpremultiply_rgba8_in_place;
use crate::keying::classify::ColorClassifier;
use crate::keying::keyer::{FrameKeyer, KeyerOpts};
use crate::sources::frame::{FrameRgba, FrameView};
use crate::sources::registry::SourceProvider;

/// Canvas-sized premultiplied RGBA8 output, reused across frames.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompositeFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl CompositeFrame {
    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Premultiplied RGBA8 bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// One premultiplied pixel, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Copy out as an owned premultiplied frame.
    pub fn to_frame_rgba(&self) -> FrameRgba {
        FrameRgba {
            width: self.width,
            height: self.height,
            data: self.data.clone(),
            premultiplied: true,
        }
    }

    /// Straight-alpha image for encoding.
    pub fn to_rgba_image(&self) -> Option<image::RgbaImage> {
        let mut straight = self.data.clone();
        unpremultiply_rgba8_in_place(&mut straight);
        image::RgbaImage::from_raw(self.width, self.height, straight)
    }

    fn resize(&mut self, canvas: Canvas) {
        if self.width != canvas.width || self.height != canvas.height {
            self.width = canvas.width;
            self.height = canvas.height;
            self.data.resize(canvas.rgba_len(), 0);
        }
    }
}

/// Why a layer was left out of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// No source is bound to the layer.
    Missing,
    /// The source has not decoded a frame yet.
    NotReady,
    /// The transform or source size leaves nothing to draw.
    Degenerate,
    /// The layer lies entirely outside the canvas.
    OffCanvas,
}

/// Per-frame summary.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Layers that produced pixels, in draw order.
    pub drawn: Vec<String>,
    /// Layers left out, with the reason.
    pub skipped: Vec<(String, SkipReason)>,
    /// Number of layer draws issued, background fill excluded.
    pub draw_calls: usize,
}

/// Result of one [`LayerCompositor::render`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The canvas holds a fresh frame.
    Drawn(RenderReport),
    /// Required sources are not ready; the canvas keeps its previous contents.
    Skipped {
        /// Names of the required layers still waiting.
        waiting_on: Vec<String>,
    },
}

impl RenderOutcome {
    /// True for [`RenderOutcome::Drawn`].
    pub fn is_drawn(&self) -> bool {
        matches!(self, Self::Drawn(_))
    }
}

/// Construction options for [`LayerCompositor`].
#[derive(Clone, Debug)]
pub struct CompositorOpts {
    /// Color every frame starts from.
    pub background: Rgba8Premul,
    /// Fade at the keyed layer's bottom edge.
    pub seam: SeamBlend,
    /// Threading for the keying pass.
    pub keyer: KeyerOpts,
}

impl Default for CompositorOpts {
    fn default() -> Self {
        Self {
            background: Rgba8Premul::white(),
            seam: SeamBlend::default(),
            keyer: KeyerOpts::default(),
        }
    }
}

/// Stacks the background, raw layers and the keyed layer onto one canvas.
#[derive(Debug)]
pub struct LayerCompositor {
    layers: Vec<LayerSpec>,
    background: Rgba8Premul,
    seam: SeamBlend,
    keyer: Option<FrameKeyer>,
    frame: CompositeFrame,
}

impl LayerCompositor {
    /// Build a compositor for `layers` in draw order.
    ///
    /// A keyer is only created when one of the layers is keyed.
    #[tracing::instrument(level = "debug", skip_all, fields(layers = layers.len()))]
    pub fn new(
        layers: Vec<LayerSpec>,
        classifier: ColorClassifier,
        opts: &CompositorOpts,
    ) -> CompositeResult<Self> {
        validate_layers(&layers)?;
        let keyer = if layers.iter().any(|l| l.kind == LayerKind::Keyed) {
            Some(FrameKeyer::with_opts(classifier, &opts.keyer)?)
        } else {
            None
        };
        Ok(Self {
            layers,
            background: opts.background,
            seam: opts.seam,
            keyer,
            frame: CompositeFrame::default(),
        })
    }

    /// Draw order.
    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    /// Last composited frame.
    pub fn frame(&self) -> &CompositeFrame {
        &self.frame
    }

    /// The keying stage, when a keyed layer exists.
    pub fn keyer(&self) -> Option<&FrameKeyer> {
        self.keyer.as_ref()
    }

    /// Required layers whose source is missing or not ready.
    pub fn waiting_on(&self, sources: &dyn SourceProvider) -> Vec<String> {
        self.layers
            .iter()
            .filter(|l| l.required)
            .filter(|l| !sources.source(&l.name).is_some_and(|s| s.is_ready()))
            .map(|l| l.name.clone())
            .collect()
    }

    /// Composite one frame.
    ///
    /// Never fails: a frame whose required sources are not ready is skipped as a whole, and an
    /// optional layer that cannot be drawn is left out of the report's `drawn` list.
    pub fn render(
        &mut self,
        canvas: Canvas,
        sources: &dyn SourceProvider,
        calibration: &CalibrationConfig,
    ) -> RenderOutcome {
        let waiting_on = self.waiting_on(sources);
        if !waiting_on.is_empty() {
            tracing::debug!(?waiting_on, "required sources not ready, skipping frame");
            return RenderOutcome::Skipped { waiting_on };
        }

        let Self {
            layers,
            background,
            seam,
            keyer,
            frame,
        } = self;

        frame.resize(canvas);
        fill(&mut frame.data, *background);

        let mut report = RenderReport::default();
        for layer in layers.iter() {
            let Some(source) = sources.source(&layer.name) else {
                report.skipped.push((layer.name.clone(), SkipReason::Missing));
                continue;
            };
            if !source.is_ready() {
                tracing::debug!(layer = %layer.name, "optional source not ready");
                report.skipped.push((layer.name.clone(), SkipReason::NotReady));
                continue;
            }

            let view: Option<FrameView<'_>> = match (layer.kind, keyer.as_mut()) {
                (LayerKind::Keyed, Some(k)) => k.key(source).map(|f| f.view()),
                _ => source.current_frame(),
            };
            let Some(view) = view.filter(|v| {
                v.is_drawable()
                    && v.data.len() == (v.width as usize) * (v.height as usize) * 4
            }) else {
                report.skipped.push((layer.name.clone(), SkipReason::NotReady));
                continue;
            };

            let transform = calibration
                .layers
                .get(&layer.name)
                .copied()
                .unwrap_or_default();
            let size = Size::new(f64::from(view.width), f64::from(view.height));
            let Some(geom) = layer_rect(canvas, size, &transform, layer.fit, layer.anchor) else {
                tracing::debug!(layer = %layer.name, "degenerate layer geometry");
                report
                    .skipped
                    .push((layer.name.clone(), SkipReason::Degenerate));
                continue;
            };

            let seam_px = match layer.kind {
                LayerKind::Keyed => seam.active_height(),
                LayerKind::Raw => None,
            };
            report.draw_calls += 1;
            if draw_layer(&mut frame.data, canvas, &view, &geom, seam_px) == 0 {
                report
                    .skipped
                    .push((layer.name.clone(), SkipReason::OffCanvas));
            } else {
                report.drawn.push(layer.name.clone());
            }
        }
        RenderOutcome::Drawn(report)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/composite/compositor.rs"]
mod tests;
