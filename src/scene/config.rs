use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::calibration::store::CalibrationStore;
use crate::calibration::transform::{LayerDefaults, LayerTransform, ScaleBounds};
use crate::composite::compositor::{CompositorOpts, LayerCompositor};
use crate::composite::geometry::{FitPolicy, VerticalAnchor};
use crate::composite::layer::{LayerKind, LayerSpec, SeamBlend, validate_layers};
use crate::foundation::color::ColorDef;
use crate::foundation::error::{CompositeError, CompositeResult};
use crate::keying::classify::{ColorClassifier, KeyRule};
use crate::keying::keyer::KeyerOpts;
use crate::runtime::render_loop::CanvasSizing;
use crate::sources::frame::FrameSource;
use crate::sources::registry::SourceRegistry;
use crate::sources::sequence::FrameSequence;
use crate::sources::still::ImageAsset;

/// Playback rate used for frame directories given without an explicit rate.
pub const DEFAULT_SEQUENCE_FPS: f64 = 25.0;

/// Where a layer's pixels come from when the scene is loaded from disk.
///
/// Relative paths resolve against the directory holding the scene file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceDef {
    /// A single still image.
    Image {
        /// Image file.
        path: PathBuf,
    },
    /// A directory of frames played as a clip.
    Sequence {
        /// Directory of numbered frames.
        dir: PathBuf,
        /// Playback rate.
        #[serde(default = "default_fps")]
        fps: f64,
        /// Wrap at the end.
        #[serde(default = "default_true")]
        looping: bool,
    },
}

fn default_fps() -> f64 {
    DEFAULT_SEQUENCE_FPS
}

fn default_true() -> bool {
    true
}

impl SourceDef {
    /// Pick `Image` or `Sequence` from what `path` points at.
    pub fn infer(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            Self::Sequence {
                dir: path,
                fps: DEFAULT_SEQUENCE_FPS,
                looping: true,
            }
        } else {
            Self::Image { path }
        }
    }

    /// Decode the source.
    pub fn load(&self, base_dir: &Path) -> CompositeResult<Box<dyn FrameSource>> {
        let src: Box<dyn FrameSource> = match self {
            Self::Image { path } => Box::new(ImageAsset::from_path(&base_dir.join(path))?),
            Self::Sequence { dir, fps, looping } => {
                let seq = FrameSequence::from_dir(&base_dir.join(dir), *fps)?;
                if seq.is_empty() {
                    return Err(CompositeError::source(format!(
                        "frame directory '{}' holds no images",
                        dir.display()
                    )));
                }
                Box::new(seq.with_looping(*looping))
            }
        };
        Ok(src)
    }
}

/// One layer of the scene, bottom to top.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneLayer {
    /// Layer name; also the calibration key.
    pub name: String,
    /// Raw or keyed.
    #[serde(default)]
    pub kind: LayerKind,
    /// How the source is fitted into the canvas.
    #[serde(default)]
    pub fit: FitPolicy,
    /// Vertical placement of the fitted rectangle.
    #[serde(default)]
    pub anchor: VerticalAnchor,
    /// Frames wait until this layer's source is ready.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Plays while the avatar talks and pauses when it stops.
    #[serde(default)]
    pub talking_sync: bool,
    /// Transform before any calibration is loaded.
    #[serde(default)]
    pub defaults: LayerTransform,
    /// Allowed scale range.
    #[serde(default)]
    pub scale_bounds: ScaleBounds,
    /// Pixel source, if the scene provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceDef>,
}

impl SceneLayer {
    /// Draw-order entry for the compositor.
    pub fn spec(&self) -> LayerSpec {
        LayerSpec {
            name: self.name.clone(),
            kind: self.kind,
            fit: self.fit,
            anchor: self.anchor,
            required: self.required,
        }
    }

    /// Calibration defaults for this layer.
    pub fn layer_defaults(&self) -> LayerDefaults {
        LayerDefaults {
            transform: self.defaults,
            scale_bounds: self.scale_bounds,
        }
    }
}

/// Keying pass threading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyingDef {
    /// Key rows in parallel.
    pub parallel: bool,
    /// Worker threads; `None` uses rayon's default.
    pub threads: Option<usize>,
}

/// Everything needed to assemble a compositor, its sources, and its calibration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Canvas fill under every layer.
    #[serde(default)]
    pub background: ColorDef,
    /// Backdrop classification rule for the keyed layer.
    #[serde(default)]
    pub key: KeyRule,
    /// Fade at the keyed layer's bottom edge.
    #[serde(default)]
    pub seam: SeamBlend,
    /// Canvas sizing policy.
    #[serde(default)]
    pub canvas: CanvasSizing,
    /// Keying pass threading.
    #[serde(default)]
    pub keying: KeyingDef,
    /// Layers, bottom to top.
    pub layers: Vec<SceneLayer>,
}

impl SceneConfig {
    /// Parse a scene from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> CompositeResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| CompositeError::validation(format!("parse scene JSON: {e}")))
    }

    /// Parse a scene from a JSON file on disk.
    #[tracing::instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_path(path: impl AsRef<Path>) -> CompositeResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            CompositeError::validation(format!("open scene JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Write the scene as pretty JSON.
    pub fn write_path(&self, path: impl AsRef<Path>) -> CompositeResult<()> {
        let path = path.as_ref();
        let mut json =
            serde_json::to_string_pretty(self).map_err(|e| CompositeError::serde(e.to_string()))?;
        json.push('\n');
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create scene dir '{}'", dir.display()))?;
        }
        std::fs::write(path, json).with_context(|| format!("write scene '{}'", path.display()))?;
        Ok(())
    }

    /// The kiosk layout: pre-recorded legs below, keyed live head on top.
    ///
    /// The head shows its source from 28% down, which drops the backdrop above the shoulders.
    pub fn default_scene() -> Self {
        Self {
            background: ColorDef::default(),
            key: KeyRule::default(),
            seam: SeamBlend::default(),
            canvas: CanvasSizing::default(),
            keying: KeyingDef::default(),
            layers: vec![
                SceneLayer {
                    name: "legs".to_owned(),
                    kind: LayerKind::Raw,
                    fit: FitPolicy::Contain,
                    anchor: VerticalAnchor::Bottom,
                    required: true,
                    talking_sync: true,
                    defaults: LayerTransform::default(),
                    scale_bounds: ScaleBounds { min: 0.5, max: 2.0 },
                    source: None,
                },
                SceneLayer {
                    name: "head".to_owned(),
                    kind: LayerKind::Keyed,
                    fit: FitPolicy::FillWidth,
                    anchor: VerticalAnchor::Top,
                    required: true,
                    talking_sync: false,
                    defaults: LayerTransform {
                        crop_top: 0.28,
                        crop_height: 0.72,
                        ..LayerTransform::default()
                    },
                    scale_bounds: ScaleBounds::default(),
                    source: None,
                },
            ],
        }
    }

    /// Check layer order, rule parameters, sizing, and per-layer defaults.
    pub fn validate(&self) -> CompositeResult<()> {
        if self.layers.is_empty() {
            return Err(CompositeError::validation("scene must declare at least one layer"));
        }
        validate_layers(&self.layer_specs())?;
        self.key.validate()?;
        self.canvas.validate()?;
        let c = self.background;
        if ![c.r, c.g, c.b, c.a].iter().all(|v| v.is_finite()) {
            return Err(CompositeError::validation("background color must be finite"));
        }
        if !self.seam.height_px.is_finite() || self.seam.height_px < 0.0 {
            return Err(CompositeError::validation(
                "seam height_px must be finite and >= 0",
            ));
        }
        if self.keying.threads == Some(0) {
            return Err(CompositeError::validation("keying threads must be > 0"));
        }
        for l in &self.layers {
            l.layer_defaults().validate().map_err(|e| {
                CompositeError::validation(format!("layer '{}': {e}", l.name))
            })?;
            if let Some(SourceDef::Sequence { fps, .. }) = &l.source
                && (!fps.is_finite() || *fps <= 0.0)
            {
                return Err(CompositeError::validation(format!(
                    "layer '{}': sequence fps must be finite and > 0",
                    l.name
                )));
            }
        }
        Ok(())
    }

    /// Look up a layer by name.
    pub fn layer(&self, name: &str) -> Option<&SceneLayer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Draw order for the compositor.
    pub fn layer_specs(&self) -> Vec<LayerSpec> {
        self.layers.iter().map(SceneLayer::spec).collect()
    }

    /// Compositor options derived from the scene.
    pub fn compositor_opts(&self) -> CompositorOpts {
        CompositorOpts {
            background: self.background.to_rgba8_premul(),
            seam: self.seam,
            keyer: KeyerOpts {
                parallel: self.keying.parallel,
                threads: self.keying.threads,
            },
        }
    }

    /// Validate, then build the compositor.
    #[tracing::instrument(level = "debug", skip_all, fields(layers = self.layers.len()))]
    pub fn build_compositor(&self) -> CompositeResult<LayerCompositor> {
        self.validate()?;
        LayerCompositor::new(
            self.layer_specs(),
            ColorClassifier::new(self.key),
            &self.compositor_opts(),
        )
    }

    /// Calibration store seeded with every layer's defaults.
    pub fn calibration_store(&self) -> CalibrationStore {
        CalibrationStore::new(
            self.layers
                .iter()
                .map(|l| (l.name.clone(), l.layer_defaults())),
        )
    }

    /// Load each layer's source. `overrides` replaces the scene's source for a layer.
    ///
    /// Layers with neither are left unbound; a required one keeps the loop waiting.
    pub fn build_sources(
        &self,
        base_dir: &Path,
        overrides: &BTreeMap<String, SourceDef>,
    ) -> CompositeResult<SourceRegistry> {
        for name in overrides.keys() {
            if self.layer(name).is_none() {
                return Err(CompositeError::validation(format!(
                    "source given for unknown layer '{name}'"
                )));
            }
        }

        let mut reg = SourceRegistry::new();
        for l in &self.layers {
            let Some(def) = overrides.get(&l.name).or(l.source.as_ref()) else {
                tracing::debug!(layer = %l.name, "layer has no source");
                continue;
            };
            let src = def
                .load(base_dir)
                .map_err(|e| CompositeError::source(format!("layer '{}': {e}", l.name)))?;
            if l.talking_sync {
                reg.insert_talking_synced(l.name.clone(), src);
            } else {
                reg.insert(l.name.clone(), src);
            }
        }
        Ok(reg)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/config.rs"]
mod tests;
