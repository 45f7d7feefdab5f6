use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::calibration::config::{CalibrationBackend, CalibrationConfig};
use crate::calibration::transform::{LayerDefaults, LayerTransform, ScaleBounds, TransformDelta};
use crate::foundation::error::{CompositeError, CompositeResult};

/// What [`CalibrationStore::load`] ended up doing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A stored blob was found and applied.
    Loaded {
        /// Layers that had a stored entry; the rest kept their defaults.
        layers: usize,
    },
    /// Nothing usable was stored, or fetching it failed. Defaults are in effect.
    Defaulted {
        /// Why, when it was a failure rather than an empty store.
        reason: Option<String>,
    },
}

/// Per-layer transforms shared by the input controller and the compositor.
///
/// Every mutation goes through [`CalibrationStore::update`] (or `set`/`reset`), which
/// re-clamps the scale. Readers take a [`CalibrationStore::snapshot`] once per tick. Writes are
/// last-writer-wins.
#[derive(Debug)]
pub struct CalibrationStore {
    defaults: BTreeMap<String, LayerDefaults>,
    current: RwLock<BTreeMap<String, LayerTransform>>,
}

impl CalibrationStore {
    /// Store seeded with each layer's default transform.
    pub fn new(defaults: impl IntoIterator<Item = (String, LayerDefaults)>) -> Self {
        let defaults = defaults.into_iter().collect::<BTreeMap<_, _>>();
        let current = defaults
            .iter()
            .map(|(name, d)| {
                let mut t = d.transform;
                t.scale = d.scale_bounds.clamp(t.scale);
                (name.clone(), t)
            })
            .collect();
        Self {
            defaults,
            current: RwLock::new(current),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, LayerTransform>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, LayerTransform>> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the in-memory transforms with whatever `backend` holds.
    ///
    /// Never fails and never blocks rendering: a failed or empty fetch leaves every layer on its
    /// default.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn load(&self, backend: &dyn CalibrationBackend) -> LoadOutcome {
        let blob = match backend.load() {
            Ok(Some(v)) => v,
            Ok(None) => {
                tracing::info!("no stored calibration, using defaults");
                self.reset_all();
                return LoadOutcome::Defaulted { reason: None };
            }
            Err(e) => {
                tracing::warn!(error = %e, "calibration load failed, using defaults");
                self.reset_all();
                return LoadOutcome::Defaulted {
                    reason: Some(e.to_string()),
                };
            }
        };

        let (cfg, found) = CalibrationConfig::from_value_lenient(&blob, &self.defaults);
        *self.write() = cfg.layers;
        if found == 0 {
            tracing::info!("stored calibration has no known layers, using defaults");
            return LoadOutcome::Defaulted { reason: None };
        }
        tracing::info!(layers = found, "calibration loaded");
        LoadOutcome::Loaded { layers: found }
    }

    /// Hand the current transforms to `backend`. The in-memory state is kept either way.
    pub fn save(&self, backend: &dyn CalibrationBackend) -> CompositeResult<()> {
        let snap = self.snapshot();
        backend.save(&snap).inspect_err(|e| {
            tracing::warn!(error = %e, "calibration save failed");
        })?;
        tracing::info!(layers = snap.layers.len(), "calibration saved");
        Ok(())
    }

    /// Current transform of `layer`.
    pub fn get(&self, layer: &str) -> Option<LayerTransform> {
        self.read().get(layer).copied()
    }

    /// Scale bounds of `layer`.
    pub fn bounds(&self, layer: &str) -> Option<ScaleBounds> {
        self.defaults.get(layer).map(|d| d.scale_bounds)
    }

    /// Known layer names, in sorted order.
    pub fn layers(&self) -> impl Iterator<Item = &str> {
        self.defaults.keys().map(String::as_str)
    }

    /// Apply a relative change and return the resulting transform.
    pub fn update(&self, layer: &str, delta: TransformDelta) -> CompositeResult<LayerTransform> {
        let bounds = self.require_bounds(layer)?;
        let mut map = self.write();
        let t = map
            .get_mut(layer)
            .ok_or_else(|| unknown_layer(layer))?;
        t.apply(delta, bounds);
        Ok(*t)
    }

    /// Overwrite a layer's transform; the scale is clamped and the crop band kept in range.
    pub fn set(&self, layer: &str, mut transform: LayerTransform) -> CompositeResult<LayerTransform> {
        let bounds = self.require_bounds(layer)?;
        transform.validate()?;
        transform.scale = bounds.clamp(transform.scale);
        self.write().insert(layer.to_owned(), transform);
        Ok(transform)
    }

    /// Restore `layer` to its default transform.
    pub fn reset(&self, layer: &str) -> CompositeResult<LayerTransform> {
        let d = self
            .defaults
            .get(layer)
            .ok_or_else(|| unknown_layer(layer))?;
        let mut t = d.transform;
        t.scale = d.scale_bounds.clamp(t.scale);
        self.write().insert(layer.to_owned(), t);
        Ok(t)
    }

    /// Restore every layer to its default transform.
    pub fn reset_all(&self) {
        let fresh = Self::new(self.defaults.clone());
        let map = fresh.current.into_inner().unwrap_or_else(PoisonError::into_inner);
        *self.write() = map;
    }

    /// Read-only copy of all transforms, taken once per tick.
    pub fn snapshot(&self) -> CalibrationConfig {
        CalibrationConfig {
            layers: self.read().clone(),
        }
    }

    fn require_bounds(&self, layer: &str) -> CompositeResult<ScaleBounds> {
        self.bounds(layer).ok_or_else(|| unknown_layer(layer))
    }
}

fn unknown_layer(layer: &str) -> CompositeError {
    CompositeError::validation(format!("unknown calibration layer '{layer}'"))
}

#[cfg(test)]
#[path = "../../tests/unit/calibration/store.rs"]
mod tests;
