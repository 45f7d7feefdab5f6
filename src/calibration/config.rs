use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::calibration::transform::{LayerDefaults, LayerTransform};
use crate::foundation::core::Vec2;
use crate::foundation::error::{CompositeError, CompositeResult};

/// Snapshot of every layer's transform, in the persistence format:
///
/// ```json
/// { "legs": { "offset": { "x": 0, "y": 12 }, "scale": 1.1, "cropTop": 0, "cropHeight": 1 } }
/// ```
///
/// Deserialization is lenient: any missing field takes the [`LayerTransform`] default.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalibrationConfig {
    /// Transforms keyed by layer name.
    pub layers: BTreeMap<String, LayerTransform>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireOut {
    offset: WireOffset,
    scale: f64,
    crop_top: f64,
    crop_height: f64,
}

#[derive(Serialize)]
struct WireOffset {
    x: f64,
    y: f64,
}

impl Serialize for CalibrationConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.layers.len()))?;
        for (name, t) in &self.layers {
            map.serialize_entry(
                name,
                &WireOut {
                    offset: WireOffset {
                        x: t.offset.x,
                        y: t.offset.y,
                    },
                    scale: t.scale,
                    crop_top: t.crop_top,
                    crop_height: t.crop_height,
                },
            )?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CalibrationConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
        let mut layers = BTreeMap::new();
        for (name, v) in raw {
            if v.is_object() {
                layers.insert(name, parse_layer(&v, LayerTransform::default()));
            }
        }
        Ok(Self { layers })
    }
}

impl CalibrationConfig {
    /// Build the full transform set for `defaults` from an arbitrary JSON blob.
    ///
    /// Never fails: every absent, non-numeric or non-finite field takes the layer default, and
    /// layers the scene does not know are ignored. Flat legacy keys (`"<layer>Offset"`,
    /// `"<layer>Scale"`) are honored when the nested entry does not set the same field. Loaded
    /// scales are clamped into each layer's bounds.
    ///
    /// Returns the config and the number of layers that had any stored entry.
    pub fn from_value_lenient(
        value: &Value,
        defaults: &BTreeMap<String, LayerDefaults>,
    ) -> (Self, usize) {
        let obj = value.as_object();
        let mut layers = BTreeMap::new();
        let mut found = 0;
        for (name, d) in defaults {
            let mut t = d.transform;
            let mut seen = false;

            if let Some(obj) = obj {
                if let Some(v) = obj.get(&format!("{name}Offset"))
                    && let Some(off) = parse_offset(v, t.offset)
                {
                    t.offset = off;
                    seen = true;
                }
                if let Some(s) = obj.get(&format!("{name}Scale")).and_then(finite_f64) {
                    t.scale = s;
                    seen = true;
                }
                if let Some(entry) = obj.get(name.as_str()) {
                    if entry.is_object() {
                        t = parse_layer(entry, t);
                        seen = true;
                    } else {
                        tracing::warn!(layer = %name, "calibration entry is not an object, using defaults");
                    }
                }
            }

            t.scale = d.scale_bounds.clamp(t.scale);
            if !crop_in_range(&t) {
                let (top, height) = t.crop_fractions();
                if height > 0.0 && top < 1.0 {
                    t.crop_top = top;
                    t.crop_height = height;
                } else {
                    t.crop_top = d.transform.crop_top;
                    t.crop_height = d.transform.crop_height;
                }
            }

            if seen {
                found += 1;
            }
            layers.insert(name.clone(), t);
        }
        (Self { layers }, found)
    }

    /// Encode as the persistence JSON object.
    pub fn to_value(&self) -> CompositeResult<Value> {
        serde_json::to_value(self).map_err(|e| CompositeError::serde(e.to_string()))
    }
}

fn crop_in_range(t: &LayerTransform) -> bool {
    (0.0..1.0).contains(&t.crop_top)
        && t.crop_height > 0.0
        && t.crop_top + t.crop_height <= 1.0 + 1e-9
}

fn finite_f64(v: &Value) -> Option<f64> {
    v.as_f64().filter(|x| x.is_finite())
}

fn field<'a>(obj: &'a serde_json::Map<String, Value>, camel: &str, snake: &str) -> Option<&'a Value> {
    obj.get(camel).or_else(|| obj.get(snake))
}

fn parse_offset(v: &Value, fallback: Vec2) -> Option<Vec2> {
    let o = v.as_object()?;
    let x = o.get("x").and_then(finite_f64);
    let y = o.get("y").and_then(finite_f64);
    if x.is_none() && y.is_none() {
        return None;
    }
    Some(Vec2::new(x.unwrap_or(fallback.x), y.unwrap_or(fallback.y)))
}

fn parse_layer(v: &Value, base: LayerTransform) -> LayerTransform {
    let Some(o) = v.as_object() else {
        return base;
    };
    let mut t = base;
    if let Some(off) = o.get("offset").and_then(|v| parse_offset(v, base.offset)) {
        t.offset = off;
    }
    if let Some(s) = o.get("scale").and_then(finite_f64) {
        t.scale = s;
    }
    if let Some(c) = field(o, "cropTop", "crop_top").and_then(finite_f64) {
        t.crop_top = c;
    }
    if let Some(c) = field(o, "cropHeight", "crop_height").and_then(finite_f64) {
        t.crop_height = c;
    }
    t
}

/// External persistence for calibration.
pub trait CalibrationBackend: Send + Sync {
    /// Fetch the stored blob. `Ok(None)` means nothing has been saved yet.
    fn load(&self) -> CompositeResult<Option<Value>>;
    /// Persist a full snapshot.
    fn save(&self, config: &CalibrationConfig) -> CompositeResult<()>;
}

/// Stores calibration as a pretty-printed JSON file.
#[derive(Clone, Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Backend reading and writing `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CalibrationBackend for JsonFileBackend {
    fn load(&self) -> CompositeResult<Option<Value>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("read calibration '{}'", self.path.display()))?;
        let v = serde_json::from_slice(&bytes).map_err(|e| {
            CompositeError::config(format!(
                "calibration '{}' is not valid JSON: {e}",
                self.path.display()
            ))
        })?;
        Ok(Some(v))
    }

    fn save(&self, config: &CalibrationConfig) -> CompositeResult<()> {
        let mut json = serde_json::to_string_pretty(config)
            .map_err(|e| CompositeError::serde(e.to_string()))?;
        json.push('\n');

        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create calibration dir '{}'", dir.display()))?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json)
            .with_context(|| format!("write calibration '{}'", tmp.display()))?;
        std::fs::rename(&tmp, &self.path).with_context(|| {
            format!("replace calibration '{}'", self.path.display())
        })?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    stored: Option<Value>,
    fail_loads: bool,
    fail_saves: bool,
    saves: u64,
}

/// In-process backend; clones share the same storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `value`.
    pub fn with_value(value: Value) -> Self {
        let b = Self::default();
        b.lock().stored = Some(value);
        b
    }

    /// Make subsequent loads fail, as an unreachable endpoint would.
    pub fn set_fail_loads(&self, fail: bool) {
        self.lock().fail_loads = fail;
    }

    /// Make subsequent saves fail.
    pub fn set_fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    /// Last saved blob.
    pub fn stored(&self) -> Option<Value> {
        self.lock().stored.clone()
    }

    /// Number of successful saves.
    pub fn saves(&self) -> u64 {
        self.lock().saves
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CalibrationBackend for MemoryBackend {
    fn load(&self) -> CompositeResult<Option<Value>> {
        let st = self.lock();
        if st.fail_loads {
            return Err(CompositeError::config("calibration endpoint unavailable"));
        }
        Ok(st.stored.clone())
    }

    fn save(&self, config: &CalibrationConfig) -> CompositeResult<()> {
        let mut st = self.lock();
        if st.fail_saves {
            return Err(CompositeError::config("calibration endpoint rejected save"));
        }
        st.stored = Some(config.to_value()?);
        st.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/calibration/config.rs"]
mod tests;
