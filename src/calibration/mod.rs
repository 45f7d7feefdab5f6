//! Per-layer calibration: transforms, their persistence format, and the shared store.

/// Persistence format and backends.
pub mod config;
/// Shared per-layer transform store.
pub mod store;
/// Layer transforms, scale bounds, and deltas.
pub mod transform;

pub use config::{CalibrationBackend, CalibrationConfig, JsonFileBackend, MemoryBackend};
pub use store::{CalibrationStore, LoadOutcome};
pub use transform::{LayerDefaults, LayerTransform, ScaleBounds, TransformDelta};
