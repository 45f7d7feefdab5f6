//! Real-time layer compositing for full-body talking-avatar kiosks.
//!
//! A kiosk shows a live or rendered head on a chroma-key backdrop stacked on top of pre-recorded
//! lower-body footage. This crate keys the backdrop out of the head feed, places every layer on a
//! portrait canvas using per-layer calibration, and drives that once per display refresh:
//!
//! - Describe the layout as a [`SceneConfig`] and build a [`LayerCompositor`] from it
//! - Share a [`CalibrationStore`] between the [`InputController`] and the render loop
//! - Drive frames with a [`RenderLoop`] and hand them to a [`FrameSink`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub mod calibration;
pub mod composite;
pub mod input;
pub mod keying;
pub mod runtime;
pub mod scene;
pub mod sources;

pub use crate::foundation::color::ColorDef;
pub use crate::foundation::core::{Canvas, FrameIndex, Point, Rect, Rgba8Premul, Size, Vec2};
pub use crate::foundation::error::{CompositeError, CompositeResult};

pub use crate::calibration::{
    CalibrationBackend, CalibrationConfig, CalibrationStore, JsonFileBackend, LayerDefaults,
    LayerTransform, LoadOutcome, MemoryBackend, ScaleBounds, TransformDelta,
};
pub use crate::composite::{
    CompositeFrame, CompositorOpts, FitPolicy, LayerCompositor, LayerKind, LayerSpec,
    RenderOutcome, RenderReport, SeamBlend, VerticalAnchor, layer_rect,
};
pub use crate::input::{ControlButton, InputBindings, InputController, InputEvent, InputOutcome};
pub use crate::keying::{ColorClassifier, FrameKeyer, KeyColorSpec, KeyRule};
pub use crate::runtime::{
    CanvasSizing, FrameScheduler, FrameSink, InMemorySink, IntervalScheduler, LoopState,
    ManualScheduler, PngSequenceSink, RenderLoop, TickOutcome,
};
pub use crate::scene::{SceneConfig, SourceDef};
pub use crate::sources::{
    FrameRgba, FrameSequence, FrameSource, ImageAsset, SourceRegistry, TalkingSignal,
    talking_channel,
};
