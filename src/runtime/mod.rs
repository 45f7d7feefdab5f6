//! Frame-cadence driving: schedulers, the render loop, and frame sinks.

/// Tick-driven render loop.
pub mod render_loop;
/// Frame scheduling primitives.
pub mod scheduler;
/// Frame sinks.
pub mod sink;

pub use render_loop::{
    CanvasSizing, DEFAULT_MAX_CANVAS_PIXELS, LoopState, LoopStats, RenderLoop, TickOutcome,
};
pub use scheduler::{FrameScheduler, IntervalScheduler, ManualScheduler, TickHandle};
pub use sink::{FrameSink, InMemorySink, PngSequenceSink, SinkConfig};
