use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::calibration::store::CalibrationStore;
use crate::composite::compositor::{CompositeFrame, LayerCompositor, RenderOutcome, RenderReport};
use crate::foundation::core::{Canvas, FrameIndex};
use crate::foundation::error::{CompositeError, CompositeResult};
use crate::runtime::scheduler::{FrameScheduler, IntervalScheduler, TickHandle};
use crate::runtime::sink::{FrameSink, SinkConfig};
use crate::sources::registry::SourceRegistry;
use crate::sources::talking::TalkingEvents;

/// Lifecycle of a [`RenderLoop`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopState {
    /// Not scheduled.
    #[default]
    Idle,
    /// Scheduled, but a required source has not produced a frame yet.
    WaitingForReady,
    /// Producing a composited frame every tick.
    Rendering,
}

/// How the canvas follows its container: width from the container, height from the aspect.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSizing {
    /// Width used before any container size is known.
    pub default_width: u32,
    /// Height divided by width.
    pub aspect: f64,
    /// Largest canvas accepted, in pixels; bigger containers are rejected.
    pub max_pixels: u64,
}

/// 4096 x 4096.
pub const DEFAULT_MAX_CANVAS_PIXELS: u64 = 1 << 24;

impl Default for CanvasSizing {
    fn default() -> Self {
        Self {
            default_width: 480,
            aspect: 1.5,
            max_pixels: DEFAULT_MAX_CANVAS_PIXELS,
        }
    }
}

impl CanvasSizing {
    /// Require a non-zero default width and a finite positive aspect.
    pub fn validate(&self) -> CompositeResult<()> {
        if self.default_width == 0 {
            return Err(CompositeError::validation(
                "canvas default_width must be > 0",
            ));
        }
        if !self.aspect.is_finite() || self.aspect <= 0.0 {
            return Err(CompositeError::validation(
                "canvas aspect must be finite and > 0",
            ));
        }
        if self.max_pixels == 0 {
            return Err(CompositeError::validation("canvas max_pixels must be > 0"));
        }
        Ok(())
    }

    /// Canvas for a container `width`; zero or unknown falls back to `default_width`.
    ///
    /// Fails when the canvas would exceed `max_pixels`.
    pub fn canvas_for(&self, width: Option<u32>) -> CompositeResult<Canvas> {
        self.validate()?;
        let w = width.filter(|w| *w > 0).unwrap_or(self.default_width);
        let h = (f64::from(w) * self.aspect).round().max(1.0);
        let pixels = f64::from(w) * h;
        if pixels > self.max_pixels as f64 {
            return Err(CompositeError::validation(format!(
                "canvas {w}x{h} exceeds the {} pixel limit",
                self.max_pixels
            )));
        }
        Canvas::new(w, h as u32)
    }
}

/// Counters kept across the loop's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Ticks that ran.
    pub ticks: u64,
    /// Ticks that produced a frame.
    pub frames_drawn: u64,
    /// Ticks skipped because a required source was not ready.
    pub frames_skipped: u64,
    /// Failures caught inside a tick (sink errors, bad resizes).
    pub errors: u64,
    /// Callbacks ignored because their handle was no longer current.
    pub stale_ticks: u64,
}

/// What one [`RenderLoop::tick`] did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The handle was not the loop's outstanding tick; nothing happened.
    Stale,
    /// Required sources were not ready.
    Waiting {
        /// Layers still waiting.
        waiting_on: Vec<String>,
    },
    /// A frame was composited.
    Drawn(RenderReport),
}

/// Drives keying and compositing once per display refresh.
///
/// At most one tick is outstanding at any time: `start` while running is a no-op, `stop`
/// cancels the pending request, and every tick schedules exactly one successor.
pub struct RenderLoop<S: FrameScheduler> {
    compositor: LayerCompositor,
    sources: SourceRegistry,
    calibration: Arc<CalibrationStore>,
    scheduler: S,
    sizing: CanvasSizing,
    canvas: Canvas,
    pending_resize: Option<u32>,
    state: LoopState,
    pending: Option<TickHandle>,
    last_tick: Option<Instant>,
    talking: Option<TalkingEvents>,
    sink: Option<Box<dyn FrameSink>>,
    sink_started: bool,
    nominal_fps: Option<f64>,
    next_frame: u64,
    stats: LoopStats,
}

impl<S: FrameScheduler> std::fmt::Debug for RenderLoop<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("state", &self.state)
            .field("canvas", &self.canvas)
            .field("pending", &self.pending)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<S: FrameScheduler> RenderLoop<S> {
    /// Assemble a loop; the canvas starts at the sizing's default width.
    pub fn new(
        compositor: LayerCompositor,
        sources: SourceRegistry,
        calibration: Arc<CalibrationStore>,
        scheduler: S,
        sizing: CanvasSizing,
    ) -> CompositeResult<Self> {
        let canvas = sizing.canvas_for(None)?;
        Ok(Self {
            compositor,
            sources,
            calibration,
            scheduler,
            sizing,
            canvas,
            pending_resize: None,
            state: LoopState::Idle,
            pending: None,
            last_tick: None,
            talking: None,
            sink: None,
            sink_started: false,
            nominal_fps: None,
            next_frame: 0,
            stats: LoopStats::default(),
        })
    }

    /// Forward composited frames to `sink`.
    pub fn set_sink(&mut self, sink: Box<dyn FrameSink>) {
        self.sink = Some(sink);
        self.sink_started = false;
    }

    /// Record the nominal rate reported to the sink.
    pub fn set_nominal_fps(&mut self, fps: Option<f64>) {
        self.nominal_fps = fps;
    }

    /// Listen for avatar talking signals; drained once per tick.
    pub fn attach_talking(&mut self, events: TalkingEvents) {
        self.talking = Some(events);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Counters.
    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Canvas used by the last (or next) composite.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Last composited frame.
    pub fn frame(&self) -> &CompositeFrame {
        self.compositor.frame()
    }

    /// The compositor.
    pub fn compositor(&self) -> &LayerCompositor {
        &self.compositor
    }

    /// Shared calibration.
    pub fn calibration(&self) -> &Arc<CalibrationStore> {
        &self.calibration
    }

    /// Sources, e.g. to push frames into a live feed between ticks.
    pub fn sources_mut(&mut self) -> &mut SourceRegistry {
        &mut self.sources
    }

    /// The scheduler, for hosts that fire ticks themselves.
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Mutable scheduler access.
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Handle of the outstanding tick, if any.
    pub fn pending_tick(&self) -> Option<TickHandle> {
        self.pending
    }

    /// Begin ticking. Calling it while already scheduled does nothing.
    pub fn start(&mut self) {
        if self.pending.is_some() {
            tracing::debug!("render loop already scheduled");
            return;
        }
        if self.state == LoopState::Idle {
            self.state = LoopState::WaitingForReady;
            tracing::info!("render loop started");
        }
        self.pending = Some(self.scheduler.request_frame());
    }

    /// Cancel the outstanding tick and go idle. Idempotent.
    pub fn stop(&mut self) {
        if let Some(h) = self.pending.take() {
            self.scheduler.cancel_frame(h);
        }
        if self.state != LoopState::Idle {
            tracing::info!("render loop stopped");
        }
        self.state = LoopState::Idle;
        self.last_tick = None;
    }

    /// Stop, flush the sink, and release sources and listeners.
    pub fn unmount(&mut self) {
        self.stop();
        if let Some(sink) = self.sink.as_mut()
            && self.sink_started
            && let Err(e) = sink.end()
        {
            tracing::warn!(error = %e, "frame sink failed to finish");
            self.stats.errors += 1;
        }
        self.sink = None;
        self.sink_started = false;
        self.sources.clear();
        self.talking = None;
    }

    /// Record a new container width; applied on the next tick without restarting.
    pub fn resize(&mut self, container_width: u32) {
        self.pending_resize = Some(container_width);
    }

    /// Run one tick. `now` is the host's frame timestamp.
    pub fn tick(&mut self, handle: TickHandle, now: Instant) -> TickOutcome {
        if self.pending != Some(handle) {
            self.stats.stale_ticks += 1;
            tracing::debug!(?handle, "ignoring stale tick");
            return TickOutcome::Stale;
        }
        self.pending = None;
        self.stats.ticks += 1;

        let dt = self
            .last_tick
            .map_or(Duration::ZERO, |prev| now.saturating_duration_since(prev));
        self.last_tick = Some(now);

        if let Some(ev) = self.talking.as_ref().and_then(TalkingEvents::drain_latest) {
            let touched = self.sources.apply_talking(ev);
            tracing::debug!(?ev, touched, "talking state changed");
        }

        if let Some(w) = self.pending_resize.take() {
            match self.sizing.canvas_for(Some(w)) {
                Ok(c) => self.canvas = c,
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring resize");
                    self.stats.errors += 1;
                }
            }
        }

        self.sources.advance_all(dt);
        let snapshot = self.calibration.snapshot();
        let outcome = match self.compositor.render(self.canvas, &self.sources, &snapshot) {
            RenderOutcome::Skipped { waiting_on } => {
                if self.state == LoopState::Rendering {
                    tracing::info!(?waiting_on, "source dropped out, waiting for ready");
                }
                self.state = LoopState::WaitingForReady;
                self.stats.frames_skipped += 1;
                TickOutcome::Waiting { waiting_on }
            }
            RenderOutcome::Drawn(report) => {
                if self.state != LoopState::Rendering {
                    tracing::info!(canvas = ?self.canvas, "all required sources ready, rendering");
                }
                self.state = LoopState::Rendering;
                self.stats.frames_drawn += 1;
                self.push_to_sink();
                TickOutcome::Drawn(report)
            }
        };

        self.pending = Some(self.scheduler.request_frame());
        outcome
    }

    fn push_to_sink(&mut self) {
        let idx = FrameIndex(self.next_frame);
        self.next_frame += 1;
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let frame = self.compositor.frame();
        if !self.sink_started {
            let cfg = SinkConfig {
                width: frame.width(),
                height: frame.height(),
                fps: self.nominal_fps,
            };
            if let Err(e) = sink.begin(cfg) {
                tracing::warn!(error = %e, "frame sink failed to start");
                self.stats.errors += 1;
                return;
            }
            self.sink_started = true;
        }
        if let Err(e) = sink.push_frame(idx, frame) {
            tracing::warn!(error = %e, frame = idx.0, "frame sink rejected frame");
            self.stats.errors += 1;
        }
    }
}

impl RenderLoop<IntervalScheduler> {
    /// Tick on the interval scheduler until `done` returns true or the loop is stopped.
    pub fn run_until(&mut self, mut done: impl FnMut(&LoopStats) -> bool) {
        self.start();
        while !done(&self.stats) {
            let Some((handle, now)) = self.scheduler.wait_next() else {
                break;
            };
            self.tick(handle, now);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/render_loop.rs"]
mod tests;
