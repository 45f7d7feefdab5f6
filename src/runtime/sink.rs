use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::composite::compositor::CompositeFrame;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{CompositeError, CompositeResult};
use crate::sources::frame::FrameRgba;

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SinkConfig {
    /// Canvas width when output started.
    pub width: u32,
    /// Canvas height when output started. Later frames may differ after a resize.
    pub height: u32,
    /// Nominal frames per second, when the scheduler has one.
    pub fps: Option<f64>,
}

/// Consumer of composited frames: a display surface, a recorder, a test probe.
///
/// Ordering contract: `push_frame` is called with strictly increasing [`FrameIndex`] values.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> CompositeResult<()>;
    /// Push one composited frame.
    fn push_frame(&mut self, idx: FrameIndex, frame: &CompositeFrame) -> CompositeResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> CompositeResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, FrameRgba)>,
    ended: bool,
}

impl InMemorySink {
    /// Create a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Captured frames, premultiplied.
    pub fn frames(&self) -> &[(FrameIndex, FrameRgba)] {
        &self.frames
    }

    /// Whether `end` was called.
    pub fn ended(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> CompositeResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &CompositeFrame) -> CompositeResult<()> {
        self.frames.push((idx, frame.to_frame_rgba()));
        Ok(())
    }

    fn end(&mut self) -> CompositeResult<()> {
        self.ended = true;
        Ok(())
    }
}

/// Writes each frame as `<prefix>_<index>.png` into a directory.
#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    prefix: String,
    written: u64,
    last: Option<PathBuf>,
}

impl PngSequenceSink {
    /// Sink writing into `dir` (created on `begin`).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: "frame".to_owned(),
            written: 0,
            last: None,
        }
    }

    /// Override the file-name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Frames written since `begin`.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Most recently written file.
    pub fn last_written(&self) -> Option<&Path> {
        self.last.as_deref()
    }
}

impl FrameSink for PngSequenceSink {
    fn begin(&mut self, cfg: SinkConfig) -> CompositeResult<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create output dir '{}'", self.dir.display()))?;
        self.written = 0;
        self.last = None;
        tracing::info!(
            dir = %self.dir.display(),
            width = cfg.width,
            height = cfg.height,
            "writing png sequence"
        );
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &CompositeFrame) -> CompositeResult<()> {
        let img = frame
            .to_rgba_image()
            .ok_or_else(|| CompositeError::render("frame buffer does not match its size"))?;
        let path = self.dir.join(format!("{}_{:06}.png", self.prefix, idx.0));
        img.save(&path)
            .with_context(|| format!("write frame '{}'", path.display()))?;
        self.written += 1;
        self.last = Some(path);
        Ok(())
    }

    fn end(&mut self) -> CompositeResult<()> {
        tracing::info!(frames = self.written, "png sequence complete");
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/sink.rs"]
mod tests;
