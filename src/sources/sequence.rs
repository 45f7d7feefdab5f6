use std::path::Path;
use std::time::Duration;

use anyhow::Context;

use crate::foundation::error::{CompositeError, CompositeResult};
use crate::foundation::math::premultiply_rgba8_in_place;
use crate::sources::frame::{FrameRgba, FrameSource, FrameView, check_len};

/// File extensions picked up by [`FrameSequence::from_dir`].
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// Play/pause control for sources that follow the avatar's talking state.
pub trait PlaybackControl {
    /// Resume advancing the playhead.
    fn play(&mut self);
    /// Freeze on the current frame.
    fn pause(&mut self);
    /// Whether the playhead advances on [`FrameSource::advance`].
    fn is_playing(&self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Clip { looping: bool },
    Live,
}

/// In-memory frame source: a pre-recorded clip, or a live feed fed through `push_frame`.
///
/// A clip starts playing and loops by default. A live feed always shows the most recently
/// pushed frame and ignores the playhead.
#[derive(Clone, Debug)]
pub struct FrameSequence {
    frames: Vec<FrameRgba>,
    fps: f64,
    mode: Mode,
    playing: bool,
    elapsed_s: f64,
    current: usize,
}

impl FrameSequence {
    /// Empty looping clip at `fps`.
    pub fn clip(fps: f64) -> CompositeResult<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(CompositeError::validation(format!(
                "sequence fps must be finite and > 0, got {fps}"
            )));
        }
        Ok(Self {
            frames: Vec::new(),
            fps,
            mode: Mode::Clip { looping: true },
            playing: true,
            elapsed_s: 0.0,
            current: 0,
        })
    }

    /// Live feed: not ready until the first `push_frame`.
    pub fn live() -> Self {
        Self {
            frames: Vec::new(),
            fps: 1.0,
            mode: Mode::Live,
            playing: true,
            elapsed_s: 0.0,
            current: 0,
        }
    }

    /// Set whether a clip wraps around at its end. Ignored for live feeds.
    pub fn with_looping(mut self, looping: bool) -> Self {
        if let Mode::Clip { .. } = self.mode {
            self.mode = Mode::Clip { looping };
        }
        self
    }

    /// Load every image in `dir`, ordered by file name, as a looping clip.
    #[tracing::instrument(level = "debug")]
    pub fn from_dir(dir: &Path, fps: f64) -> CompositeResult<Self> {
        let mut paths = std::fs::read_dir(dir)
            .with_context(|| format!("read frame directory '{}'", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            })
            .collect::<Vec<_>>();
        paths.sort();

        let mut seq = Self::clip(fps)?;
        for path in &paths {
            let img = image::open(path)
                .with_context(|| format!("decode frame '{}'", path.display()))?
                .to_rgba8();
            let (width, height) = img.dimensions();
            let mut data = img.into_raw();
            premultiply_rgba8_in_place(&mut data);
            seq.push_frame(FrameRgba {
                width,
                height,
                data,
                premultiplied: true,
            })?;
        }
        tracing::debug!(frames = seq.len(), "loaded frame sequence");
        Ok(seq)
    }

    /// Append a frame to a clip, or replace the shown frame of a live feed.
    pub fn push_frame(&mut self, frame: FrameRgba) -> CompositeResult<()> {
        check_len(frame.width, frame.height, frame.data.len())?;
        match self.mode {
            Mode::Clip { .. } => self.frames.push(frame),
            Mode::Live => {
                self.frames.clear();
                self.frames.push(frame);
                self.current = 0;
            }
        }
        Ok(())
    }

    /// Number of buffered frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when no frame has been decoded or pushed yet.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Index of the frame currently shown.
    pub fn position(&self) -> usize {
        self.current
    }

    /// Clip frame rate.
    pub fn fps(&self) -> f64 {
        self.fps
    }
}

impl PlaybackControl for FrameSequence {
    fn play(&mut self) {
        if !self.playing {
            // A finished one-shot clip restarts from the top.
            if let Mode::Clip { looping: false } = self.mode
                && self.current + 1 >= self.frames.len()
            {
                self.elapsed_s = 0.0;
                self.current = 0;
            }
            self.playing = true;
        }
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

impl FrameSource for FrameSequence {
    fn dimensions(&self) -> (u32, u32) {
        self.frames
            .get(self.current)
            .map_or((0, 0), |f| (f.width, f.height))
    }

    fn current_frame(&self) -> Option<FrameView<'_>> {
        let view = self.frames.get(self.current)?.view();
        view.is_drawable().then_some(view)
    }

    fn advance(&mut self, dt: Duration) {
        let Mode::Clip { looping } = self.mode else {
            return;
        };
        if !self.playing || self.frames.is_empty() {
            return;
        }
        self.elapsed_s += dt.as_secs_f64();
        let idx = (self.elapsed_s * self.fps).floor() as usize;
        let len = self.frames.len();
        if looping {
            self.current = idx % len;
            // Keep elapsed bounded on long sessions.
            let period = len as f64 / self.fps;
            if self.elapsed_s >= period {
                self.elapsed_s %= period;
            }
        } else if idx >= len - 1 {
            self.current = len - 1;
            self.playing = false;
        } else {
            self.current = idx;
        }
    }

    fn playback(&mut self) -> Option<&mut dyn PlaybackControl> {
        Some(self)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sources/sequence.rs"]
mod tests;
