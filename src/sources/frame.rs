use std::time::Duration;

use crate::foundation::error::{CompositeError, CompositeResult};
use crate::sources::sequence::PlaybackControl;

/// An owned RGBA8 frame, tightly packed, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRgba {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRgba {
    /// Wrap straight-alpha pixels, checking the byte count.
    pub fn from_straight(width: u32, height: u32, data: Vec<u8>) -> CompositeResult<Self> {
        check_len(width, height, data.len())?;
        Ok(Self {
            width,
            height,
            data,
            premultiplied: false,
        })
    }

    /// A frame filled with one straight-alpha color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let n = (width as usize) * (height as usize);
        Self {
            width,
            height,
            data: rgba.repeat(n),
            premultiplied: false,
        }
    }

    /// Borrow as a [`FrameView`].
    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            width: self.width,
            height: self.height,
            data: &self.data,
            premultiplied: self.premultiplied,
        }
    }
}

/// Borrowed pixels of a source's current frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameView<'a> {
    /// Presentation width in pixels.
    pub width: u32,
    /// Presentation height in pixels.
    pub height: u32,
    /// RGBA8 bytes, `width * height * 4` long.
    pub data: &'a [u8],
    /// Whether `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl<'a> FrameView<'a> {
    /// Build a view, checking the byte count against the dimensions.
    pub fn new(width: u32, height: u32, data: &'a [u8], premultiplied: bool) -> CompositeResult<Self> {
        check_len(width, height, data.len())?;
        Ok(Self {
            width,
            height,
            data,
            premultiplied,
        })
    }

    /// True when there is at least one pixel to draw.
    pub fn is_drawable(&self) -> bool {
        self.width > 0 && self.height > 0 && !self.data.is_empty()
    }
}

pub(crate) fn check_len(width: u32, height: u32, len: usize) -> CompositeResult<()> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| CompositeError::source("frame size overflow"))?;
    if len != expected {
        return Err(CompositeError::source(format!(
            "frame {width}x{height} expects {expected} bytes, got {len}"
        )));
    }
    Ok(())
}

/// Anything the compositor can pull pixels from: a decoding video, a live feed, a still image.
///
/// Sources report `(0, 0)` and no frame until they have decoded their first frame. The
/// compositor polls [`FrameSource::is_ready`] every tick instead of waiting for an event.
pub trait FrameSource {
    /// Current presentation size; `(0, 0)` before the first decoded frame.
    fn dimensions(&self) -> (u32, u32);

    /// Pixels of the frame that should be displayed now.
    fn current_frame(&self) -> Option<FrameView<'_>>;

    /// Whether at least one frame has been decoded.
    fn is_ready(&self) -> bool {
        let (w, h) = self.dimensions();
        w > 0 && h > 0 && self.current_frame().is_some()
    }

    /// Move the playhead forward by `dt`. Still sources ignore this.
    fn advance(&mut self, _dt: Duration) {}

    /// Play/pause handle for sources that follow the avatar's talking state.
    fn playback(&mut self) -> Option<&mut dyn PlaybackControl> {
        None
    }
}

impl FrameSource for FrameRgba {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn current_frame(&self) -> Option<FrameView<'_>> {
        let v = self.view();
        v.is_drawable().then_some(v)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sources/frame.rs"]
mod tests;
