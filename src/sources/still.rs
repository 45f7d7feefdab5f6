use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::foundation::error::CompositeResult;
use crate::foundation::math::premultiply_rgba8_in_place;
use crate::sources::frame::{FrameSource, FrameView, check_len};

/// Decoded still image, stored premultiplied and shared cheaply.
///
/// An image is immutable once decoded. A zero-sized image is never ready.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageAsset {
    width: u32,
    height: u32,
    rgba8_premul: Arc<Vec<u8>>,
}

impl ImageAsset {
    /// Decode an encoded image (PNG, JPEG, ...) from memory.
    pub fn decode(bytes: &[u8]) -> CompositeResult<Self> {
        let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
        let rgba = dyn_img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_straight_rgba(width, height, rgba.into_raw())
    }

    /// Read and decode an image file.
    #[tracing::instrument(level = "debug")]
    pub fn from_path(path: &Path) -> CompositeResult<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
        let img = Self::decode(&bytes)?;
        tracing::debug!(width = img.width, height = img.height, "decoded image");
        Ok(img)
    }

    /// Wrap straight-alpha RGBA8 pixels, premultiplying them.
    pub fn from_straight_rgba(width: u32, height: u32, mut data: Vec<u8>) -> CompositeResult<Self> {
        check_len(width, height, data.len())?;
        premultiply_rgba8_in_place(&mut data);
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(data),
        })
    }

    /// Natural width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Natural height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Premultiplied RGBA8 bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.rgba8_premul
    }
}

impl FrameSource for ImageAsset {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn current_frame(&self) -> Option<FrameView<'_>> {
        let view = FrameView {
            width: self.width,
            height: self.height,
            data: &self.rgba8_premul,
            premultiplied: true,
        };
        view.is_drawable().then_some(view)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sources/still.rs"]
mod tests;
