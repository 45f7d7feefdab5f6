use rayon::prelude::*;

use crate::foundation::error::{CompositeError, CompositeResult};
use crate::foundation::math::{mul_div255_u8, premul_channel, unpremul_channel};
use crate::keying::classify::ColorClassifier;
use crate::sources::frame::{FrameSource, FrameView};

/// Threading controls for the keying pass.
#[derive(Clone, Debug, Default)]
pub struct KeyerOpts {
    /// Key rows in parallel on a dedicated rayon pool.
    pub parallel: bool,
    /// Override the number of worker threads. `None` uses rayon defaults.
    pub threads: Option<usize>,
}

/// Premultiplied output of one keying pass, at source resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyedFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl KeyedFrame {
    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Premultiplied RGBA8 bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Borrow as a premultiplied [`FrameView`] for the compositor.
    pub fn view(&self) -> FrameView<'_> {
        FrameView {
            width: self.width,
            height: self.height,
            data: &self.data,
            premultiplied: true,
        }
    }
}

/// Applies a [`ColorClassifier`] to the current frame of one source.
///
/// The source is only read. Pixels are copied into a buffer owned by the keyer, which is
/// reused across frames and only reallocated when the source resolution changes.
pub struct FrameKeyer {
    classifier: ColorClassifier,
    pool: Option<rayon::ThreadPool>,
    out: KeyedFrame,
    has_output: bool,
    reallocations: u64,
}

impl std::fmt::Debug for FrameKeyer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameKeyer")
            .field("classifier", &self.classifier)
            .field("parallel", &self.pool.is_some())
            .field("width", &self.out.width)
            .field("height", &self.out.height)
            .finish()
    }
}

impl FrameKeyer {
    /// Sequential keyer.
    pub fn new(classifier: ColorClassifier) -> Self {
        Self {
            classifier,
            pool: None,
            out: KeyedFrame::default(),
            has_output: false,
            reallocations: 0,
        }
    }

    /// Keyer with threading options; builds the worker pool up front.
    pub fn with_opts(classifier: ColorClassifier, opts: &KeyerOpts) -> CompositeResult<Self> {
        let mut keyer = Self::new(classifier);
        if opts.parallel {
            keyer.pool = Some(build_thread_pool(opts.threads)?);
        }
        Ok(keyer)
    }

    /// Active classifier.
    pub fn classifier(&self) -> &ColorClassifier {
        &self.classifier
    }

    /// Swap the classifier; takes effect on the next [`FrameKeyer::key`].
    pub fn set_classifier(&mut self, classifier: ColorClassifier) {
        self.classifier = classifier;
    }

    /// How many times the output buffer had to grow or shrink.
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    /// Result of the last successful pass.
    pub fn output(&self) -> Option<&KeyedFrame> {
        self.has_output.then_some(&self.out)
    }

    /// Key the source's current frame.
    ///
    /// Returns `None` while the source has nothing decoded, or hands over a buffer that does
    /// not match its dimensions. The previous output is dropped in that case.
    pub fn key(&mut self, source: &dyn FrameSource) -> Option<&KeyedFrame> {
        self.has_output = false;
        let view = source.current_frame()?;
        if !view.is_drawable() {
            return None;
        }
        let expected = (view.width as usize) * (view.height as usize) * 4;
        if view.data.len() != expected {
            tracing::warn!(
                width = view.width,
                height = view.height,
                len = view.data.len(),
                "source frame does not match its dimensions, skipping"
            );
            return None;
        }

        if self.out.width != view.width || self.out.height != view.height {
            self.out.width = view.width;
            self.out.height = view.height;
            self.out.data.resize(expected, 0);
            self.reallocations += 1;
            tracing::debug!(
                width = view.width,
                height = view.height,
                "keyer buffer resized"
            );
        }
        self.out.data.copy_from_slice(view.data);

        let classifier = self.classifier;
        let premultiplied = view.premultiplied;
        let row_bytes = (view.width as usize) * 4;
        let data = &mut self.out.data;
        match &self.pool {
            Some(pool) => pool.install(|| {
                data.par_chunks_mut(row_bytes)
                    .for_each(|row| key_row(&classifier, premultiplied, row));
            }),
            None => {
                for row in data.chunks_exact_mut(row_bytes) {
                    key_row(&classifier, premultiplied, row);
                }
            }
        }

        self.has_output = true;
        Some(&self.out)
    }
}

fn key_row(classifier: &ColorClassifier, premultiplied: bool, row: &mut [u8]) {
    for px in row.chunks_exact_mut(4) {
        let a = px[3];
        if a == 0 {
            px[..3].fill(0);
            continue;
        }
        let (r, g, b) = if premultiplied {
            (
                unpremul_channel(px[0], a),
                unpremul_channel(px[1], a),
                unpremul_channel(px[2], a),
            )
        } else {
            (px[0], px[1], px[2])
        };
        let keep = classifier.classify_u8(r, g, b);
        let na = mul_div255_u8(u16::from(a), u16::from(keep));
        if na == a && premultiplied {
            continue;
        }
        px[0] = premul_channel(r, na);
        px[1] = premul_channel(g, na);
        px[2] = premul_channel(b, na);
        px[3] = na;
    }
}

fn build_thread_pool(threads: Option<usize>) -> CompositeResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(CompositeError::validation(
            "keyer 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| CompositeError::render(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/keying/keyer.rs"]
mod tests;
