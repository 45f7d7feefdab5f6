//! Frame sources: anything that hands the compositor RGBA pixels.

/// Frame buffers and the source trait.
pub mod frame;
/// Sources keyed by layer name.
pub mod registry;
/// Clips and live feeds.
pub mod sequence;
/// Still images.
pub mod still;
/// Avatar talking signals.
pub mod talking;

pub use frame::{FrameRgba, FrameSource, FrameView};
pub use registry::{SourceProvider, SourceRegistry};
pub use sequence::{FrameSequence, PlaybackControl};
pub use still::ImageAsset;
pub use talking::{TalkingEvent, TalkingEvents, TalkingSignal, talking_channel};
