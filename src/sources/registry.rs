use std::collections::BTreeMap;
use std::time::Duration;

use crate::sources::frame::FrameSource;
use crate::sources::talking::TalkingEvent;

/// Read-only lookup of sources by layer name, as seen by the compositor.
pub trait SourceProvider {
    /// Source bound to `layer`, if any.
    fn source(&self, layer: &str) -> Option<&dyn FrameSource>;
}

struct Entry {
    source: Box<dyn FrameSource>,
    talking_sync: bool,
}

/// Owns the frame sources of a scene, keyed by layer name.
#[derive(Default)]
pub struct SourceRegistry {
    entries: BTreeMap<String, Entry>,
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("layers", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SourceRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `source` to `layer`, replacing any previous binding.
    pub fn insert(&mut self, layer: impl Into<String>, source: Box<dyn FrameSource>) {
        self.entries.insert(
            layer.into(),
            Entry {
                source,
                talking_sync: false,
            },
        );
    }

    /// Bind a source that plays while the avatar talks and pauses when it stops.
    pub fn insert_talking_synced(&mut self, layer: impl Into<String>, source: Box<dyn FrameSource>) {
        self.entries.insert(
            layer.into(),
            Entry {
                source,
                talking_sync: true,
            },
        );
    }

    /// Unbind and return the source for `layer`.
    pub fn remove(&mut self, layer: &str) -> Option<Box<dyn FrameSource>> {
        self.entries.remove(layer).map(|e| e.source)
    }

    /// Mutable access, e.g. to push frames into a live feed.
    pub fn get_mut(&mut self, layer: &str) -> Option<&mut (dyn FrameSource + 'static)> {
        self.entries.get_mut(layer).map(|e| e.source.as_mut())
    }

    /// Whether `layer` has a source bound.
    pub fn contains(&self, layer: &str) -> bool {
        self.entries.contains_key(layer)
    }

    /// Number of bound sources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Advance every source's playhead.
    pub fn advance_all(&mut self, dt: Duration) {
        for entry in self.entries.values_mut() {
            entry.source.advance(dt);
        }
    }

    /// Play or pause every talking-synced source. Returns how many sources were touched.
    pub fn apply_talking(&mut self, event: TalkingEvent) -> usize {
        let mut touched = 0;
        for (name, entry) in &mut self.entries {
            if !entry.talking_sync {
                continue;
            }
            let Some(ctl) = entry.source.playback() else {
                tracing::debug!(layer = %name, "talking-synced source has no playback control");
                continue;
            };
            match event {
                TalkingEvent::Started => ctl.play(),
                TalkingEvent::Stopped => ctl.pause(),
            }
            touched += 1;
        }
        touched
    }

    /// Drop every source.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl SourceProvider for SourceRegistry {
    fn source(&self, layer: &str) -> Option<&dyn FrameSource> {
        self.entries.get(layer).map(|e| e.source.as_ref())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sources/registry.rs"]
mod tests;
