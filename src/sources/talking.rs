use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};

/// What the avatar session reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TalkingEvent {
    /// The avatar started speaking.
    Started,
    /// The avatar finished speaking.
    Stopped,
}

/// Sending half handed to the avatar session adapter.
#[derive(Clone, Debug)]
pub struct TalkingSignal {
    tx: Sender<TalkingEvent>,
}

impl TalkingSignal {
    /// Report that the avatar started talking. Returns `false` once the listener is gone.
    pub fn started(&self) -> bool {
        self.tx.send(TalkingEvent::Started).is_ok()
    }

    /// Report that the avatar stopped talking. Returns `false` once the listener is gone.
    pub fn stopped(&self) -> bool {
        self.tx.send(TalkingEvent::Stopped).is_ok()
    }
}

/// Receiving half, drained by the render loop once per tick.
#[derive(Debug)]
pub struct TalkingEvents {
    rx: Receiver<TalkingEvent>,
}

impl TalkingEvents {
    /// Take every queued event and return the last one.
    ///
    /// Only the final state matters for play/pause, so intermediate flips inside one tick are
    /// collapsed.
    pub fn drain_latest(&self) -> Option<TalkingEvent> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(ev) => latest = Some(ev),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        latest
    }
}

/// Create a connected signal/listener pair.
pub fn talking_channel() -> (TalkingSignal, TalkingEvents) {
    let (tx, rx) = channel();
    (TalkingSignal { tx }, TalkingEvents { rx })
}

#[cfg(test)]
#[path = "../../tests/unit/sources/talking.rs"]
mod tests;
