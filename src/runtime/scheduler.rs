use std::time::{Duration, Instant};

use crate::foundation::error::{CompositeError, CompositeResult};

/// Opaque id of one requested tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickHandle(pub u64);

/// Host "call me on the next frame" primitive.
pub trait FrameScheduler {
    /// Ask for one callback on the next display refresh.
    fn request_frame(&mut self) -> TickHandle;
    /// Withdraw a request. Unknown or already fired handles are ignored.
    fn cancel_frame(&mut self, handle: TickHandle);
}

/// Scheduler driven by the host or by tests: requests queue up until [`ManualScheduler::fire`].
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    pending: Vec<TickHandle>,
    requests: u64,
    cancellations: u64,
}

impl ManualScheduler {
    /// Empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop the oldest outstanding request, as the host would when the frame arrives.
    pub fn fire(&mut self) -> Option<TickHandle> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }

    /// Outstanding requests.
    pub fn pending(&self) -> &[TickHandle] {
        &self.pending
    }

    /// Total `request_frame` calls.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Total `cancel_frame` calls that withdrew a pending request.
    pub fn cancellations(&self) -> u64 {
        self.cancellations
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> TickHandle {
        self.next_id += 1;
        self.requests += 1;
        let h = TickHandle(self.next_id);
        self.pending.push(h);
        h
    }

    fn cancel_frame(&mut self, handle: TickHandle) {
        let before = self.pending.len();
        self.pending.retain(|h| *h != handle);
        if self.pending.len() != before {
            self.cancellations += 1;
        }
    }
}

/// Fixed-rate scheduler for headless runs; [`IntervalScheduler::wait_next`] sleeps until the
/// next deadline.
///
/// A late tick does not cause a burst of catch-up ticks: the next deadline is never earlier
/// than the moment it is requested.
#[derive(Debug)]
pub struct IntervalScheduler {
    interval: Duration,
    next_id: u64,
    last_deadline: Option<Instant>,
    pending: Option<(TickHandle, Instant)>,
}

impl IntervalScheduler {
    /// Scheduler ticking at `fps` frames per second.
    pub fn new(fps: f64) -> CompositeResult<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(CompositeError::validation(format!(
                "scheduler fps must be finite and > 0, got {fps}"
            )));
        }
        Ok(Self {
            interval: Duration::from_secs_f64(1.0 / fps),
            next_id: 0,
            last_deadline: None,
            pending: None,
        })
    }

    /// Time between ticks.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until the pending tick is due, then hand it out with the wake-up time.
    ///
    /// Returns `None` when nothing is scheduled, i.e. the loop was stopped.
    pub fn wait_next(&mut self) -> Option<(TickHandle, Instant)> {
        let (handle, deadline) = self.pending.take()?;
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        Some((handle, Instant::now()))
    }
}

impl FrameScheduler for IntervalScheduler {
    fn request_frame(&mut self) -> TickHandle {
        self.next_id += 1;
        let handle = TickHandle(self.next_id);
        let now = Instant::now();
        let deadline = match self.last_deadline {
            Some(prev) => (prev + self.interval).max(now),
            None => now,
        };
        self.last_deadline = Some(deadline);
        self.pending = Some((handle, deadline));
        handle
    }

    fn cancel_frame(&mut self, handle: TickHandle) {
        if self.pending.is_some_and(|(h, _)| h == handle) {
            self.pending = None;
            self.last_deadline = None;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/scheduler.rs"]
mod tests;
