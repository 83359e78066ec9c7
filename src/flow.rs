//! Download admission control with watermark-based backpressure
//!
//! The [`FlowControl`] state machine bounds the number of concurrently
//! in-flight clip downloads. Crossing the high watermark pauses the record
//! source; dropping below the low watermark resumes it. The gap between the
//! two watermarks provides hysteresis so a single completion near the
//! threshold does not toggle the source on every event.
//!
//! The watermark is advisory flow control, not a strict admission limit: a
//! source that keeps emitting after a pause request is tolerated (its records
//! are still admitted), the state machine simply stays paused until enough
//! completions arrive.

use std::sync::{Arc, Mutex};

/// Flow control state of the record source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowState {
    /// The source may emit records
    Running,
    /// The source has been asked to stop emitting records
    Paused,
}

/// A state transition triggered by an admission or completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowTransition {
    /// Running -> Paused (high watermark exceeded)
    Paused,
    /// Paused -> Running (dropped below low watermark)
    Resumed,
}

struct Inner {
    in_flight: usize,
    state: FlowState,
}

/// Shared admission controller (cloneable - state is Arc-wrapped).
///
/// Transitions are evaluated inside [`admit`](FlowControl::admit) and
/// [`complete`](FlowControl::complete) under a single lock, so concurrent
/// download completions delivered from worker tasks observe a consistent
/// counter and each transition is reported exactly once.
#[derive(Clone)]
pub struct FlowControl {
    inner: Arc<Mutex<Inner>>,
    pause_watermark: usize,
    resume_watermark: usize,
}

impl FlowControl {
    /// Create a new controller with the given watermarks.
    ///
    /// `pause_watermark` is the in-flight count beyond which the source is
    /// paused (strictly greater: with a watermark of 50 the 51st admission
    /// pauses). `resume_watermark` is the count below which a paused source
    /// is resumed (strictly less: with a watermark of 25, reaching 24 resumes).
    ///
    /// A `resume_watermark` of 0 is clamped to 1: the strict `<` comparison
    /// could never satisfy it and a paused controller would stay paused with
    /// zero downloads in flight.
    #[must_use]
    pub fn new(pause_watermark: usize, resume_watermark: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                in_flight: 0,
                state: FlowState::Running,
            })),
            pause_watermark,
            resume_watermark: resume_watermark.max(1),
        }
    }

    /// Admit one download: increment the in-flight count and evaluate the
    /// high-watermark transition.
    pub fn admit(&self) -> Option<FlowTransition> {
        let mut inner = self.lock();
        inner.in_flight += 1;
        if inner.state == FlowState::Running && inner.in_flight > self.pause_watermark {
            inner.state = FlowState::Paused;
            Some(FlowTransition::Paused)
        } else {
            None
        }
    }

    /// Record one download completion (success or failure): decrement the
    /// in-flight count and evaluate the low-watermark transition.
    pub fn complete(&self) -> Option<FlowTransition> {
        let mut inner = self.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
        if inner.state == FlowState::Paused && inner.in_flight < self.resume_watermark {
            inner.state = FlowState::Running;
            Some(FlowTransition::Resumed)
        } else {
            None
        }
    }

    /// Current in-flight download count.
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Current flow state.
    pub fn state(&self) -> FlowState {
        self.lock().state
    }

    /// Whether the source is currently asked to stop emitting records.
    pub fn is_paused(&self) -> bool {
        self.state() == FlowState::Paused
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a panicking thread held it; the counter
        // itself is always left consistent, so we keep going.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
