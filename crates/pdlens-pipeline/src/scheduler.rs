//! Batch scheduler
//!
//! Bounds decode passes to one per update interval. Arrivals either trigger
//! a pass immediately or arm a single deferred pass; a pass that leaves
//! reports behind re-arms the scheduler so nothing is starved. With an empty
//! queue nothing is armed and nothing polls.

use std::time::{Duration, Instant};

use tracing::trace;

use crate::limiter::{LimiterAction, TrailingLimiter};

/// Coalescing pass scheduler
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    limiter: TrailingLimiter,
}

impl BatchScheduler {
    /// Create a scheduler allowing one pass per `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            limiter: TrailingLimiter::new(interval),
        }
    }

    /// Report that new reports are waiting
    ///
    /// Returns `true` when a pass should run right now.
    pub fn on_arrival(&mut self, now: Instant) -> bool {
        match self.limiter.on_event(now) {
            LimiterAction::Fire => true,
            LimiterAction::Scheduled(deadline) => {
                trace!("Pass scheduled in {:?}", deadline.saturating_duration_since(now));
                false
            }
            LimiterAction::AlreadyScheduled(_) => false,
        }
    }

    /// Whether the armed pass is due; disarms it when so
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.limiter.is_due(now) {
            self.limiter.cancel();
            true
        } else {
            false
        }
    }

    /// Record a completed pass
    ///
    /// When reports are still queued the next pass is armed right away, one
    /// interval out.
    pub fn pass_completed(&mut self, now: Instant, backlog: bool) {
        self.limiter.mark_fired(now);
        if backlog {
            self.limiter.arm(now);
        }
    }

    /// Armed pass deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.limiter.deadline()
    }

    /// Whether a pass is armed
    pub fn is_armed(&self) -> bool {
        self.limiter.deadline().is_some()
    }

    /// Minimum spacing between passes
    pub fn interval(&self) -> Duration {
        self.limiter.interval()
    }

    /// Disarm any pending pass
    pub fn cancel(&mut self) {
        self.limiter.cancel();
    }

    /// Disarm and forget the last pass time
    pub fn reset(&mut self) {
        self.limiter.reset();
    }
}
