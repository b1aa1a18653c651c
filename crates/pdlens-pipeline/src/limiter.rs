//! Trailing-edge rate limiter
//!
//! Used twice in the pipeline: once to coalesce arrival notifications from
//! the transport, and once to space decode passes. The limiter is a pure
//! state machine over caller-supplied instants; the actor turns its deadline
//! into a timer.
//!
//! Semantics:
//! - An event arriving at least `interval` after the last fire fires at once.
//! - An earlier event arms a single deadline at `last_fire + interval`.
//! - Events arriving while a deadline is armed are absorbed by it.

use std::time::{Duration, Instant};

/// What the caller should do after reporting an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterAction {
    /// Run now, then call [`TrailingLimiter::mark_fired`]
    Fire,
    /// A deadline was armed; run when it passes
    Scheduled(Instant),
    /// A deadline was already armed and absorbs this event
    AlreadyScheduled(Instant),
}

/// Trailing-edge rate limiter with wake-if-dirty semantics
#[derive(Debug, Clone)]
pub struct TrailingLimiter {
    interval: Duration,
    last_fired: Option<Instant>,
    deadline: Option<Instant>,
}

impl TrailingLimiter {
    /// Create a limiter that fires at most once per `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fired: None,
            deadline: None,
        }
    }

    /// Minimum spacing between fires
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Report an event at `now`
    pub fn on_event(&mut self, now: Instant) -> LimiterAction {
        if let Some(deadline) = self.deadline {
            return LimiterAction::AlreadyScheduled(deadline);
        }

        match self.next_allowed() {
            Some(allowed) if allowed > now => {
                self.deadline = Some(allowed);
                LimiterAction::Scheduled(allowed)
            }
            _ => LimiterAction::Fire,
        }
    }

    /// Arm a deadline at the earliest instant a fire is allowed, never before `now`
    ///
    /// Keeps an already armed deadline.
    pub fn arm(&mut self, now: Instant) -> Instant {
        if let Some(deadline) = self.deadline {
            return deadline;
        }
        let deadline = self.next_allowed().map_or(now, |allowed| allowed.max(now));
        self.deadline = Some(deadline);
        deadline
    }

    /// Record that the guarded work ran at `now`; clears any armed deadline
    pub fn mark_fired(&mut self, now: Instant) {
        self.last_fired = Some(now);
        self.deadline = None;
    }

    /// Armed deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether an armed deadline has passed
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Disarm without forgetting the last fire time
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Forget everything; the next event fires immediately
    pub fn reset(&mut self) {
        self.last_fired = None;
        self.deadline = None;
    }

    fn next_allowed(&self) -> Option<Instant> {
        self.last_fired.map(|last| last + self.interval)
    }
}
