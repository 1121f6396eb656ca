//! Step scheduling for the animation loop.
//!
//! The host repaints whenever it likes; the particle pipeline should advance
//! at most a fixed number of times per second. [`StepScheduler`] turns
//! repaint requests into steps:
//!
//! - requests made while a step is already pending collapse into it
//! - a step becomes due no sooner than one interval after the previous one
//! - [`cancel`](StepScheduler::cancel) discards the pending step, so a step
//!   requested before teardown never fires afterwards
//!
//! Time is passed in explicitly, which keeps the scheduler deterministic in
//! tests.
//!
//! # Example
//!
//! ```
//! use std::time::{Duration, Instant};
//! use windflow::time::StepScheduler;
//!
//! let start = Instant::now();
//! let mut steps = StepScheduler::new(60.0);
//! steps.request(start);
//! steps.request(start); // collapses into the first request
//! assert_eq!(steps.poll(start), Some(1));
//! assert_eq!(steps.poll(start), None);
//!
//! steps.request(start);
//! assert_eq!(steps.poll(start), None); // too soon
//! assert_eq!(steps.poll(start + Duration::from_millis(17)), Some(2));
//! ```

use std::time::{Duration, Instant};

/// Default step rate.
pub const DEFAULT_STEPS_PER_SECOND: f32 = 60.0;

/// Debounced step requests plus the tick counter fed to the advection stage.
#[derive(Debug, Clone)]
pub struct StepScheduler {
    /// Minimum time between two steps.
    interval: Duration,
    /// When the last step ran.
    last_step: Option<Instant>,
    /// Due time of the pending step, if any.
    pending: Option<Instant>,
    /// Steps run so far.
    tick: u32,
}

impl StepScheduler {
    /// Create a scheduler running at most `steps_per_second` steps.
    ///
    /// Non-positive or non-finite rates fall back to the default.
    pub fn new(steps_per_second: f32) -> Self {
        let rate = if steps_per_second.is_finite() && steps_per_second > 0.0 {
            steps_per_second
        } else {
            DEFAULT_STEPS_PER_SECOND
        };
        Self {
            interval: Duration::from_secs_f64(1.0 / rate as f64),
            last_step: None,
            pending: None,
            tick: 0,
        }
    }

    /// Minimum time between steps.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ask for a step. Returns `false` when one was already pending.
    pub fn request(&mut self, now: Instant) -> bool {
        if self.pending.is_some() {
            return false;
        }
        let due = match self.last_step {
            Some(last) => (last + self.interval).max(now),
            None => now,
        };
        self.pending = Some(due);
        true
    }

    /// Run the pending step if it is due, returning the new tick count.
    pub fn poll(&mut self, now: Instant) -> Option<u32> {
        match self.pending {
            Some(due) if due <= now => {
                self.pending = None;
                self.last_step = Some(now);
                self.tick = self.tick.wrapping_add(1);
                Some(self.tick)
            }
            _ => None,
        }
    }

    /// When the pending step becomes due.
    pub fn next_due(&self) -> Option<Instant> {
        self.pending
    }

    /// Whether a step is waiting.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop the pending step, if any.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Steps run so far.
    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Cancel and restart counting from zero.
    pub fn reset(&mut self) {
        self.pending = None;
        self.last_step = None;
        self.tick = 0;
    }
}

impl Default for StepScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_STEPS_PER_SECOND)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_is_due_immediately() {
        let now = Instant::now();
        let mut s = StepScheduler::default();
        assert!(s.request(now));
        assert_eq!(s.next_due(), Some(now));
        assert_eq!(s.poll(now), Some(1));
        assert_eq!(s.tick(), 1);
    }

    #[test]
    fn test_burst_collapses_to_one_step() {
        let now = Instant::now();
        let mut s = StepScheduler::default();
        assert!(s.request(now));
        assert!(!s.request(now));
        assert!(!s.request(now + Duration::from_millis(1)));
        assert_eq!(s.poll(now + Duration::from_millis(1)), Some(1));
        assert_eq!(s.poll(now + Duration::from_millis(2)), None);
    }

    #[test]
    fn test_rate_limit() {
        let now = Instant::now();
        let mut s = StepScheduler::new(10.0);
        s.request(now);
        s.poll(now);
        s.request(now + Duration::from_millis(10));
        assert_eq!(s.next_due(), Some(now + s.interval()));
        assert_eq!(s.poll(now + Duration::from_millis(50)), None);
        assert_eq!(s.poll(now + Duration::from_millis(100)), Some(2));
    }

    #[test]
    fn test_cancel_makes_pending_step_noop() {
        let now = Instant::now();
        let mut s = StepScheduler::default();
        s.request(now);
        s.cancel();
        assert!(!s.is_pending());
        assert_eq!(s.poll(now + Duration::from_secs(1)), None);
        assert_eq!(s.tick(), 0);
    }

    #[test]
    fn test_reset_restarts_ticks() {
        let now = Instant::now();
        let mut s = StepScheduler::default();
        s.request(now);
        s.poll(now);
        s.reset();
        assert_eq!(s.tick(), 0);
        assert!(s.request(now));
        assert_eq!(s.poll(now), Some(1));
    }

    #[test]
    fn test_invalid_rate_uses_default() {
        let s = StepScheduler::new(0.0);
        assert_eq!(s.interval(), StepScheduler::default().interval());
    }
}
