//! Adaptive polling interval.
//!
//! Each quiet timer firing stretches the interval by one second, from
//! [`MIN_POLL_DELAY`] up to ten seconds. A watch event or a busy daemon
//! snaps it back to the minimum.

use std::time::Duration;

use crate::paths::{MAX_BACKOFF_STEPS, MIN_POLL_DELAY};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    steps: u32,
    delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            steps: 0,
            delay: MIN_POLL_DELAY,
        }
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay until the next timer firing.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Back to the minimum delay with the counter cleared.
    pub fn reset(&mut self) -> Duration {
        *self = Self::default();
        self.delay
    }

    /// Delay after a timer-triggered cycle.
    pub fn on_timer(&mut self, busy: bool) -> Duration {
        if busy {
            return self.reset();
        }
        if self.steps < MAX_BACKOFF_STEPS {
            self.delay = MIN_POLL_DELAY + Duration::from_secs(u64::from(self.steps));
            self.steps += 1;
        }
        self.delay
    }
}
