//! Monotonic time source for frame pacing

use std::time::Instant;

/// Source of monotonic timestamps
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The system's monotonic clock
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
