//! Monotonic time adapter.
//!
//! Wraps `std::time::Instant` so the engine only ever sees milliseconds
//! since the adapter was created.

use std::time::Instant;

use crate::app::ports::Clock;

/// Milliseconds since construction. Never goes backwards.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
