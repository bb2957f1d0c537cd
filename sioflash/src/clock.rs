//! Injectable time source for the handshake deadline loops.
//!
//! The EC channel is driven by busy-polling with a wall-clock deadline.
//! Abstracting the clock lets tests exercise the timeout paths without
//! real 250 ms delays.

use std::time::{Duration, Instant};

/// Monotonic time source consulted by the polling loops.
pub trait Clock {
    /// Time elapsed since some fixed origin. Must never go backwards.
    fn now(&mut self) -> Duration;
}

/// Real clock backed by [`Instant`].
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock with its origin at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&mut self) -> Duration {
        self.origin.elapsed()
    }
}
