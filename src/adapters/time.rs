//! Host time adapter.
//!
//! Monotonic milliseconds for the controller's `poll` clock, measured from
//! adapter construction with `std::time::Instant`.

use std::time::Instant;

pub struct HostClock {
    start: Instant,
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    /// Milliseconds since construction (monotonic).
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
