//! Clock adapters.

use pinba_ports::ClockPort;
use std::time::Instant;

/// Monotonic clock backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
