//! Monotonic clock boundary contract.

use std::time::Instant;

/// Source of monotonic instants for timers and request time.
pub trait ClockPort: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}
