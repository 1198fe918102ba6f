//! # pinba-domain
//!
//! Timer lifecycle and aggregation for the pinba client.
//!
//! - **Tags** - `TagMap`, insertion-ordered string labels
//! - **Timers** - `Timer`, `TimerHandle`, `TimerInfo`
//! - **Store** - `TimerStore`, the per-request timer owner
//! - **Aggregation** - `aggregate`, tag-set grouping and dictionary interning
//!
//! ## Dependency Rules
//!
//! - Depends only on `shared` crate
//! - No clock reads: callers pass the current `Instant`
//! - Pure domain logic with no I/O

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

// Re-export shared types for convenience
pub use pinba_shared::shared_crate_version;

// =============================================================================
// DOMAIN MODULES
// =============================================================================

pub mod aggregate;
pub mod error;
pub mod store;
pub mod tags;
pub mod timer;

pub use aggregate::{AggregatedSummary, aggregate};
pub use error::{TimerError, TimerOperation};
pub use store::TimerStore;
pub use tags::TagMap;
pub use timer::{Timer, TimerData, TimerHandle, TimerInfo, TimerState};

/// Returns the domain crate version.
#[must_use]
pub const fn domain_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// =============================================================================
// TESTS
// =============================================================================
