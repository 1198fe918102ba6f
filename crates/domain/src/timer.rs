//! Timer model: handles, lifecycle state and snapshots.

use crate::tags::TagMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Informational payload attached to a timer. Never transmitted.
pub type TimerData = serde_json::Map<String, serde_json::Value>;

/// Identity of a timer within its owning store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Wrap a raw handle value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Lifecycle state of a timer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerState {
    /// Measuring; the value is not fixed yet.
    Running {
        /// Instant the timer was started.
        started_at: Instant,
    },
    /// Finished; the value is fixed.
    Stopped {
        /// Measured duration in seconds.
        value: f64,
    },
}

/// One measured span with its tags and data.
#[derive(Debug, Clone, PartialEq)]
pub struct Timer {
    tags: TagMap,
    data: TimerData,
    state: TimerState,
}

impl Timer {
    pub(crate) const fn running(tags: TagMap, data: TimerData, started_at: Instant) -> Self {
        Self {
            tags,
            data,
            state: TimerState::Running { started_at },
        }
    }

    pub(crate) const fn stopped(tags: TagMap, value: f64, data: TimerData) -> Self {
        Self {
            tags,
            data,
            state: TimerState::Stopped { value },
        }
    }

    /// Tags used for aggregation.
    #[must_use]
    pub const fn tags(&self) -> &TagMap {
        &self.tags
    }

    /// Informational data.
    #[must_use]
    pub const fn data(&self) -> &TimerData {
        &self.data
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> TimerState {
        self.state
    }

    /// Returns true while the timer is measuring.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running { .. })
    }

    /// Final value in seconds, if stopped.
    #[must_use]
    pub const fn value(&self) -> Option<f64> {
        match self.state {
            TimerState::Running { .. } => None,
            TimerState::Stopped { value } => Some(value),
        }
    }

    /// Value as of `now` without changing state.
    #[must_use]
    pub fn value_at(&self, now: Instant) -> f64 {
        match self.state {
            TimerState::Running { started_at } => elapsed_seconds(started_at, now),
            TimerState::Stopped { value } => value,
        }
    }

    /// Transition to stopped. Returns false if it was already stopped.
    pub(crate) fn stop(&mut self, now: Instant) -> bool {
        match self.state {
            TimerState::Running { started_at } => {
                self.state = TimerState::Stopped {
                    value: elapsed_seconds(started_at, now),
                };
                true
            },
            TimerState::Stopped { .. } => false,
        }
    }

    pub(crate) fn tags_mut(&mut self) -> &mut TagMap {
        &mut self.tags
    }

    pub(crate) fn data_mut(&mut self) -> &mut TimerData {
        &mut self.data
    }
}

/// Snapshot of a timer returned by info queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerInfo {
    /// Timer handle.
    pub handle: TimerHandle,
    /// True while the timer is still running.
    pub started: bool,
    /// Final value, or elapsed time so far for a running timer (seconds).
    pub value: f64,
    /// Timer tags.
    pub tags: TagMap,
    /// Timer data.
    pub data: TimerData,
}

impl TimerInfo {
    pub(crate) fn capture(handle: TimerHandle, timer: &Timer, now: Instant) -> Self {
        Self {
            handle,
            started: timer.is_running(),
            value: timer.value_at(now),
            tags: timer.tags.clone(),
            data: timer.data.clone(),
        }
    }
}

fn elapsed_seconds(started_at: Instant, now: Instant) -> f64 {
    now.saturating_duration_since(started_at).as_secs_f64()
}
