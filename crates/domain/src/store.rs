//! Per-request timer store.
//!
//! The store owns every timer of one request scope. Handles come from a
//! per-store counter (pre-incremented, first handle is 1) and are never
//! reused, even after `delete` or `clear`. The caller supplies the current
//! instant, so the store itself never reads a clock.

use crate::error::{TimerError, TimerOperation};
use crate::tags::TagMap;
use crate::timer::{Timer, TimerData, TimerHandle, TimerInfo};
use std::collections::BTreeMap;
use std::time::Instant;

/// Owned collection of running and stopped timers.
#[derive(Debug, Clone, Default)]
pub struct TimerStore {
    last_handle: u64,
    // Handles increase monotonically, so key order is creation order.
    timers: BTreeMap<TimerHandle, Timer>,
}

impl TimerStore {
    /// Create an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_handle: 0,
            timers: BTreeMap::new(),
        }
    }

    /// Start a running timer at `now`.
    pub fn start(&mut self, tags: TagMap, data: TimerData, now: Instant) -> TimerHandle {
        let handle = self.next_handle();
        self.timers.insert(handle, Timer::running(tags, data, now));
        handle
    }

    /// Record an already measured duration as a stopped timer.
    pub fn add(&mut self, tags: TagMap, value: f64, data: TimerData) -> Result<TimerHandle, TimerError> {
        if !value.is_finite() || value < 0.0 {
            return Err(TimerError::InvalidValue { value });
        }
        let handle = self.next_handle();
        self.timers.insert(handle, Timer::stopped(tags, value, data));
        Ok(handle)
    }

    /// Stop a running timer, fixing its value at `now`.
    pub fn stop(&mut self, handle: TimerHandle, now: Instant) -> Result<(), TimerError> {
        let timer = self.timer_mut(handle, TimerOperation::Stop)?;
        if timer.stop(now) {
            Ok(())
        } else {
            Err(TimerError::AlreadyStopped { handle })
        }
    }

    /// Remove a timer regardless of its state.
    pub fn delete(&mut self, handle: TimerHandle) -> Result<(), TimerError> {
        self.timers
            .remove(&handle)
            .map(|_| ())
            .ok_or(TimerError::NotFound {
                handle,
                operation: TimerOperation::Delete,
            })
    }

    /// Merge tags into a timer; incoming keys win.
    pub fn merge_tags(&mut self, handle: TimerHandle, tags: TagMap) -> Result<(), TimerError> {
        self.timer_mut(handle, TimerOperation::Modify)?
            .tags_mut()
            .merge(tags);
        Ok(())
    }

    /// Replace a timer's tags.
    pub fn replace_tags(&mut self, handle: TimerHandle, tags: TagMap) -> Result<(), TimerError> {
        *self.timer_mut(handle, TimerOperation::Modify)?.tags_mut() = tags;
        Ok(())
    }

    /// Merge data into a timer; incoming keys win.
    pub fn merge_data(&mut self, handle: TimerHandle, data: TimerData) -> Result<(), TimerError> {
        let target = self.timer_mut(handle, TimerOperation::Modify)?.data_mut();
        for (key, value) in data {
            target.insert(key, value);
        }
        Ok(())
    }

    /// Replace a timer's data.
    pub fn replace_data(&mut self, handle: TimerHandle, data: TimerData) -> Result<(), TimerError> {
        *self.timer_mut(handle, TimerOperation::Modify)?.data_mut() = data;
        Ok(())
    }

    /// Snapshot a timer. Running timers report elapsed time up to `now`.
    pub fn info(&self, handle: TimerHandle, now: Instant) -> Result<TimerInfo, TimerError> {
        self.timers
            .get(&handle)
            .map(|timer| TimerInfo::capture(handle, timer, now))
            .ok_or(TimerError::NotFound {
                handle,
                operation: TimerOperation::GetInfo,
            })
    }

    /// Snapshot every timer in creation order.
    #[must_use]
    pub fn infos(&self, now: Instant) -> Vec<TimerInfo> {
        self.timers
            .iter()
            .map(|(handle, timer)| TimerInfo::capture(*handle, timer, now))
            .collect()
    }

    /// Stop every running timer. Returns how many were stopped.
    pub fn stop_all(&mut self, now: Instant) -> usize {
        self.timers
            .values_mut()
            .filter(|timer| timer.is_running())
            .map(|timer| timer.stop(now))
            .filter(|stopped| *stopped)
            .count()
    }

    /// Handles in creation order, optionally only stopped timers.
    #[must_use]
    pub fn handles(&self, only_stopped: bool) -> Vec<TimerHandle> {
        self.timers
            .iter()
            .filter(|(_, timer)| !only_stopped || !timer.is_running())
            .map(|(handle, _)| *handle)
            .collect()
    }

    /// Timers in creation order, optionally only stopped ones.
    pub fn timers(&self, only_stopped: bool) -> impl Iterator<Item = &Timer> {
        self.timers
            .values()
            .filter(move |timer| !only_stopped || !timer.is_running())
    }

    /// Look up a timer.
    #[must_use]
    pub fn get(&self, handle: TimerHandle) -> Option<&Timer> {
        self.timers.get(&handle)
    }

    /// Drop every timer. The handle counter keeps counting.
    pub fn clear(&mut self) {
        self.timers.clear();
    }

    /// Number of timers held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Returns true when no timers are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    fn next_handle(&mut self) -> TimerHandle {
        self.last_handle += 1;
        TimerHandle::from_raw(self.last_handle)
    }

    fn timer_mut(
        &mut self,
        handle: TimerHandle,
        operation: TimerOperation,
    ) -> Result<&mut Timer, TimerError> {
        self.timers
            .get_mut(&handle)
            .ok_or(TimerError::NotFound { handle, operation })
    }
}
