// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling
//!
//! Records written to disk are compared by processes that share nothing but
//! the filesystem, so time is wall-clock microseconds since the Unix epoch
//! rather than a process-local `Instant`.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A clock that provides the current wall-clock time
pub trait Clock: Clone + Send + Sync {
    /// Microseconds since the Unix epoch
    fn now_micros(&self) -> u64;

    /// Time elapsed since `micros`, saturating at zero when `micros` is in the future
    fn elapsed_since(&self, micros: u64) -> Duration {
        Duration::from_micros(self.now_micros().saturating_sub(micros))
    }
}

/// Real system clock
#[derive(Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }
}

/// Fake clock for testing with controllable time
#[derive(Clone, Debug)]
pub struct FakeClock {
    current: Arc<Mutex<u64>>,
}

impl FakeClock {
    /// Start at the current system time
    pub fn new() -> Self {
        Self::at(SystemClock.now_micros())
    }

    /// Start at a fixed point in time
    pub fn at(micros: u64) -> Self {
        Self {
            current: Arc::new(Mutex::new(micros)),
        }
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += duration.as_micros() as u64;
    }

    /// Set the clock to a specific time
    pub fn set(&self, micros: u64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = micros;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now_micros(&self) -> u64 {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
