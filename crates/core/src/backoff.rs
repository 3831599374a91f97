// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Poll-with-backoff waiting bounded by a deadline
//!
//! There is no cross-process wake-up primitive on a plain filesystem, so every
//! wait is a retry loop. Delays grow exponentially and are jittered so that
//! contending processes spread out instead of retrying in lockstep.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Backoff configuration for retry loops
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub initial: Duration,
    /// Cap for exponential growth
    #[serde(with = "humantime_serde")]
    pub max: Duration,
    /// Growth factor per attempt
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(5),
            max: Duration::from_millis(500),
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    pub fn with_initial(mut self, initial: Duration) -> Self {
        self.initial = initial;
        self
    }

    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    /// Un-jittered delay for the given retry attempt (0-indexed)
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.initial.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        Duration::from_secs_f64(delay.min(self.max.as_secs_f64()))
    }

    /// Start a fresh retry sequence
    pub fn start(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            attempt: 0,
        }
    }
}

/// One retry sequence: tracks the attempt count and sleeps between attempts
#[derive(Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Backoff {
    /// Jittered delay for the next attempt, between half and all of the nominal delay
    pub fn next_delay(&mut self) -> Duration {
        let nominal = self.policy.delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        let factor: f64 = rand::rng().random_range(0.5..=1.0);
        nominal.mul_f64(factor)
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Sleep for the next delay, clipped to what is left before `deadline`.
    ///
    /// Returns `false` without sleeping when the deadline has already passed.
    pub fn pause(&mut self, deadline: &Deadline) -> bool {
        let mut delay = self.next_delay();
        if let Some(remaining) = deadline.remaining() {
            if remaining.is_zero() {
                return false;
            }
            delay = delay.min(remaining);
        }
        std::thread::sleep(delay);
        true
    }
}

/// A point after which a blocking call gives up; `None` waits forever
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub fn after(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit: Some(limit),
        }
    }

    pub fn never() -> Self {
        Self {
            started: Instant::now(),
            limit: None,
        }
    }

    pub fn from_option(limit: Option<Duration>) -> Self {
        limit.map_or_else(Self::never, Self::after)
    }

    /// Time left, or `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.limit
            .map(|limit| limit.saturating_sub(self.started.elapsed()))
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_some_and(|r| r.is_zero())
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
