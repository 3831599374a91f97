// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named mutex with TTL-based stale detection
//!
//! A lock is a record file at `locks/<resource>.lock` created with an
//! exclusive publish. Whoever creates it holds the lock. A record whose TTL
//! has elapsed, whose owner process is gone (same host only), or that cannot
//! be decoded is stale and may be reclaimed by the next acquirer.
//!
//! Liveness is only checked on the local host. Across hosts the TTL is the
//! sole staleness signal, so a TTL must exceed the longest critical section.

use super::reap::{observe, reap_if, Observed};
use crate::atomic::{ensure_dir, publish_json_exclusive};
use crate::backoff::{BackoffPolicy, Deadline};
use crate::clock::{Clock, SystemClock};
use crate::config::LockSettings;
use crate::error::CoordError;
use crate::identity::{owner_is_dead, Identity};
use crate::layout::Layout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Contents of a lock file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub version: u32,
    pub resource: String,
    pub holder_id: String,
    pub host: String,
    pub pid: u32,
    /// Microseconds since the Unix epoch
    pub acquired_at: u64,
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl LockRecord {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(resource: &str, holder: &Identity, acquired_at: u64, ttl: Duration) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            resource: resource.to_string(),
            holder_id: holder.holder_id.clone(),
            host: holder.host.clone(),
            pid: holder.pid,
            acquired_at,
            ttl,
        }
    }

    /// Whether the holder has kept the lock longer than it declared
    pub fn is_expired(&self, clock: &impl Clock) -> bool {
        clock.elapsed_since(self.acquired_at) > self.ttl
    }
}

/// Why a record no longer counts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StaleReason {
    Expired,
    OwnerDead,
    Corrupt,
}

/// Classify an observed lock record; `None` means it is live
pub fn lock_staleness(observed: &Observed<LockRecord>, clock: &impl Clock) -> Option<StaleReason> {
    match observed {
        Observed::Corrupt => Some(StaleReason::Corrupt),
        Observed::Record(r) if r.is_expired(clock) => Some(StaleReason::Expired),
        Observed::Record(r) if owner_is_dead(&r.host, r.pid) => Some(StaleReason::OwnerDead),
        Observed::Record(_) => None,
    }
}

/// Result of one create attempt
enum Attempt {
    Acquired(LockRecord),
    /// The previous record was removed or vanished; try again right away
    Retry,
    /// Someone live holds it
    Contested,
}

/// A cross-process mutex keyed by resource name
#[derive(Clone, Debug)]
pub struct NamedMutex<C: Clock = SystemClock> {
    layout: Layout,
    identity: Identity,
    clock: C,
    backoff: BackoffPolicy,
    settings: LockSettings,
}

impl NamedMutex<SystemClock> {
    pub fn open(layout: &Layout, identity: Identity) -> Result<Self, CoordError> {
        ensure_dir(&layout.locks())?;
        Ok(Self {
            layout: layout.clone(),
            identity,
            clock: SystemClock,
            backoff: BackoffPolicy::default(),
            settings: LockSettings::default(),
        })
    }
}

impl<C: Clock> NamedMutex<C> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> NamedMutex<C2> {
        NamedMutex {
            layout: self.layout,
            identity: self.identity,
            clock,
            backoff: self.backoff,
            settings: self.settings,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_settings(mut self, settings: LockSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn settings(&self) -> &LockSettings {
        &self.settings
    }

    /// Block until the lock is held, polling with jittered backoff.
    ///
    /// Fails with `CoordError::Timeout` once `timeout` has elapsed; nothing is
    /// left behind in that case.
    pub fn acquire(
        &self,
        resource: &str,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<LockGuard, CoordError> {
        let deadline = Deadline::after(timeout);
        let mut backoff = self.backoff.start();
        loop {
            match self.attempt(resource, ttl)? {
                Attempt::Acquired(record) => return Ok(self.guard(resource, record)),
                Attempt::Retry if !deadline.expired() => continue,
                Attempt::Retry | Attempt::Contested => {
                    if !backoff.pause(&deadline) {
                        tracing::debug!(resource, waited = ?deadline.elapsed(), "lock acquire timed out");
                        return Err(CoordError::Timeout {
                            resource: resource.to_string(),
                            waited: deadline.elapsed(),
                        });
                    }
                }
            }
        }
    }

    /// `acquire` with the configured TTL and timeout
    pub fn acquire_default(&self, resource: &str) -> Result<LockGuard, CoordError> {
        self.acquire(resource, self.settings.ttl, self.settings.acquire_timeout)
    }

    /// One non-blocking attempt (reclaiming a stale record counts as part of it)
    pub fn try_acquire(&self, resource: &str, ttl: Duration) -> Result<Option<LockGuard>, CoordError> {
        for _ in 0..2 {
            match self.attempt(resource, ttl)? {
                Attempt::Acquired(record) => return Ok(Some(self.guard(resource, record))),
                Attempt::Retry => continue,
                Attempt::Contested => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Release `resource` if this identity holds it.
    ///
    /// Returns `false` (and changes nothing) when the lock is free or held by
    /// someone else, e.g. after our TTL expired and another process took over.
    pub fn release(&self, resource: &str) -> Result<bool, CoordError> {
        release_at(
            &self.layout.lock_file(resource),
            resource,
            &self.identity.holder_id,
        )
    }

    /// Current record for `resource`, if any (corrupt records read as `None`)
    pub fn holder(&self, resource: &str) -> Result<Option<LockRecord>, CoordError> {
        let observed = observe::<LockRecord>(&self.layout.lock_file(resource))?;
        Ok(observed.and_then(|o| o.record().cloned()))
    }

    /// Run `f` while holding `resource` with the configured TTL and timeout
    pub fn with_lock<R>(&self, resource: &str, f: impl FnOnce() -> R) -> Result<R, CoordError> {
        let guard = self.acquire_default(resource)?;
        let out = f();
        guard.release()?;
        Ok(out)
    }

    fn guard(&self, resource: &str, record: LockRecord) -> LockGuard {
        LockGuard {
            path: self.layout.lock_file(resource),
            resource: resource.to_string(),
            record,
            released: false,
        }
    }

    fn attempt(&self, resource: &str, ttl: Duration) -> Result<Attempt, CoordError> {
        let path = self.layout.lock_file(resource);
        let record = LockRecord::new(resource, &self.identity, self.clock.now_micros(), ttl);
        if publish_json_exclusive(&path, &record)? {
            tracing::debug!(resource, holder = %self.identity.holder_id, "lock acquired");
            return Ok(Attempt::Acquired(record));
        }

        let Some(observed) = observe::<LockRecord>(&path)? else {
            return Ok(Attempt::Retry);
        };
        let Some(reason) = lock_staleness(&observed, &self.clock) else {
            return Ok(Attempt::Contested);
        };

        let stale_holder = observed.record().map(|r| r.holder_id.clone());
        tracing::warn!(resource, ?reason, holder = ?stale_holder, "reclaiming stale lock");
        let reaped = reap_if::<LockRecord, _>(&path, |current| {
            lock_staleness(current, &self.clock).is_some()
        })?;
        Ok(if reaped {
            Attempt::Retry
        } else {
            Attempt::Contested
        })
    }
}

/// Proof of holding a lock; releases on drop
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    resource: String,
    record: LockRecord,
    released: bool,
}

impl LockGuard {
    pub fn record(&self) -> &LockRecord {
        &self.record
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Release now and report whether the lock was still ours
    pub fn release(mut self) -> Result<bool, CoordError> {
        self.released = true;
        release_at(&self.path, &self.resource, &self.record.holder_id)
    }

    /// Keep the lock file after this guard drops (for handing a lock to a later `release` call)
    pub fn leak(mut self) -> LockRecord {
        self.released = true;
        self.record.clone()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = release_at(&self.path, &self.resource, &self.record.holder_id) {
            tracing::warn!(resource = %self.resource, error = %e, "failed to release lock on drop");
        }
    }
}

fn release_at(path: &Path, resource: &str, holder_id: &str) -> Result<bool, CoordError> {
    let owned = matches!(
        observe::<LockRecord>(path)?,
        Some(Observed::Record(ref r)) if r.holder_id == holder_id
    );
    if !owned {
        tracing::debug!(resource, holder = holder_id, "release skipped: not the holder");
        return Ok(false);
    }
    let released = reap_if::<LockRecord, _>(path, |current| {
        current.record().is_some_and(|r| r.holder_id == holder_id)
    })?;
    if released {
        tracing::debug!(resource, holder = holder_id, "lock released");
    }
    Ok(released)
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
