// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-writer leader election
//!
//! Same create-exclusive idiom as `NamedMutex`, but the record is meant to
//! live as long as the leader does. Nothing renews it automatically: a
//! supervisor re-validates with `is_leader` and calls `renew` within the
//! lease, and followers retry `try_become_leader` to fail over.

use super::reap::{observe, reap_if, seize, Observed};
use crate::atomic::{ensure_dir, publish_json_exclusive};
use crate::clock::{Clock, SystemClock};
use crate::error::CoordError;
use crate::identity::{owner_is_dead, Identity};
use crate::layout::Layout;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Contents of an election file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionRecord {
    pub version: u32,
    pub resource: String,
    pub leader_id: String,
    pub host: String,
    pub pid: u32,
    /// Microseconds since the Unix epoch
    pub acquired_at: u64,
    #[serde(with = "humantime_serde")]
    pub lease: Duration,
}

impl ElectionRecord {
    pub const CURRENT_VERSION: u32 = 1;

    fn new(resource: &str, leader: &Identity, acquired_at: u64, lease: Duration) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            resource: resource.to_string(),
            leader_id: leader.holder_id.clone(),
            host: leader.host.clone(),
            pid: leader.pid,
            acquired_at,
            lease,
        }
    }

    pub fn is_expired(&self, clock: &impl Clock) -> bool {
        clock.elapsed_since(self.acquired_at) > self.lease
    }
}

fn election_is_stale(observed: &Observed<ElectionRecord>, clock: &impl Clock) -> bool {
    match observed {
        Observed::Corrupt => true,
        Observed::Record(r) => r.is_expired(clock) || owner_is_dead(&r.host, r.pid),
    }
}

#[derive(Clone, Debug)]
pub struct LeaderElector<C: Clock = SystemClock> {
    layout: Layout,
    identity: Identity,
    clock: C,
    lease: Duration,
}

impl LeaderElector<SystemClock> {
    pub fn open(layout: &Layout, identity: Identity, lease: Duration) -> Result<Self, CoordError> {
        ensure_dir(&layout.locks())?;
        Ok(Self {
            layout: layout.clone(),
            identity,
            clock: SystemClock,
            lease,
        })
    }
}

impl<C: Clock> LeaderElector<C> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> LeaderElector<C2> {
        LeaderElector {
            layout: self.layout,
            identity: self.identity,
            clock,
            lease: self.lease,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Claim leadership of `resource` if nobody live holds it. Never blocks.
    ///
    /// Returns `true` when this identity is (now) the leader.
    pub fn try_become_leader(&self, resource: &str) -> Result<bool, CoordError> {
        let path = self.layout.election_file(resource);
        for _ in 0..2 {
            let record = ElectionRecord::new(
                resource,
                &self.identity,
                self.clock.now_micros(),
                self.lease,
            );
            if publish_json_exclusive(&path, &record)? {
                tracing::info!(resource, leader = %self.identity.holder_id, "became leader");
                return Ok(true);
            }

            let Some(observed) = observe::<ElectionRecord>(&path)? else {
                continue;
            };
            if let Observed::Record(current) = &observed {
                if current.leader_id == self.identity.holder_id && !current.is_expired(&self.clock) {
                    return Ok(true);
                }
            }
            if !election_is_stale(&observed, &self.clock) {
                return Ok(false);
            }

            tracing::warn!(
                resource,
                previous = ?observed.record().map(|r| &r.leader_id),
                "taking over stale election"
            );
            if !reap_if::<ElectionRecord, _>(&path, |o| election_is_stale(o, &self.clock))? {
                return Ok(false);
            }
        }
        Ok(false)
    }

    /// Whoever the election file names, expired or not
    pub fn get_current_leader(&self, resource: &str) -> Result<Option<ElectionRecord>, CoordError> {
        let observed = observe::<ElectionRecord>(&self.layout.election_file(resource))?;
        Ok(observed.and_then(|o| o.record().cloned()))
    }

    /// Whether this identity holds an unexpired election for `resource`
    pub fn is_leader(&self, resource: &str) -> Result<bool, CoordError> {
        Ok(self.get_current_leader(resource)?.is_some_and(|r| {
            r.leader_id == self.identity.holder_id && !r.is_expired(&self.clock)
        }))
    }

    /// Restart the lease. Refused once the lease has already run out, since a
    /// follower may be taking over at that point.
    ///
    /// The record is seized before it is judged, so a follower that reaped it
    /// in the meantime keeps its own record and this call returns `false`.
    pub fn renew(&self, resource: &str) -> Result<bool, CoordError> {
        let path = self.layout.election_file(resource);
        let Some(seized) = seize::<ElectionRecord>(&path)? else {
            return Ok(false);
        };
        let ours = seized.record().is_some_and(|r| {
            r.leader_id == self.identity.holder_id && !r.is_expired(&self.clock)
        });
        if !ours {
            seized.restore()?;
            return Ok(false);
        }

        let record = ElectionRecord::new(
            resource,
            &self.identity,
            self.clock.now_micros(),
            self.lease,
        );
        let renewed = publish_json_exclusive(&path, &record)?;
        seized.discard()?;
        if renewed {
            tracing::debug!(resource, "leadership renewed");
        } else {
            tracing::warn!(resource, "leadership taken over while renewing");
        }
        Ok(renewed)
    }

    /// Step down if this identity is the recorded leader
    pub fn abdicate(&self, resource: &str) -> Result<bool, CoordError> {
        let path = self.layout.election_file(resource);
        let removed = reap_if::<ElectionRecord, _>(&path, |o| {
            o.record()
                .is_some_and(|r| r.leader_id == self.identity.holder_id)
        })?;
        if removed {
            tracing::info!(resource, leader = %self.identity.holder_id, "abdicated");
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "leader_tests.rs"]
mod tests;
