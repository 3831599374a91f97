// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Guarded read-modify-write over `state.json`
//!
//! Writers serialize on the `state` named mutex, which survives holder crashes
//! through its TTL, and additionally hold an exclusive `flock` on
//! `state.lock` while they touch the record so readers taking the shared
//! lock never interleave with a write in progress.
//!
//! A transition appends its history entry before replacing the state record.
//! If a writer dies between the two steps the next writer finds a history tip
//! newer than the record and rolls the record forward before doing anything
//! else.

use super::record::{StateRecord, TransitionOutcome, TransitionRecord};
use crate::atomic::{ensure_dir, publish_json, publish_json_exclusive, read_record};
use crate::backoff::BackoffPolicy;
use crate::clock::{Clock, SystemClock};
use crate::config::LockSettings;
use crate::coordination::NamedMutex;
use crate::error::CoordError;
use crate::identity::Identity;
use crate::layout::Layout;
use crate::naming::{entry_name, sorted_entries, MonotonicStamp};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::sync::Arc;

/// Named mutex resource guarding every transition
pub const STATE_RESOURCE: &str = "state";

const EXT: &str = "json";

#[derive(Clone, Debug)]
pub struct ReplicatedStateMachine<C: Clock = SystemClock> {
    layout: Layout,
    identity: Identity,
    clock: C,
    stamp: Arc<MonotonicStamp>,
    mutex: NamedMutex<C>,
}

impl ReplicatedStateMachine<SystemClock> {
    /// Open the machine, creating the record in `initial_state` if none exists.
    ///
    /// An existing record is left alone whatever its state.
    pub fn open(layout: &Layout, identity: Identity, initial_state: &str) -> Result<Self, CoordError> {
        let machine = Self::attach(layout, identity)?;
        machine.initialize(initial_state)?;
        Ok(machine)
    }

    /// Open without initializing; reads fail with `Uninitialized` until
    /// some process has called `open`.
    pub fn attach(layout: &Layout, identity: Identity) -> Result<Self, CoordError> {
        ensure_dir(layout.base())?;
        ensure_dir(&layout.history())?;
        Ok(Self {
            layout: layout.clone(),
            mutex: NamedMutex::open(layout, identity.clone())?,
            identity,
            clock: SystemClock,
            stamp: Arc::new(MonotonicStamp::new()),
        })
    }
}

impl<C: Clock> ReplicatedStateMachine<C> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> ReplicatedStateMachine<C2> {
        ReplicatedStateMachine {
            layout: self.layout,
            identity: self.identity,
            mutex: self.mutex.with_clock(clock.clone()),
            clock,
            stamp: self.stamp,
        }
    }

    /// TTL and wait bound for the `state` mutex
    pub fn with_lock_settings(mut self, settings: LockSettings) -> Self {
        self.mutex = self.mutex.with_settings(settings);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.mutex = self.mutex.with_backoff(backoff);
        self
    }

    /// Create the record in `state` unless one already exists.
    /// Returns whether this call created it.
    pub fn initialize(&self, state: &str) -> Result<bool, CoordError> {
        let record = StateRecord::initial(state, self.clock.now_micros(), &self.identity.holder_id);
        let created = publish_json_exclusive(&self.layout.state_file(), &record)?;
        if created {
            tracing::info!(state, "state machine initialized");
        }
        Ok(created)
    }

    /// Current record, read under the shared lock
    pub fn get_state(&self) -> Result<StateRecord, CoordError> {
        let lock = self.lock_file()?;
        lock.lock_shared()
            .map_err(|e| CoordError::io(self.layout.state_lock_file(), e))?;
        let record = self.read_current();
        drop(lock);
        record
    }

    /// Move to `new_state` if `guard` accepts the current state and data.
    ///
    /// The guard sees a record read after every lock is held, so a decision
    /// made on it cannot be invalidated by a concurrent writer. A rejection
    /// writes nothing. Waiting for the mutex is bounded by the lock settings'
    /// acquire timeout.
    pub fn transition<G>(
        &self,
        new_state: &str,
        data: serde_json::Value,
        guard: G,
    ) -> Result<TransitionOutcome, CoordError>
    where
        G: FnOnce(&str, &serde_json::Value) -> bool,
    {
        let held = self.mutex.acquire_default(STATE_RESOURCE)?;
        let lock = self.lock_file()?;
        lock.lock_exclusive()
            .map_err(|e| CoordError::io(self.layout.state_lock_file(), e))?;

        let current = self.roll_forward(self.read_current()?)?;
        if !guard(&current.state, &current.data) {
            tracing::info!(from = %current.state, to = new_state, "transition rejected by guard");
            drop(lock);
            held.release()?;
            return Ok(TransitionOutcome::Rejected { current });
        }

        // History names must sort after the tip even if our clock lags the last writer's
        let timestamp = self
            .stamp
            .next_at(self.clock.now_micros().max(current.updated_at.saturating_add(1)));
        let transition = TransitionRecord {
            version: TransitionRecord::CURRENT_VERSION,
            from: current.state.clone(),
            to: new_state.to_string(),
            data,
            timestamp,
            actor: self.identity.holder_id.clone(),
            record_version: current.record_version + 1,
        };
        let entry = self
            .layout
            .history()
            .join(entry_name(timestamp, &self.identity.holder_id, EXT));
        if !publish_json_exclusive(&entry, &transition)? {
            return Err(CoordError::io(
                &entry,
                io::Error::new(io::ErrorKind::AlreadyExists, "history entry already exists"),
            ));
        }

        let next = StateRecord::after(&transition);
        publish_json(&self.layout.state_file(), &next)?;
        tracing::info!(
            from = %transition.from,
            to = %transition.to,
            record_version = next.record_version,
            "state transition applied"
        );

        drop(lock);
        held.release()?;
        Ok(TransitionOutcome::Applied(next))
    }

    /// Every transition, oldest first. Undecodable entries are skipped.
    pub fn history(&self) -> Result<Vec<TransitionRecord>, CoordError> {
        let dir = self.layout.history();
        let mut out = Vec::new();
        for name in sorted_entries(&dir, EXT)? {
            match read_record::<TransitionRecord>(&dir.join(&name)) {
                Ok(Some(record)) => out.push(record),
                Ok(None) => {}
                Err(CoordError::Corrupt { path, source }) => {
                    tracing::warn!(path = %path.display(), error = %source, "skipping corrupt history entry");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    fn read_current(&self) -> Result<StateRecord, CoordError> {
        let path = self.layout.state_file();
        read_record(&path)?.ok_or(CoordError::Uninitialized { path })
    }

    /// Apply a history tip the state record has not caught up with.
    ///
    /// Undecodable entries at the tip are quarantined so that one damaged
    /// file does not block every later transition.
    fn roll_forward(&self, current: StateRecord) -> Result<StateRecord, CoordError> {
        let dir = self.layout.history();
        let mut last = None;
        for name in sorted_entries(&dir, EXT)?.into_iter().rev() {
            let path = dir.join(&name);
            match read_record::<TransitionRecord>(&path) {
                Ok(Some(record)) => {
                    last = Some(record);
                    break;
                }
                Ok(None) => {}
                Err(CoordError::Corrupt { path, source }) => {
                    tracing::warn!(path = %path.display(), error = %source, "quarantining corrupt history entry");
                    let target = dir.join(format!("{}.corrupt", name));
                    fs::rename(&path, &target).map_err(|e| CoordError::io(&path, e))?;
                }
                Err(e) => return Err(e),
            }
        }
        let Some(last) = last else {
            return Ok(current);
        };
        if last.record_version <= current.record_version {
            return Ok(current);
        }

        tracing::warn!(
            state = %last.to,
            record_version = last.record_version,
            "rolling state forward from history"
        );
        let record = StateRecord::after(&last);
        publish_json(&self.layout.state_file(), &record)?;
        Ok(record)
    }

    fn lock_file(&self) -> Result<File, CoordError> {
        let path = self.layout.state_lock_file();
        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| CoordError::io(&path, e))
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
