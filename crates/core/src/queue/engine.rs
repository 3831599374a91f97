// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory-pipeline work queue
//!
//! ```text
//! enqueue ──publish──▶ pending/ ──rename (claim)──▶ processing/ ──rename──▶ completed/
//!                         ▲                              │
//!                         └──rename (redeliver)──────────┤
//!                                                        └──rename──▶ failed/
//! ```
//!
//! A claim is a rename out of `pending`; the filesystem lets exactly one
//! renamer succeed, so a message is never handed to two workers. Names sort by
//! enqueue time, which gives FIFO per producer and only approximate FIFO
//! across producers whose clocks disagree.
//!
//! A claim first renames the entry to a private staging name in `processing`
//! and only publishes it under its real name once it carries the claim stamp,
//! so every visible `processing` entry says who holds it and since when.
//! Settling (`complete`, `fail`) and recovery seize the entry and check that
//! stamp before moving it, so a worker whose claim was recovered and handed to
//! someone else cannot settle the new holder's claim.
//!
//! Delivery is at-least-once: a worker that crashes after handling a message
//! but before `complete` leaves it in `processing`, and `recover_stale` will
//! hand it out again.

use super::dispatch::{Dispatch, Dispatcher};
use super::message::{Claimed, FailOutcome, Message, QueueStats};
use crate::atomic::{
    publish_json, publish_json_exclusive, read_record, remove_if_exists, rename_noclobber, Moved,
};
use crate::backoff::{BackoffPolicy, Deadline};
use crate::clock::{Clock, SystemClock};
use crate::config::QueueSettings;
use crate::coordination::{seize, Observed, Seized};
use crate::error::CoordError;
use crate::identity::{owner_is_dead, Identity};
use crate::layout::Layout;
use crate::naming::{
    entry_name, parse_timestamp, sorted_entries, MonotonicStamp, TEMP_PREFIX, TIMESTAMP_WIDTH,
};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const EXT: &str = "msg";

/// Prefix of a claim in flight: renamed out of `pending` but not yet stamped
const STAGED_PREFIX: &str = "claim-";

/// Result of one rename race
enum Claim {
    Won(Claimed),
    /// Another worker renamed it first
    Lost,
    /// We won it but it could not be decoded; it has been quarantined
    Quarantined,
}

/// What `process_next` did with the message it claimed
#[derive(Clone, Debug, PartialEq)]
pub struct Processed {
    pub message: Message,
    pub outcome: ProcessOutcome,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed,
    Failed(FailOutcome),
    /// Completion found the claim already gone
    ClaimLost,
}

#[derive(Clone, Debug)]
pub struct QueueEngine<C: Clock = SystemClock> {
    layout: Layout,
    identity: Identity,
    clock: C,
    stamp: Arc<MonotonicStamp>,
    settings: QueueSettings,
    backoff: BackoffPolicy,
}

impl QueueEngine<SystemClock> {
    pub fn open(layout: &Layout, identity: Identity) -> Result<Self, CoordError> {
        layout.ensure_queue()?;
        Ok(Self {
            layout: layout.clone(),
            identity,
            clock: SystemClock,
            stamp: Arc::new(MonotonicStamp::new()),
            settings: QueueSettings::default(),
            backoff: BackoffPolicy::default(),
        })
    }
}

impl<C: Clock> QueueEngine<C> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> QueueEngine<C2> {
        QueueEngine {
            layout: self.layout,
            identity: self.identity,
            clock,
            stamp: self.stamp,
            settings: self.settings,
            backoff: self.backoff,
        }
    }

    pub fn with_settings(mut self, settings: QueueSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn producer_id(&self) -> &str {
        &self.identity.holder_id
    }

    /// Publish a new message into `pending`. Returns its id.
    ///
    /// Never replaces an existing entry: if another instance with the same
    /// producer id took the name, the message is restamped.
    pub fn enqueue(&self, topic: &str, payload: serde_json::Value) -> Result<String, CoordError> {
        let pending = self.layout.pending();
        let mut timestamp = self.stamp.next(&self.clock);
        loop {
            let name = entry_name(timestamp, self.producer_id(), EXT);
            let id = stem(&name).to_string();
            let message = Message::new(&id, topic, payload.clone(), timestamp, self.producer_id());
            if publish_json_exclusive(&pending.join(&name), &message)? {
                tracing::debug!(id = %id, topic, "enqueued");
                return Ok(id);
            }
            tracing::debug!(name, "entry name taken, restamping");
            timestamp = self.stamp.next_at(timestamp.saturating_add(1));
        }
    }

    /// Claim the oldest available message. Never blocks.
    ///
    /// Entries lost to other workers are skipped; entries whose timestamp is in
    /// the future (delayed redelivery) are not yet available.
    pub fn claim(&self) -> Result<Option<Claimed>, CoordError> {
        let now = self.clock.now_micros();
        for name in sorted_entries(&self.layout.pending(), EXT)? {
            if parse_timestamp(&name).is_some_and(|ts| ts > now) {
                continue;
            }
            match self.claim_entry(&name, now)? {
                Claim::Won(claimed) => return Ok(Some(claimed)),
                Claim::Lost | Claim::Quarantined => continue,
            }
        }
        Ok(None)
    }

    /// Poll `claim` with backoff until a message arrives or `timeout` passes.
    /// `None` waits indefinitely.
    pub fn claim_wait(&self, timeout: Option<Duration>) -> Result<Claimed, CoordError> {
        let deadline = Deadline::from_option(timeout);
        let mut backoff = self.backoff.start();
        loop {
            if let Some(claimed) = self.claim()? {
                return Ok(claimed);
            }
            if !backoff.pause(&deadline) {
                return Err(CoordError::Timeout {
                    resource: "queue".to_string(),
                    waited: deadline.elapsed(),
                });
            }
        }
    }

    /// Look up a claim held in `processing` by entry name, e.g. one made by an
    /// earlier invocation of the same worker
    pub fn claimed(&self, name: &str) -> Result<Option<Claimed>, CoordError> {
        let message = read_record::<Message>(&self.layout.processing().join(name))?;
        Ok(message.map(|message| Claimed {
            name: name.to_string(),
            message,
        }))
    }

    /// Move a claimed message to `completed`. Returns `false` if the claim was
    /// no longer ours.
    pub fn complete(&self, claimed: &Claimed) -> Result<bool, CoordError> {
        let Some(held) = self.seize_claim(claimed)? else {
            tracing::warn!(id = %claimed.message.id, "complete: claim no longer held");
            return Ok(false);
        };
        let placed = self.place(&held, &self.layout.completed(), claimed.name.clone())?;
        if placed.is_some() {
            tracing::debug!(id = %claimed.message.id, "completed");
        }
        Ok(placed.is_some())
    }

    /// Record a processing failure.
    ///
    /// The retry count is bumped and the reason stored. While retries remain
    /// the message goes back to `pending` under a new name that becomes
    /// claimable after `retry_delay * 2^(retries-1)`; otherwise it is parked
    /// in `failed`.
    pub fn fail(&self, claimed: &Claimed, reason: &str) -> Result<FailOutcome, CoordError> {
        let Some(held) = self.seize_claim(claimed)? else {
            tracing::warn!(id = %claimed.message.id, "fail: claim no longer held");
            return Ok(FailOutcome::Lost);
        };

        let mut message = claimed.message.clone();
        message.retry_count += 1;
        message.last_error = Some(reason.to_string());
        message.claimed_at = None;
        message.claimed_by = None;
        // The seized entry is private to us until it is placed
        publish_json(held.path(), &message)?;

        if self.settings.redeliver && message.retry_count <= self.settings.max_retries {
            let delay = self.retry_delay(message.retry_count);
            let delay_micros = u64::try_from(delay.as_micros()).unwrap_or(u64::MAX);
            let at = self
                .stamp
                .next_at(self.clock.now_micros().saturating_add(delay_micros));
            let name = entry_name(at, self.producer_id(), EXT);
            let Some(name) = self.place(&held, &self.layout.pending(), name)? else {
                return Ok(FailOutcome::Lost);
            };
            let available_at = parse_timestamp(&name).unwrap_or(at);
            tracing::info!(
                id = %message.id,
                retry = message.retry_count,
                delay = ?delay,
                reason,
                "redelivering failed message"
            );
            return Ok(FailOutcome::Redelivered { name, available_at });
        }

        if self
            .place(&held, &self.layout.failed(), claimed.name.clone())?
            .is_none()
        {
            return Ok(FailOutcome::Lost);
        }
        tracing::warn!(id = %message.id, retries = message.retry_count, reason, "message dead-lettered");
        Ok(FailOutcome::DeadLettered)
    }

    /// Return claims abandoned by crashed or stalled workers to `pending`.
    ///
    /// A claim is abandoned when its worker is known dead on this host or it
    /// has been held longer than `max_age`. Claims a worker died in the middle
    /// of making are recovered after `max_age` too. Returns how many were
    /// requeued.
    pub fn recover_stale(&self, max_age: Duration) -> Result<usize, CoordError> {
        let processing = self.layout.processing();
        let mut recovered = self.recover_staged(max_age)?;
        for name in sorted_entries(&processing, EXT)? {
            let path = processing.join(&name);
            let message = match read_record::<Message>(&path) {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(CoordError::Corrupt { .. }) => {
                    self.quarantine(&path, &name)?;
                    continue;
                }
                Err(e) => return Err(e),
            };
            if !self.is_abandoned(&message, max_age) {
                continue;
            }

            // Re-judge from the seized copy: it may have been settled or
            // re-claimed since we read it
            let Some(seized) = seize::<Message>(&path)? else {
                continue;
            };
            let abandoned = match seized.observed() {
                Observed::Record(current) => self.is_abandoned(current, max_age),
                Observed::Corrupt => false,
            };
            if !abandoned {
                seized.restore()?;
                continue;
            }
            if self.requeue(&seized, &name)? {
                tracing::warn!(id = %message.id, "recovered abandoned claim");
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    /// `recover_stale` with the configured age
    pub fn recover_stale_default(&self) -> Result<usize, CoordError> {
        self.recover_stale(self.settings.stale_after)
    }

    /// Claim one message, run it through `dispatcher`, and settle it.
    ///
    /// Returns `None` when nothing was available.
    pub fn process_next(&self, dispatcher: &Dispatcher) -> Result<Option<Processed>, CoordError> {
        let Some(claimed) = self.claim()? else {
            return Ok(None);
        };
        Ok(Some(self.settle(claimed, dispatcher)?))
    }

    /// Dispatch an already-claimed message and complete or fail it
    pub fn settle(&self, claimed: Claimed, dispatcher: &Dispatcher) -> Result<Processed, CoordError> {
        let outcome = match dispatcher.dispatch(&claimed.message) {
            Dispatch::Handled { .. } => {
                if self.complete(&claimed)? {
                    ProcessOutcome::Completed
                } else {
                    ProcessOutcome::ClaimLost
                }
            }
            Dispatch::Failed(e) => ProcessOutcome::Failed(self.fail(&claimed, &e.0)?),
            Dispatch::Unrouted => {
                let reason = format!("no handler for topic {}", claimed.message.topic);
                ProcessOutcome::Failed(self.fail(&claimed, &reason)?)
            }
        };
        Ok(Processed {
            message: claimed.message,
            outcome,
        })
    }

    pub fn stats(&self) -> Result<QueueStats, CoordError> {
        Ok(QueueStats {
            pending: sorted_entries(&self.layout.pending(), EXT)?.len(),
            processing: sorted_entries(&self.layout.processing(), EXT)?.len(),
            completed: sorted_entries(&self.layout.completed(), EXT)?.len(),
            failed: sorted_entries(&self.layout.failed(), EXT)?.len(),
        })
    }

    fn retry_delay(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1).min(16);
        self.settings.retry_delay.saturating_mul(1u32 << exponent)
    }

    fn claim_entry(&self, name: &str, now: u64) -> Result<Claim, CoordError> {
        let processing = self.layout.processing();
        let staged = processing.join(staged_name(name, now));
        if !move_entry(&self.layout.pending().join(name), &staged)? {
            tracing::trace!(name, "claim lost to another worker");
            return Ok(Claim::Lost);
        }

        let mut message = match read_record::<Message>(&staged) {
            Ok(Some(message)) => message,
            Ok(None) => return Ok(Claim::Lost),
            Err(CoordError::Corrupt { .. }) => {
                self.quarantine(&staged, name)?;
                return Ok(Claim::Quarantined);
            }
            Err(e) => return Err(e),
        };

        message.claimed_at = Some(now);
        message.claimed_by = Some(self.identity.clone());
        let held = processing.join(name);
        if !publish_json_exclusive(&held, &message)? {
            // A previous holder's copy has not been cleared yet; leave ours
            // pending and let recovery sort out the leftover
            tracing::warn!(name, "entry still held under the same name, putting it back");
            rename_noclobber(&staged, &self.layout.pending().join(name))?;
            return Ok(Claim::Lost);
        }

        // The staged entry is the claim token: if recovery took it while we
        // were stamping, the claim is theirs and our stamped copy goes
        match fs::remove_file(&staged) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let ours = Claimed {
                    name: name.to_string(),
                    message,
                };
                if let Some(copy) = self.seize_claim(&ours)? {
                    copy.discard()?;
                }
                tracing::warn!(name, "claim recovered before it was stamped");
                return Ok(Claim::Lost);
            }
            Err(e) => return Err(CoordError::io(&staged, e)),
        }

        tracing::debug!(id = %message.id, topic = %message.topic, "claimed");
        Ok(Claim::Won(Claimed {
            name: name.to_string(),
            message,
        }))
    }

    /// Seize the `processing` entry for `claimed` if it still carries this
    /// claim's stamp; anything else is put back untouched.
    fn seize_claim(&self, claimed: &Claimed) -> Result<Option<Seized<Message>>, CoordError> {
        let path = self.layout.processing().join(&claimed.name);
        let Some(seized) = seize::<Message>(&path)? else {
            return Ok(None);
        };
        if seized
            .record()
            .is_some_and(|current| same_claim(current, &claimed.message))
        {
            return Ok(Some(seized));
        }
        seized.restore()?;
        Ok(None)
    }

    /// Move a seized entry into `dir` under `name`, or under a later stamp if
    /// that name is taken. `None` when the entry vanished.
    fn place(
        &self,
        seized: &Seized<Message>,
        dir: &Path,
        mut name: String,
    ) -> Result<Option<String>, CoordError> {
        loop {
            match seized.move_to(&dir.join(&name))? {
                Moved::Done => return Ok(Some(name)),
                Moved::SourceGone => return Ok(None),
                Moved::DestinationTaken => {
                    tracing::debug!(name, dir = %dir.display(), "entry name taken, restamping");
                    let after = parse_timestamp(&name).unwrap_or_else(|| self.clock.now_micros());
                    let at = self.stamp.next_at(after.saturating_add(1));
                    name = entry_name(at, self.producer_id(), EXT);
                }
            }
        }
    }

    /// Return a seized entry to `pending` under its own name. If that name is
    /// already pending the entry is a second copy of the same message and is
    /// dropped.
    fn requeue(&self, seized: &Seized<Message>, name: &str) -> Result<bool, CoordError> {
        match seized.move_to(&self.layout.pending().join(name))? {
            Moved::Done => Ok(true),
            Moved::SourceGone => Ok(false),
            Moved::DestinationTaken => {
                tracing::warn!(name, "entry already requeued, dropping the second copy");
                remove_if_exists(seized.path())?;
                Ok(false)
            }
        }
    }

    fn is_abandoned(&self, message: &Message, max_age: Duration) -> bool {
        let dead_owner = message
            .claimed_by
            .as_ref()
            .is_some_and(|o| owner_is_dead(&o.host, o.pid));
        // Claims only become visible already stamped; an unstamped entry was
        // placed by hand and nobody holds it
        let Some(claimed_at) = message.claimed_at else {
            return true;
        };
        dead_owner || self.clock.elapsed_since(claimed_at) > max_age
    }

    /// Requeue claims whose worker died between taking the entry and
    /// stamping it
    fn recover_staged(&self, max_age: Duration) -> Result<usize, CoordError> {
        let processing = self.layout.processing();
        let read = match fs::read_dir(&processing) {
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CoordError::io(&processing, e)),
        };

        let mut recovered = 0;
        for entry in read {
            let entry = entry.map_err(|e| CoordError::io(&processing, e))?;
            let Ok(file_name) = entry.file_name().into_string() else {
                continue;
            };
            let Some((staged_at, name)) = parse_staged(&file_name) else {
                continue;
            };
            if self.clock.elapsed_since(staged_at) <= max_age {
                continue;
            }

            let Some(seized) = seize::<Message>(&processing.join(&file_name))? else {
                continue;
            };
            if matches!(seized.observed(), Observed::Corrupt) {
                seized.move_to(&self.layout.failed().join(format!("{}.corrupt", name)))?;
                continue;
            }
            if self.requeue(&seized, name)? {
                tracing::warn!(name, "recovered interrupted claim");
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    fn quarantine(&self, path: &Path, name: &str) -> Result<(), CoordError> {
        let target = self.layout.failed().join(format!("{}.corrupt", name));
        tracing::warn!(name, "quarantining undecodable message");
        move_entry(path, &target)?;
        Ok(())
    }
}

/// Atomic rename; `false` when the source is already gone (race lost)
fn move_entry(from: &Path, to: &Path) -> Result<bool, CoordError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CoordError::io(from, e)),
    }
}

/// Whether `current` is the same claim as `claimed`: same holder, same stamp
fn same_claim(current: &Message, claimed: &Message) -> bool {
    current.claimed_at.is_some()
        && current.claimed_at == claimed.claimed_at
        && current.claimed_by.as_ref().map(|o| &o.holder_id)
            == claimed.claimed_by.as_ref().map(|o| &o.holder_id)
}

/// `.tmp-claim-<claim time>-<entry name>`, hidden from listings as a temp file
fn staged_name(name: &str, claimed_at: u64) -> String {
    format!(
        "{}{}{:0width$}-{}",
        TEMP_PREFIX,
        STAGED_PREFIX,
        claimed_at,
        name,
        width = TIMESTAMP_WIDTH
    )
}

fn parse_staged(file_name: &str) -> Option<(u64, &str)> {
    let rest = file_name
        .strip_prefix(TEMP_PREFIX)?
        .strip_prefix(STAGED_PREFIX)?;
    let staged_at = parse_timestamp(rest)?;
    let name = &rest[TIMESTAMP_WIDTH + 1..];
    parse_timestamp(name)?;
    Some((staged_at, name))
}

fn stem(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
