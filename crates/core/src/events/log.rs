// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only event log with a by-type index
//!
//! Every event is its own immutable file in `events/`. An empty marker with
//! the same name under `indexes/by_type/<type>/` lets a filtered replay list
//! just the types it wants. The marker is written after the record, so a
//! crash can leave an event unindexed but never a marker without a record.
//! `rebuild_index` repairs the former.

use super::checkpoint::Checkpoint;
use super::record::EventRecord;
use super::replay::Replay;
use crate::atomic::{
    ensure_dir, publish, publish_exclusive, publish_json, publish_json_exclusive, read_record,
};
use crate::clock::{Clock, SystemClock};
use crate::config::EventSettings;
use crate::error::CoordError;
use crate::identity::Identity;
use crate::layout::Layout;
use crate::naming::{parse_owner, parse_timestamp, sorted_entries, MonotonicStamp};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::sync::Arc;

const EXT: &str = "json";

#[derive(Clone, Debug)]
pub struct EventLog<C: Clock = SystemClock> {
    layout: Layout,
    identity: Identity,
    clock: C,
    stamp: Arc<MonotonicStamp>,
    settings: EventSettings,
}

impl EventLog<SystemClock> {
    pub fn open(layout: &Layout, identity: Identity) -> Result<Self, CoordError> {
        layout.ensure_events()?;
        Ok(Self {
            layout: layout.clone(),
            identity,
            clock: SystemClock,
            stamp: Arc::new(MonotonicStamp::new()),
            settings: EventSettings::default(),
        })
    }
}

impl<C: Clock> EventLog<C> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> EventLog<C2> {
        EventLog {
            layout: self.layout,
            identity: self.identity,
            clock,
            stamp: self.stamp,
            settings: self.settings,
        }
    }

    pub fn with_settings(mut self, settings: EventSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn emitter_id(&self) -> &str {
        &self.identity.holder_id
    }

    /// Append an event and index it by type.
    ///
    /// With de-duplication on, an event whose content id was already emitted
    /// is not written again; the earlier record is returned instead. A record
    /// is never replaced: if another instance with the same emitter id took
    /// the name, the event is restamped and keeps its id.
    pub fn emit(
        &self,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<EventRecord, CoordError> {
        let timestamp = self.stamp.next(&self.clock);
        let mut record = EventRecord::new(event_type, payload, timestamp, self.emitter_id());

        if self.settings.dedup {
            if let Some(existing) = self.claim_id(&record)? {
                tracing::debug!(id = %existing.id, event_type, "duplicate event suppressed");
                return Ok(existing);
            }
        }

        let name = loop {
            let name = record.file_name();
            if publish_json_exclusive(&self.layout.events().join(&name), &record)? {
                break name;
            }
            tracing::debug!(name, "event name taken, restamping");
            record.timestamp = self.stamp.next_at(record.timestamp.saturating_add(1));
            if self.settings.dedup {
                // The id claim is ours; point it at the new name
                publish(&self.layout.by_id().join(&record.id), record.file_name().as_bytes())?;
            }
        };
        self.index(&record.event_type, &name)?;
        tracing::debug!(id = %record.id, event_type, "event emitted");
        Ok(record)
    }

    /// Events with timestamp at or after `from_micros`, oldest first,
    /// optionally restricted to `types`.
    pub fn replay(&self, from_micros: u64, types: Option<&[&str]>) -> Result<Replay, CoordError> {
        self.replay_where(types, |name| {
            parse_timestamp(name).is_some_and(|ts| ts >= from_micros)
        })
    }

    /// Events after the consumer's checkpoint
    pub fn replay_after(
        &self,
        checkpoint: &Checkpoint,
        types: Option<&[&str]>,
    ) -> Result<Replay, CoordError> {
        self.replay_where(types, |name| checkpoint.is_after(name))
    }

    /// Write any by-type markers missing for records in `events/`.
    /// Returns how many were created.
    pub fn rebuild_index(&self) -> Result<usize, CoordError> {
        let events = self.layout.events();
        let mut created = 0;
        for name in sorted_entries(&events, EXT)? {
            let record = match read_record::<EventRecord>(&events.join(&name)) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(CoordError::Corrupt { path, source }) => {
                    tracing::warn!(path = %path.display(), error = %source, "not indexing corrupt event");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if !self.layout.type_index(&record.event_type).join(&name).exists() {
                self.index(&record.event_type, &name)?;
                created += 1;
            }
        }
        if created > 0 {
            tracing::info!(created, "rebuilt event index markers");
        }
        Ok(created)
    }

    /// Event types that have an index directory
    pub fn indexed_types(&self) -> Result<Vec<String>, CoordError> {
        let dir = self.layout.by_type();
        let read = match fs::read_dir(&dir) {
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CoordError::io(&dir, e)),
        };
        let mut types = Vec::new();
        for entry in read {
            let entry = entry.map_err(|e| CoordError::io(&dir, e))?;
            if let Ok(name) = entry.file_name().into_string() {
                types.push(name);
            }
        }
        types.sort();
        Ok(types)
    }

    fn replay_where(
        &self,
        types: Option<&[&str]>,
        keep: impl Fn(&str) -> bool,
    ) -> Result<Replay, CoordError> {
        let (names, filter) = match types {
            None => (sorted_entries(&self.layout.events(), EXT)?, None),
            Some(types) => {
                let mut merged = BTreeSet::new();
                for event_type in types {
                    merged.extend(sorted_entries(&self.layout.type_index(event_type), EXT)?);
                }
                let wanted = types.iter().map(|t| t.to_string()).collect();
                (merged.into_iter().collect(), Some(wanted))
            }
        };
        let names = names.into_iter().filter(|n| keep(n)).collect();
        Ok(Replay::new(self.layout.events(), names, filter))
    }

    fn index(&self, event_type: &str, name: &str) -> Result<(), CoordError> {
        let dir = self.layout.type_index(event_type);
        ensure_dir(&dir)?;
        publish(&dir.join(name), b"")
    }

    /// Claim `indexes/by_id/<id>` for this record. Returns the earlier record
    /// when the id was already claimed.
    fn claim_id(&self, record: &EventRecord) -> Result<Option<EventRecord>, CoordError> {
        let marker = self.layout.by_id().join(&record.id);
        if publish_exclusive(&marker, record.file_name().as_bytes())? {
            return Ok(None);
        }

        let existing_name = fs::read_to_string(&marker).map_err(|e| CoordError::io(&marker, e))?;
        let existing_name = existing_name.trim();
        let existing_path = self.layout.events().join(existing_name);
        let mut recovered = record.clone();
        if let (Some(ts), Some(owner)) = (parse_timestamp(existing_name), parse_owner(existing_name)) {
            recovered.timestamp = ts;
            recovered.emitter = owner.to_string();
        }
        match read_record::<EventRecord>(&existing_path) {
            Ok(Some(existing)) if existing.id == record.id => Ok(Some(existing)),
            // The name belongs to another event: the claimant is restamping
            // and will write the record itself
            Ok(Some(_)) => Ok(Some(recovered)),
            // Claimed but never written (the claimant crashed or is still
            // writing); write it under the claimant's name
            Ok(None) => {
                tracing::warn!(id = %record.id, "writing event left unwritten by its claimant");
                if !publish_json_exclusive(&existing_path, &recovered)? {
                    tracing::debug!(id = %record.id, "claimant wrote the event meanwhile");
                }
                self.index(&recovered.event_type, existing_name)?;
                Ok(Some(recovered))
            }
            Err(CoordError::Corrupt { .. }) => {
                tracing::warn!(id = %record.id, "replacing corrupt event record");
                publish_json(&existing_path, &recovered)?;
                self.index(&recovered.event_type, existing_name)?;
                Ok(Some(recovered))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
