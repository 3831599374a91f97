// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::record::EventRecord;
use crate::atomic::read_record;
use crate::error::CoordError;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Lazy pass over a snapshot of event names.
///
/// The set of names is fixed when the replay starts, so the iterator is finite
/// even while emitters keep appending. Records are read one at a time as the
/// iterator advances. Missing or undecodable records are skipped with a
/// warning; only IO failures surface as `Err` items.
#[derive(Debug)]
pub struct Replay {
    dir: PathBuf,
    names: std::vec::IntoIter<String>,
    types: Option<BTreeSet<String>>,
}

impl Replay {
    pub(super) fn new(dir: PathBuf, names: Vec<String>, types: Option<BTreeSet<String>>) -> Self {
        Self {
            dir,
            names: names.into_iter(),
            types,
        }
    }

    /// Names not yet visited
    pub fn remaining(&self) -> usize {
        self.names.len()
    }
}

impl Iterator for Replay {
    type Item = Result<EventRecord, CoordError>;

    fn next(&mut self) -> Option<Self::Item> {
        for name in self.names.by_ref() {
            let path = self.dir.join(&name);
            match read_record::<EventRecord>(&path) {
                Ok(Some(record)) => {
                    // Index directories are keyed by sanitized type; check the real one
                    if let Some(types) = &self.types {
                        if !types.contains(&record.event_type) {
                            continue;
                        }
                    }
                    return Some(Ok(record));
                }
                Ok(None) => {
                    tracing::warn!(name = %name, "indexed event has no record, skipping");
                }
                Err(CoordError::Corrupt { path, source }) => {
                    tracing::warn!(path = %path.display(), error = %source, "skipping corrupt event");
                }
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.names.len()))
    }
}
