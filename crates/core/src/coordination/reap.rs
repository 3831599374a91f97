// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Removal of claim records that may be contended
//!
//! Deleting a record by path is unsafe when several processes decide at once
//! that it is stale: the slower one would delete the fresh record the faster
//! one just created. Instead the record is renamed to a private tombstone
//! (only one renamer can win), re-judged from the tombstone's content, and
//! linked back into place if it turns out not to be the record we meant to
//! remove.
//!
//! While a record sits in its tombstone the path is empty, and a third process
//! may create a new record there. Restoring then finds the path taken and the
//! displaced record is dropped with a warning. For locks and elections that
//! costs the displaced holder its claim (it finds out on its next check); it
//! never leaves two records in place.

use crate::atomic::{read_record, remove_if_exists, rename_noclobber, Moved};
use crate::error::CoordError;
use crate::naming::TEMP_PREFIX;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What was found at a record path
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Observed<T> {
    Record(T),
    /// Present but undecodable
    Corrupt,
}

impl<T> Observed<T> {
    pub fn record(&self) -> Option<&T> {
        match self {
            Observed::Record(r) => Some(r),
            Observed::Corrupt => None,
        }
    }
}

/// Read a record, folding decode failures into `Observed::Corrupt`
pub fn observe<T: DeserializeOwned>(path: &Path) -> Result<Option<Observed<T>>, CoordError> {
    match read_record(path) {
        Ok(Some(record)) => Ok(Some(Observed::Record(record))),
        Ok(None) => Ok(None),
        Err(CoordError::Corrupt { path, source }) => {
            tracing::warn!(path = %path.display(), error = %source, "corrupt claim record");
            Ok(Some(Observed::Corrupt))
        }
        Err(e) => Err(e),
    }
}

/// A record moved aside to a private tombstone.
///
/// Nobody else can see or touch it until it is restored, moved on, or
/// discarded. Dropping it without a decision leaves the tombstone behind.
#[derive(Debug)]
pub struct Seized<T> {
    origin: PathBuf,
    tombstone: PathBuf,
    observed: Observed<T>,
}

impl<T> Seized<T> {
    pub fn observed(&self) -> &Observed<T> {
        &self.observed
    }

    pub fn record(&self) -> Option<&T> {
        self.observed.record()
    }

    /// Current location of the seized file
    pub fn path(&self) -> &Path {
        &self.tombstone
    }

    /// Put the record back where it was taken from
    pub fn restore(self) -> Result<(), CoordError> {
        match rename_noclobber(&self.tombstone, &self.origin)? {
            Moved::Done | Moved::SourceGone => {}
            Moved::DestinationTaken => {
                tracing::warn!(
                    path = %self.origin.display(),
                    "record replaced while restoring a displaced claim; displaced claim dropped"
                );
                remove_if_exists(&self.tombstone)?;
            }
        }
        Ok(())
    }

    /// Move the record to `to`, never replacing what is there. On
    /// `DestinationTaken` the record is still held.
    pub fn move_to(&self, to: &Path) -> Result<Moved, CoordError> {
        rename_noclobber(&self.tombstone, to)
    }

    pub fn discard(self) -> Result<(), CoordError> {
        remove_if_exists(&self.tombstone)?;
        Ok(())
    }
}

/// Take exclusive hold of the record at `path` by renaming it to a tombstone.
///
/// `None` means the record was already gone (another process seized or
/// removed it). An undecodable record is put back and the error surfaced.
pub fn seize<T: DeserializeOwned>(path: &Path) -> Result<Option<Seized<T>>, CoordError> {
    let tombstone = tombstone_for(path);
    match fs::rename(path, &tombstone) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CoordError::io(path, e)),
    }

    match observe::<T>(&tombstone) {
        Ok(Some(observed)) => Ok(Some(Seized {
            origin: path.to_path_buf(),
            tombstone,
            observed,
        })),
        Ok(None) => Ok(None),
        Err(e) => {
            // Unreadable tombstone: put it back before surfacing the error
            let _ = rename_noclobber(&tombstone, path);
            Err(e)
        }
    }
}

/// Remove the record at `path` if it still satisfies `should_remove`.
///
/// Returns `true` only when this call removed it. `false` means the record was
/// already gone or no longer matched; either way someone else owns the outcome.
pub fn reap_if<T, F>(path: &Path, should_remove: F) -> Result<bool, CoordError>
where
    T: DeserializeOwned,
    F: FnOnce(&Observed<T>) -> bool,
{
    let Some(seized) = seize::<T>(path)? else {
        return Ok(false);
    };
    if should_remove(seized.observed()) {
        seized.discard()?;
        Ok(true)
    } else {
        seized.restore()?;
        Ok(false)
    }
}

fn tombstone_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(
        "{}{}.reap-{}",
        TEMP_PREFIX,
        name,
        uuid::Uuid::new_v4().simple()
    ))
}

#[cfg(test)]
#[path = "reap_tests.rs"]
mod tests;
