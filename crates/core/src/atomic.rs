// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-safe publish of whole files
//!
//! Content is staged in a `.tmp-` sibling, fsync'd, and renamed into place, so
//! a reader sees either the complete old file or the complete new one. The
//! staged file lives in the destination directory because rename is only
//! atomic within one filesystem. If anything fails before the rename, the
//! staged file is removed when it drops.

use crate::error::CoordError;
use crate::naming::TEMP_PREFIX;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically create or replace `path` with `bytes`.
pub fn publish(path: &Path, bytes: &[u8]) -> Result<(), CoordError> {
    let staged = stage(path, bytes)?;
    staged
        .persist(path)
        .map_err(|e| CoordError::io(path, e.error))?;
    sync_parent(path);
    Ok(())
}

/// Atomically create `path` with `bytes` only if it does not exist yet.
///
/// Returns `false` when another writer got there first. Unlike
/// `O_CREAT|O_EXCL` followed by a write, the file is never visible empty.
pub fn publish_exclusive(path: &Path, bytes: &[u8]) -> Result<bool, CoordError> {
    let staged = stage(path, bytes)?;
    match staged.persist_noclobber(path) {
        Ok(_) => {
            sync_parent(path);
            Ok(true)
        }
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(CoordError::io(path, e.error)),
    }
}

/// Serialize `value` as JSON and `publish` it
pub fn publish_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CoordError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    publish(path, &bytes)
}

/// Serialize `value` as JSON and `publish_exclusive` it
pub fn publish_json_exclusive<T: Serialize>(path: &Path, value: &T) -> Result<bool, CoordError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    publish_exclusive(path, &bytes)
}

/// Read and decode a JSON record. A missing file is `Ok(None)`.
pub fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, CoordError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CoordError::io(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| CoordError::corrupt(path, e))
}

/// Remove a file, treating "already gone" as success. Returns whether it existed.
pub fn remove_if_exists(path: &Path) -> Result<bool, CoordError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CoordError::io(path, e)),
    }
}

/// What `rename_noclobber` did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Moved {
    Done,
    /// The source was already gone
    SourceGone,
    /// Something already exists at the destination; the source is untouched
    DestinationTaken,
}

/// Move `from` to `to` without replacing an existing `to`.
///
/// Implemented as link-then-unlink, so `from` must be a name no other process
/// touches (a staged or tombstoned entry) or both names could briefly survive.
pub fn rename_noclobber(from: &Path, to: &Path) -> Result<Moved, CoordError> {
    match fs::hard_link(from, to) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound && !from.exists() => {
            return Ok(Moved::SourceGone)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(Moved::DestinationTaken),
        Err(e) => return Err(CoordError::io(to, e)),
    }
    remove_if_exists(from)?;
    sync_parent(to);
    Ok(Moved::Done)
}

/// Create a directory and its parents
pub fn ensure_dir(path: &Path) -> Result<(), CoordError> {
    fs::create_dir_all(path).map_err(|e| CoordError::io(path, e))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn stage(path: &Path, bytes: &[u8]) -> Result<NamedTempFile, CoordError> {
    let dir = parent_dir(path);
    let mut staged = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| CoordError::io(dir, e))?;
    staged
        .write_all(bytes)
        .map_err(|e| CoordError::io(staged.path(), e))?;
    staged
        .as_file()
        .sync_all()
        .map_err(|e| CoordError::io(staged.path(), e))?;
    Ok(staged)
}

/// Persist the directory entry created by the rename. Some filesystems refuse
/// fsync on directories; the file content itself is already durable.
fn sync_parent(path: &Path) {
    let dir = parent_dir(path);
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!(dir = %dir.display(), error = %e, "directory fsync skipped");
    }
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
