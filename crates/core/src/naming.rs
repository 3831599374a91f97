// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sortable entry names: `<zero-padded-timestamp>-<owner-id>.<ext>`
//!
//! Zero padding makes lexicographic order equal numeric order, so a plain
//! sorted directory listing approximates arrival order.

use crate::clock::Clock;
use crate::error::CoordError;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Digits in the timestamp prefix (u64::MAX has 20)
pub const TIMESTAMP_WIDTH: usize = 20;

/// Prefix shared by every in-flight temporary file
pub const TEMP_PREFIX: &str = ".tmp-";

/// Replace anything outside `[A-Za-z0-9_.-]` so the value is safe as a path component
pub fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ if cleaned.starts_with('.') => format!("_{}", &cleaned[1..]),
        _ => cleaned,
    }
}

/// Build an entry name from a timestamp, owner and extension
pub fn entry_name(timestamp_micros: u64, owner: &str, ext: &str) -> String {
    format!(
        "{:0width$}-{}.{}",
        timestamp_micros,
        sanitize(owner),
        ext,
        width = TIMESTAMP_WIDTH
    )
}

/// Timestamp prefix of an entry name, if it has one
pub fn parse_timestamp(name: &str) -> Option<u64> {
    let prefix = name.get(..TIMESTAMP_WIDTH)?;
    if !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if name.as_bytes().get(TIMESTAMP_WIDTH) != Some(&b'-') {
        return None;
    }
    prefix.parse().ok()
}

/// Owner segment of an entry name (between the timestamp and the extension)
pub fn parse_owner(name: &str) -> Option<&str> {
    parse_timestamp(name)?;
    let rest = &name[TIMESTAMP_WIDTH + 1..];
    Some(rest.rsplit_once('.').map_or(rest, |(owner, _)| owner))
}

/// Whether a directory entry is an in-flight temporary file
pub fn is_temp(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX)
}

/// Names in `dir` with extension `ext`, ascending; a missing directory is empty
pub fn sorted_entries(dir: &Path, ext: &str) -> Result<Vec<String>, CoordError> {
    let read = match fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CoordError::io(dir, e)),
    };

    let suffix = format!(".{}", ext);
    let mut names = Vec::new();
    for entry in read {
        let entry = entry.map_err(|e| CoordError::io(dir, e))?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if is_temp(&name) || !name.ends_with(&suffix) {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

/// Strictly increasing timestamps for one writer, even within a clock tick
#[derive(Debug, Default)]
pub struct MonotonicStamp {
    last: AtomicU64,
}

impl MonotonicStamp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next timestamp: the clock's time, bumped past the previous stamp if needed
    pub fn next(&self, clock: &impl Clock) -> u64 {
        self.next_at(clock.now_micros())
    }

    /// Next timestamp no earlier than `at`
    pub fn next_at(&self, at: u64) -> u64 {
        let mut last = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = at.max(last.saturating_add(1));
            match self
                .last
                .compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

#[cfg(test)]
#[path = "naming_tests.rs"]
mod tests;
