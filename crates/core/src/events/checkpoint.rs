// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-consumer replay cursor

use super::record::EventRecord;
use crate::atomic::{ensure_dir, publish_json, read_record};
use crate::error::CoordError;
use crate::layout::Layout;
use serde::{Deserialize, Serialize};

/// Where a consumer stopped reading. Resuming yields only entries named
/// strictly after `last_name`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    pub consumer: String,
    /// File name of the last event handled; `None` before the first one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub last_timestamp: u64,
}

impl Checkpoint {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(consumer: impl Into<String>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            consumer: consumer.into(),
            last_name: None,
            last_timestamp: 0,
        }
    }

    /// Saved cursor for `consumer`, or a fresh one if none was saved
    pub fn load(layout: &Layout, consumer: &str) -> Result<Self, CoordError> {
        Ok(read_record(&layout.checkpoint_file(consumer))?.unwrap_or_else(|| Self::new(consumer)))
    }

    pub fn save(&self, layout: &Layout) -> Result<(), CoordError> {
        let path = layout.checkpoint_file(&self.consumer);
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        publish_json(&path, self)
    }

    /// Move past `record`. Never moves backwards.
    pub fn advance(&mut self, record: &EventRecord) {
        let name = record.file_name();
        if self.last_name.as_deref().is_some_and(|last| last >= name.as_str()) {
            return;
        }
        self.last_name = Some(name);
        self.last_timestamp = record.timestamp;
    }

    /// Whether an entry name lies beyond this cursor
    pub fn is_after(&self, name: &str) -> bool {
        self.last_name.as_deref().is_none_or(|last| name > last)
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
