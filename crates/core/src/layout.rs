// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk layout under a base directory
//!
//! ```text
//! base/
//!   fscoord.toml
//!   pending/ processing/ completed/ failed/     queue pipeline
//!   locks/<resource>.lock                       named mutexes
//!   locks/<resource>.leader                     elections
//!   events/<ts>-<emitter>.json                  event log
//!   indexes/by_type/<type>/<ts>-<emitter>.json  replay index markers
//!   indexes/by_id/<id>                          de-dup claims
//!   checkpoints/<consumer>.json                 replay cursors
//!   state.json  state.lock  history/            state machine
//! ```

use crate::atomic::ensure_dir;
use crate::error::CoordError;
use crate::naming::sanitize;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    base: PathBuf,
}

impl Layout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn pending(&self) -> PathBuf {
        self.base.join("pending")
    }

    pub fn processing(&self) -> PathBuf {
        self.base.join("processing")
    }

    pub fn completed(&self) -> PathBuf {
        self.base.join("completed")
    }

    pub fn failed(&self) -> PathBuf {
        self.base.join("failed")
    }

    pub fn locks(&self) -> PathBuf {
        self.base.join("locks")
    }

    pub fn lock_file(&self, resource: &str) -> PathBuf {
        self.locks().join(format!("{}.lock", sanitize(resource)))
    }

    pub fn election_file(&self, resource: &str) -> PathBuf {
        self.locks().join(format!("{}.leader", sanitize(resource)))
    }

    pub fn events(&self) -> PathBuf {
        self.base.join("events")
    }

    pub fn by_type(&self) -> PathBuf {
        self.base.join("indexes").join("by_type")
    }

    pub fn type_index(&self, event_type: &str) -> PathBuf {
        self.by_type().join(sanitize(event_type))
    }

    pub fn by_id(&self) -> PathBuf {
        self.base.join("indexes").join("by_id")
    }

    pub fn checkpoint_file(&self, consumer: &str) -> PathBuf {
        self.base
            .join("checkpoints")
            .join(format!("{}.json", sanitize(consumer)))
    }

    pub fn state_file(&self) -> PathBuf {
        self.base.join("state.json")
    }

    pub fn state_lock_file(&self) -> PathBuf {
        self.base.join("state.lock")
    }

    pub fn history(&self) -> PathBuf {
        self.base.join("history")
    }

    /// Create the queue pipeline directories
    pub fn ensure_queue(&self) -> Result<(), CoordError> {
        for dir in [
            self.pending(),
            self.processing(),
            self.completed(),
            self.failed(),
        ] {
            ensure_dir(&dir)?;
        }
        Ok(())
    }

    /// Create the event log directories
    pub fn ensure_events(&self) -> Result<(), CoordError> {
        ensure_dir(&self.events())?;
        ensure_dir(&self.by_type())?;
        ensure_dir(&self.by_id())
    }
}
