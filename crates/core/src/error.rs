// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors surfaced by coordination operations
//!
//! Lost races and stale records are handled inside the components and never
//! appear here. What does surface is a deadline miss, an unreadable record,
//! or a filesystem failure.

use crate::config::ConfigError;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordError {
    /// A bounded wait exceeded its deadline; nothing was changed
    #[error("timed out after {waited:?} waiting for {resource}")]
    Timeout { resource: String, waited: Duration },

    /// A record exists but cannot be decoded
    #[error("corrupt record at {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Disk full, permission denied, and the like
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("state machine not initialized at {}", path.display())]
    Uninitialized { path: PathBuf },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CoordError {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn corrupt(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Self::Corrupt {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}
