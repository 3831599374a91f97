// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tunables shared by every primitive rooted at one base directory
//!
//! Read from `<base>/fscoord.toml` when the file exists:
//!
//! ```toml
//! [lock]
//! ttl = "30s"
//! acquire_timeout = "10s"
//!
//! [backoff]
//! initial = "5ms"
//! max = "500ms"
//!
//! [queue]
//! max_retries = 3
//! retry_delay = "1s"
//!
//! [events]
//! dedup = false
//! ```

use crate::backoff::BackoffPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File name looked up inside the base directory
pub const CONFIG_FILE: &str = "fscoord.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordConfig {
    pub lock: LockSettings,
    pub backoff: BackoffPolicy,
    pub queue: QueueSettings,
    pub election: ElectionSettings,
    pub events: EventSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockSettings {
    /// How long a holder may keep a lock before others may reclaim it
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Default bound for blocking acquires
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueSettings {
    /// Redeliveries allowed before a message is dead-lettered
    pub max_retries: u32,
    /// Whether failed messages are put back into `pending`
    pub redeliver: bool,
    /// Base delay before a redelivered message becomes claimable (doubles per retry)
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    /// Claims older than this are considered abandoned by a crashed worker
    #[serde(with = "humantime_serde")]
    pub stale_after: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            redeliver: true,
            retry_delay: Duration::from_secs(1),
            stale_after: Duration::from_secs(300),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ElectionSettings {
    /// Age after which an election record no longer counts
    #[serde(with = "humantime_serde")]
    pub lease: Duration,
}

impl Default for ElectionSettings {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventSettings {
    /// Collapse emits with identical content ids into one record
    pub dedup: bool,
}

impl CoordConfig {
    /// Load `<base>/fscoord.toml`, falling back to defaults when absent
    pub fn load(base: &Path) -> Result<Self, ConfigError> {
        let path = base.join(CONFIG_FILE);
        match std::fs::read_to_string(&path) {
            Ok(text) => Self::parse(&text).map_err(|source| ConfigError::Parse { path, source }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read { path, source }),
        }
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
