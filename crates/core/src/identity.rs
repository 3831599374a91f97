// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Caller identity and ID generation
//!
//! Every record a process writes names its owner: a holder id that is unique
//! per participant, plus the host and pid used for same-host liveness checks.

use crate::naming::sanitize;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Generates unique identifiers
pub trait IdGen: Clone + Send + Sync {
    fn next(&self) -> String;
}

/// UUID-based ID generator for production use
#[derive(Clone, Debug, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Sequential ID generator for testing
#[derive(Clone, Debug)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

/// Who is acting: the holder id written into records plus liveness coordinates
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub holder_id: String,
    pub host: String,
    pub pid: u32,
}

impl Identity {
    /// Identity for this process with a fresh, filename-safe holder id
    pub fn current() -> Self {
        Self::generate(&UuidIdGen)
    }

    /// Identity for this process with a holder id drawn from `ids`
    pub fn generate(ids: &impl IdGen) -> Self {
        let host = local_hostname();
        let pid = std::process::id();
        let suffix: String = ids.next().chars().take(8).collect();
        Self {
            holder_id: sanitize(&format!("{}-{}-{}", host, pid, suffix)),
            host,
            pid,
        }
    }

    /// Identity for this process under an explicit holder id
    pub fn named(holder_id: &str) -> Self {
        Self {
            holder_id: sanitize(holder_id),
            host: local_hostname(),
            pid: std::process::id(),
        }
    }

    /// Fully specified identity (tests, or records written on behalf of others)
    pub fn new(holder_id: impl Into<String>, host: impl Into<String>, pid: u32) -> Self {
        Self {
            holder_id: sanitize(&holder_id.into()),
            host: host.into(),
            pid,
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.holder_id, self.host, self.pid)
    }
}

/// Hostname of this machine, or "unknown" if it can't be determined
pub fn local_hostname() -> String {
    static HOST: OnceLock<String> = OnceLock::new();
    HOST.get_or_init(|| {
        nix::unistd::gethostname()
            .ok()
            .and_then(|h| h.into_string().ok())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    })
    .clone()
}

/// Check if a PID is alive on this host using `kill(pid, 0)`.
pub fn pid_is_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    matches!(kill(Pid::from_raw(raw), None), Ok(()) | Err(Errno::EPERM))
}

/// Whether the process behind `host`/`pid` is known to be gone.
///
/// Only answerable on the local host; a remote owner is never reported dead.
pub fn owner_is_dead(host: &str, pid: u32) -> bool {
    host == local_hostname() && !pid_is_alive(pid)
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
