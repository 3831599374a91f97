// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named mutex commands

use crate::output::{fmt_micros, print, print_none, OutputFormat};
use anyhow::bail;
use clap::{Args, Subcommand};
use fscoord_core::{Coordinator, LockRecord};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

#[derive(Args)]
pub struct LockArgs {
    #[command(subcommand)]
    pub command: LockCommand,
}

#[derive(Subcommand)]
pub enum LockCommand {
    /// Acquire a lock
    ///
    /// Without --hold the lock is left in place when the command exits. Other
    /// processes on this host will treat it as stale straight away (its pid is
    /// gone); elsewhere it lasts until the TTL runs out.
    Acquire {
        resource: String,
        /// Lock lifetime (defaults to the configured TTL)
        #[arg(long, value_parser = humantime::parse_duration)]
        ttl: Option<Duration>,
        /// Give up after this long (defaults to the configured timeout)
        #[arg(long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,
        /// Hold the lock for this long (or until Ctrl-C), then release it
        #[arg(long, value_parser = humantime::parse_duration)]
        hold: Option<Duration>,
    },
    /// Release a lock held under --id
    Release { resource: String },
    /// Show the current holder
    Show { resource: String },
}

#[derive(Serialize)]
struct LockInfo {
    #[serde(flatten)]
    record: LockRecord,
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.record;
        writeln!(f, "Lock: {}", r.resource)?;
        writeln!(f, "  Holder: {} (pid {} on {})", r.holder_id, r.pid, r.host)?;
        writeln!(f, "  Acquired: {}", fmt_micros(r.acquired_at))?;
        write!(f, "  TTL: {}", humantime::format_duration(r.ttl))
    }
}

#[derive(Serialize)]
struct Released {
    resource: String,
    released: bool,
}

impl fmt::Display for Released {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Released {}", self.resource)
    }
}

pub async fn handle(
    command: LockCommand,
    coord: &Coordinator,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mutex = coord.mutex()?;
    match command {
        LockCommand::Acquire {
            resource,
            ttl,
            timeout,
            hold,
        } => {
            let settings = mutex.settings();
            let guard = mutex.acquire(
                &resource,
                ttl.unwrap_or(settings.ttl),
                timeout.unwrap_or(settings.acquire_timeout),
            )?;
            print(
                &LockInfo {
                    record: guard.record().clone(),
                },
                format,
            );
            match hold {
                Some(hold) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = tokio::time::sleep(hold) => {}
                    }
                    guard.release()?;
                }
                None => {
                    guard.leak();
                }
            }
        }
        LockCommand::Release { resource } => {
            if !mutex.release(&resource)? {
                bail!("{} is not held by {}", resource, mutex.identity().holder_id);
            }
            print(
                &Released {
                    resource,
                    released: true,
                },
                format,
            );
        }
        LockCommand::Show { resource } => match mutex.holder(&resource)? {
            Some(record) => print(&LockInfo { record }, format),
            None => print_none(&format!("{} is free", resource), format),
        },
    }
    Ok(())
}
