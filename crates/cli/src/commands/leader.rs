// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Leader election commands

use crate::output::{fmt_micros, print, print_none, OutputFormat};
use anyhow::bail;
use clap::{Args, Subcommand};
use fscoord_core::{Coordinator, ElectionRecord};
use serde::Serialize;
use std::fmt;

#[derive(Args)]
pub struct LeaderArgs {
    #[command(subcommand)]
    pub command: LeaderCommand,
}

#[derive(Subcommand)]
pub enum LeaderCommand {
    /// Try once to become leader; exits non-zero if someone else leads
    Elect { resource: String },
    /// Show the current leader
    Show { resource: String },
    /// Restart the lease if still leading under --id
    Renew { resource: String },
    /// Step down if leading under --id
    Abdicate { resource: String },
}

#[derive(Serialize)]
struct LeaderInfo {
    #[serde(flatten)]
    record: ElectionRecord,
}

impl fmt::Display for LeaderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.record;
        writeln!(f, "Leader of {}: {}", r.resource, r.leader_id)?;
        writeln!(f, "  Process: pid {} on {}", r.pid, r.host)?;
        writeln!(f, "  Since: {}", fmt_micros(r.acquired_at))?;
        write!(f, "  Lease: {}", humantime::format_duration(r.lease))
    }
}

pub fn handle(command: LeaderCommand, coord: &Coordinator, format: OutputFormat) -> anyhow::Result<()> {
    let elector = coord.elector()?;
    match command {
        LeaderCommand::Elect { resource } => {
            if !elector.try_become_leader(&resource)? {
                let current = elector
                    .get_current_leader(&resource)?
                    .map_or_else(|| "unknown".to_string(), |r| r.leader_id);
                bail!("not elected: {} is led by {}", resource, current);
            }
            if let Some(record) = elector.get_current_leader(&resource)? {
                print(&LeaderInfo { record }, format);
            }
        }
        LeaderCommand::Show { resource } => match elector.get_current_leader(&resource)? {
            Some(record) => print(&LeaderInfo { record }, format),
            None => print_none(&format!("{} has no leader", resource), format),
        },
        LeaderCommand::Renew { resource } => {
            if !elector.renew(&resource)? {
                bail!("{} is not led by {}", resource, elector.identity().holder_id);
            }
            if let Some(record) = elector.get_current_leader(&resource)? {
                print(&LeaderInfo { record }, format);
            }
        }
        LeaderCommand::Abdicate { resource } => {
            if !elector.abdicate(&resource)? {
                bail!("{} is not led by {}", resource, elector.identity().holder_id);
            }
            print_none(&format!("Abdicated {}", resource), format);
        }
    }
    Ok(())
}
