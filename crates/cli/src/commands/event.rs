// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event log commands

use crate::output::{fmt_micros, parse_json, print, print_list, OutputFormat};
use clap::{Args, Subcommand};
use fscoord_core::{Checkpoint, Coordinator, EventRecord};
use serde::Serialize;
use std::fmt;

#[derive(Args)]
pub struct EventArgs {
    #[command(subcommand)]
    pub command: EventCommand,
}

#[derive(Subcommand)]
pub enum EventCommand {
    /// Append an event
    Emit {
        /// Event type, e.g. "order:created"
        event_type: String,
        /// Event payload as JSON
        #[arg(short, long, default_value = "{}")]
        payload: String,
    },
    /// Print events in timestamp order
    Replay {
        /// Only events at or after this time (RFC 3339 or epoch microseconds)
        #[arg(long, value_parser = parse_since, default_value = "0")]
        since: u64,
        /// Only events of these types
        #[arg(long = "type")]
        types: Vec<String>,
        /// Resume from, and advance, this consumer's checkpoint
        #[arg(long, conflicts_with = "since")]
        consumer: Option<String>,
    },
    /// Recreate missing by-type index entries
    Reindex,
}

#[derive(Serialize)]
struct EventInfo {
    #[serde(flatten)]
    record: EventRecord,
}

impl fmt::Display for EventInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.record;
        write!(
            f,
            "{}  {}  {}  {}",
            fmt_micros(r.timestamp),
            r.event_type,
            r.id,
            r.payload
        )
    }
}

#[derive(Serialize)]
struct Reindexed {
    created: usize,
}

impl fmt::Display for Reindexed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Created {} index entr(ies)", self.created)
    }
}

fn parse_since(raw: &str) -> Result<u64, String> {
    if let Ok(micros) = raw.parse::<u64>() {
        return Ok(micros);
    }
    let at = chrono::DateTime::parse_from_rfc3339(raw).map_err(|e| e.to_string())?;
    u64::try_from(at.timestamp_micros()).map_err(|_| format!("{} is before the epoch", raw))
}

pub fn handle(command: EventCommand, coord: &Coordinator, format: OutputFormat) -> anyhow::Result<()> {
    let log = coord.event_log()?;
    match command {
        EventCommand::Emit {
            event_type,
            payload,
        } => {
            let record = log.emit(&event_type, parse_json(&payload)?)?;
            print(&EventInfo { record }, format);
        }
        EventCommand::Replay {
            since,
            types,
            consumer,
        } => {
            let type_refs: Vec<&str> = types.iter().map(String::as_str).collect();
            let filter = (!type_refs.is_empty()).then_some(type_refs.as_slice());

            let mut checkpoint = match &consumer {
                Some(name) => Some(Checkpoint::load(coord.layout(), name)?),
                None => None,
            };
            let replay = match &checkpoint {
                Some(cp) => log.replay_after(cp, filter)?,
                None => log.replay(since, filter)?,
            };

            let mut events = Vec::new();
            for record in replay {
                let record = record?;
                if let Some(cp) = checkpoint.as_mut() {
                    cp.advance(&record);
                }
                events.push(EventInfo { record });
            }
            print_list(&events, format);

            if let Some(cp) = checkpoint {
                cp.save(coord.layout())?;
            }
        }
        EventCommand::Reindex => {
            let created = log.rebuild_index()?;
            print(&Reindexed { created }, format);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
