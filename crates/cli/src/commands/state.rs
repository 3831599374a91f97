// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State machine commands

use crate::output::{fmt_micros, parse_json, print, print_list, OutputFormat};
use anyhow::bail;
use clap::{Args, Subcommand};
use fscoord_core::{Coordinator, StateRecord, TransitionOutcome, TransitionRecord};
use serde::Serialize;
use std::fmt;

#[derive(Args)]
pub struct StateArgs {
    #[command(subcommand)]
    pub command: StateCommand,
}

#[derive(Subcommand)]
pub enum StateCommand {
    /// Create the state record if it does not exist yet
    Init {
        /// Initial state label
        #[arg(default_value = "INIT")]
        state: String,
    },
    /// Show the current state
    Get,
    /// Move to a new state
    Transition {
        /// Target state label
        state: String,
        /// Data to store with the new state, as JSON
        #[arg(short, long, default_value = "null")]
        data: String,
        /// Only transition if the current state is one of these
        #[arg(long = "from")]
        from: Vec<String>,
    },
    /// List applied transitions, oldest first
    History,
}

#[derive(Serialize)]
struct StateInfo {
    #[serde(flatten)]
    record: StateRecord,
}

impl fmt::Display for StateInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.record;
        writeln!(f, "State: {} (version {})", r.state, r.record_version)?;
        writeln!(f, "  Updated: {} by {}", fmt_micros(r.updated_at), r.updated_by)?;
        write!(f, "  Data: {}", r.data)
    }
}

#[derive(Serialize)]
struct TransitionInfo {
    #[serde(flatten)]
    record: TransitionRecord,
}

impl fmt::Display for TransitionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.record;
        write!(
            f,
            "{:>4}  {}  {} -> {}  by {}",
            r.record_version,
            fmt_micros(r.timestamp),
            r.from,
            r.to,
            r.actor
        )
    }
}

pub fn handle(command: StateCommand, coord: &Coordinator, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        StateCommand::Init { state } => {
            let machine = coord.attach_state_machine()?;
            if !machine.initialize(&state)? {
                tracing::info!("state machine already initialized");
            }
            print(&StateInfo { record: machine.get_state()? }, format);
        }
        StateCommand::Get => {
            let record = coord.attach_state_machine()?.get_state()?;
            print(&StateInfo { record }, format);
        }
        StateCommand::Transition { state, data, from } => {
            let machine = coord.attach_state_machine()?;
            let data = parse_json(&data)?;
            let outcome = machine.transition(&state, data, |current, _| {
                from.is_empty() || from.iter().any(|f| f == current)
            })?;
            match outcome {
                TransitionOutcome::Applied(record) => print(&StateInfo { record }, format),
                TransitionOutcome::Rejected { current } => {
                    bail!("transition to {} rejected: state is {}", state, current.state)
                }
            }
        }
        StateCommand::History => {
            let history: Vec<_> = coord
                .attach_state_machine()?
                .history()?
                .into_iter()
                .map(|record| TransitionInfo { record })
                .collect();
            print_list(&history, format);
        }
    }
    Ok(())
}
