// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fscoord - filesystem coordination CLI

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{event, leader, lock, queue, state};
use fscoord_core::{Coordinator, Identity};
use output::OutputFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "fscoord",
    version,
    about = "fscoord - Coordination primitives on a shared directory"
)]
struct Cli {
    /// Base directory shared by all participants
    #[arg(long, global = true, env = "FSCOORD_BASE", default_value = ".fscoord")]
    base: PathBuf,

    /// Holder id to act as (defaults to a fresh id for this process)
    #[arg(long, global = true, env = "FSCOORD_ID")]
    id: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Work queue operations
    Queue(queue::QueueArgs),
    /// Named mutex operations
    Lock(lock::LockArgs),
    /// Leader election
    Leader(leader::LeaderArgs),
    /// Replicated state machine
    State(state::StateArgs),
    /// Event log
    Event(event::EventArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();

    let identity = cli
        .id
        .as_deref()
        .map_or_else(Identity::current, Identity::named);
    let coord = Coordinator::open(&cli.base)
        .with_context(|| format!("opening {}", cli.base.display()))?
        .with_identity(identity);

    match cli.command {
        Commands::Queue(args) => queue::handle(args.command, &coord, cli.format).await,
        Commands::Lock(args) => lock::handle(args.command, &coord, cli.format).await,
        Commands::Leader(args) => leader::handle(args.command, &coord, cli.format),
        Commands::State(args) => state::handle(args.command, &coord, cli.format),
        Commands::Event(args) => event::handle(args.command, &coord, cli.format),
    }
}

/// Log to stderr so stdout stays clean for command output
fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
