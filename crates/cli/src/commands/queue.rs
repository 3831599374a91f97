// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue commands

use crate::output::{fmt_micros, parse_json, print, print_none, OutputFormat};
use anyhow::{bail, Context};
use clap::{Args, Subcommand};
use fscoord_core::queue::{Claimed, Dispatcher, FailOutcome, HandlerError, Message, ProcessOutcome};
use fscoord_core::{BackoffPolicy, Coordinator};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Args)]
pub struct QueueArgs {
    #[command(subcommand)]
    pub command: QueueCommand,
}

#[derive(Subcommand)]
pub enum QueueCommand {
    /// Add a message to `pending`
    Enqueue {
        /// Topic used for dispatch
        topic: String,
        /// Message payload as JSON
        #[arg(short, long, default_value = "{}")]
        payload: String,
    },
    /// Claim the oldest available message
    Claim {
        /// Wait up to this long for a message (e.g. "5s"); without it, return at once
        #[arg(long, value_parser = humantime::parse_duration)]
        wait: Option<Duration>,
    },
    /// Mark a claimed message as done
    Complete {
        /// Entry name printed by `claim`
        name: String,
    },
    /// Mark a claimed message as failed
    Fail {
        /// Entry name printed by `claim`
        name: String,
        /// Why processing failed
        #[arg(short, long, default_value = "failed")]
        reason: String,
    },
    /// Count messages in each directory
    Stats,
    /// Return abandoned claims to `pending`
    Recover {
        /// Claims older than this are abandoned (defaults to the configured age)
        #[arg(long, value_parser = humantime::parse_duration)]
        max_age: Option<Duration>,
    },
    /// Claim and handle messages until interrupted
    Work {
        /// Topic patterns to handle (':'-separated segments, `*` and `**` wildcards)
        #[arg(long = "topic", default_value = "**")]
        topics: Vec<String>,
        /// Topic patterns whose messages are always failed
        #[arg(long = "fail-topic")]
        fail_topics: Vec<String>,
        /// Stop after handling this many messages
        #[arg(long)]
        max: Option<usize>,
        /// Stop once the queue has been empty for this long
        #[arg(long, value_parser = humantime::parse_duration)]
        exit_when_idle: Option<Duration>,
        /// Longest jittered sleep between polls of an empty queue
        #[arg(long, value_parser = humantime::parse_duration, default_value = "200ms")]
        poll: Duration,
    },
}

#[derive(Serialize)]
struct ClaimInfo {
    name: String,
    id: String,
    topic: String,
    payload: serde_json::Value,
    retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
    enqueued_at: u64,
}

impl From<&Claimed> for ClaimInfo {
    fn from(claimed: &Claimed) -> Self {
        let Message {
            id,
            topic,
            payload,
            retry_count,
            last_error,
            timestamp,
            ..
        } = claimed.message.clone();
        Self {
            name: claimed.name.clone(),
            id,
            topic,
            payload,
            retry_count,
            last_error,
            enqueued_at: timestamp,
        }
    }
}

impl fmt::Display for ClaimInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Claimed: {}", self.name)?;
        writeln!(f, "  Topic: {}", self.topic)?;
        writeln!(f, "  Enqueued: {}", fmt_micros(self.enqueued_at))?;
        if self.retry_count > 0 {
            writeln!(f, "  Retries: {}", self.retry_count)?;
        }
        if let Some(error) = &self.last_error {
            writeln!(f, "  Last error: {}", error)?;
        }
        write!(f, "  Payload: {}", self.payload)
    }
}

#[derive(Serialize)]
struct Enqueued {
    id: String,
    topic: String,
}

impl fmt::Display for Enqueued {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Enqueued {} on topic '{}'", self.id, self.topic)
    }
}

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum Settled {
    Completed { name: String },
    Redelivered { name: String, available_at: u64 },
    DeadLettered { name: String },
}

impl fmt::Display for Settled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Settled::Completed { name } => write!(f, "Completed {}", name),
            Settled::Redelivered { name, available_at } => {
                write!(f, "Requeued as {} (available {})", name, fmt_micros(*available_at))
            }
            Settled::DeadLettered { name } => write!(f, "Dead-lettered {}", name),
        }
    }
}

#[derive(Serialize)]
struct Recovered {
    recovered: usize,
}

impl fmt::Display for Recovered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Recovered {} abandoned claim(s)", self.recovered)
    }
}

pub async fn handle(
    command: QueueCommand,
    coord: &Coordinator,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let queue = coord.queue()?;
    match command {
        QueueCommand::Enqueue { topic, payload } => {
            let id = queue.enqueue(&topic, parse_json(&payload)?)?;
            print(&Enqueued { id, topic }, format);
        }
        QueueCommand::Claim { wait } => {
            let claimed = match wait {
                Some(wait) => match queue.claim_wait(Some(wait)) {
                    Ok(claimed) => Some(claimed),
                    Err(e) if e.is_timeout() => None,
                    Err(e) => return Err(e.into()),
                },
                None => queue.claim()?,
            };
            match claimed {
                Some(claimed) => print(&ClaimInfo::from(&claimed), format),
                None => print_none("No messages available", format),
            }
        }
        QueueCommand::Complete { name } => {
            let claimed = queue
                .claimed(&name)?
                .with_context(|| format!("no claim named {}", name))?;
            if !queue.complete(&claimed)? {
                bail!("claim {} is no longer held", name);
            }
            print(&Settled::Completed { name }, format);
        }
        QueueCommand::Fail { name, reason } => {
            let claimed = queue
                .claimed(&name)?
                .with_context(|| format!("no claim named {}", name))?;
            let settled = match queue.fail(&claimed, &reason)? {
                FailOutcome::Redelivered { name, available_at } => {
                    Settled::Redelivered { name, available_at }
                }
                FailOutcome::DeadLettered => Settled::DeadLettered { name },
                FailOutcome::Lost => bail!("claim {} is no longer held", name),
            };
            print(&settled, format);
        }
        QueueCommand::Stats => print(&queue.stats()?, format),
        QueueCommand::Recover { max_age } => {
            let recovered = match max_age {
                Some(age) => queue.recover_stale(age)?,
                None => queue.recover_stale_default()?,
            };
            print(&Recovered { recovered }, format);
        }
        QueueCommand::Work {
            topics,
            fail_topics,
            max,
            exit_when_idle,
            poll,
        } => {
            let worker = Worker {
                max,
                exit_when_idle,
                poll,
            };
            worker
                .run(coord, dispatcher(&topics, &fail_topics, format), format)
                .await?;
        }
    }
    Ok(())
}

/// Handlers for `work`: print each message, failing the ones on `fail_topics`
fn dispatcher(topics: &[String], fail_topics: &[String], format: OutputFormat) -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    for pattern in fail_topics {
        dispatcher = dispatcher.on(pattern.as_str(), |message| {
            Err(HandlerError::new(format!("topic {} is configured to fail", message.topic)))
        });
    }
    for pattern in topics {
        dispatcher = dispatcher.on(pattern.as_str(), move |message| {
            match format {
                OutputFormat::Text => println!("{} {} {}", message.id, message.topic, message.payload),
                OutputFormat::Json => {
                    let line = serde_json::to_string(message)
                        .map_err(|e| HandlerError::new(e.to_string()))?;
                    println!("{}", line);
                }
            }
            Ok(())
        });
    }
    dispatcher
}

struct Worker {
    max: Option<usize>,
    exit_when_idle: Option<Duration>,
    poll: Duration,
}

impl Worker {
    /// Configured claim backoff, capped so an idle worker still polls every `poll`
    fn idle_policy(&self, base: &BackoffPolicy) -> BackoffPolicy {
        let initial = base.initial.min(self.poll);
        base.clone().with_initial(initial).with_max(self.poll)
    }

    async fn run(
        &self,
        coord: &Coordinator,
        dispatcher: Dispatcher,
        format: OutputFormat,
    ) -> anyhow::Result<()> {
        let queue = Arc::new(coord.queue()?);
        let dispatcher = Arc::new(dispatcher);

        let recovered = queue.recover_stale_default()?;
        if recovered > 0 {
            tracing::info!(recovered, "requeued abandoned claims before starting");
        }

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        let policy = self.idle_policy(&coord.config().backoff);
        let mut backoff = policy.start();
        let mut handled = 0usize;
        let mut idle_since = Instant::now();
        loop {
            if self.max.is_some_and(|max| handled >= max) {
                break;
            }

            let step = tokio::task::spawn_blocking({
                let queue = Arc::clone(&queue);
                let dispatcher = Arc::clone(&dispatcher);
                move || queue.process_next(&dispatcher)
            });
            let processed = tokio::select! {
                _ = &mut shutdown => break,
                result = step => result??,
            };

            match processed {
                Some(processed) => {
                    handled += 1;
                    idle_since = Instant::now();
                    backoff = policy.start();
                    if let ProcessOutcome::Failed(outcome) = &processed.outcome {
                        tracing::warn!(id = %processed.message.id, ?outcome, "message failed");
                    }
                }
                None => {
                    if self.exit_when_idle.is_some_and(|idle| idle_since.elapsed() >= idle) {
                        break;
                    }
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(backoff.next_delay()) => {}
                    }
                }
            }
        }

        if let OutputFormat::Text = format {
            eprintln!("Handled {} message(s)", handled);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
