// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fscoord-core: coordination primitives built only on atomic filesystem
//! operations (exclusive create, rename, unlink)
//!
//! This crate provides:
//! - Atomic publish of whole files
//! - Named mutexes with TTL and dead-holder recovery
//! - Leader election with leases
//! - A directory-pipeline work queue with exactly-once claim
//! - A guarded state machine with transition history
//! - An append-only event log with indexed replay

pub mod atomic;
pub mod backoff;
pub mod clock;
pub mod config;
pub mod coordination;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod identity;
pub mod layout;
pub mod naming;
pub mod queue;
pub mod state;

pub use backoff::{BackoffPolicy, Deadline};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, CoordConfig};
pub use coordination::{ElectionRecord, LeaderElector, LockGuard, LockRecord, NamedMutex};
pub use coordinator::Coordinator;
pub use error::CoordError;
pub use events::{Checkpoint, EventLog, EventRecord, Replay};
pub use identity::{IdGen, Identity, SequentialIdGen, UuidIdGen};
pub use layout::Layout;
pub use queue::{
    Claimed, Dispatch, Dispatcher, FailOutcome, HandlerError, Message, ProcessOutcome, Processed,
    QueueEngine, QueueStats, TopicPattern,
};
pub use state::{ReplicatedStateMachine, StateRecord, TransitionOutcome, TransitionRecord};
