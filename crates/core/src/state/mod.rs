// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Guarded state machine with an append-only transition history

mod machine;
mod record;

pub use machine::{ReplicatedStateMachine, STATE_RESOURCE};
pub use record::{StateRecord, TransitionOutcome, TransitionRecord};
