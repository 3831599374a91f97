// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event log: immutable records, by-type index, replay cursors

mod checkpoint;
mod log;
mod record;
mod replay;

pub use checkpoint::Checkpoint;
pub use log::EventLog;
pub use record::{event_id, EventRecord};
pub use replay::Replay;
