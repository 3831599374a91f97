// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work queue over `pending/ processing/ completed/ failed/`

mod dispatch;
mod engine;
mod message;
mod topic;

pub use dispatch::{Dispatch, Dispatcher, HandlerError};
pub use engine::{ProcessOutcome, Processed, QueueEngine};
pub use message::{Claimed, FailOutcome, Message, QueueStats};
pub use topic::TopicPattern;
