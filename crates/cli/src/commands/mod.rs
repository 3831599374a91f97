// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod event;
pub mod leader;
pub mod lock;
pub mod queue;
pub mod state;
