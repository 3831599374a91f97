// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claim-based coordination between unrelated processes
//!
//! This module provides:
//! - **NamedMutex** - Exclusive access with TTL and same-host liveness stale detection
//! - **LeaderElector** - Long-lived single-writer election
//! - **reap** - Race-safe removal of claim records shared by both

pub mod leader;
pub mod lock;
pub mod reap;

pub use leader::{ElectionRecord, LeaderElector};
pub use lock::{lock_staleness, LockGuard, LockRecord, NamedMutex, StaleReason};
pub use reap::{observe, reap_if, seize, Observed, Seized};
