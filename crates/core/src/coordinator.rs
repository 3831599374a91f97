// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One base directory, one configuration, one identity
//!
//! `Coordinator` hands out each primitive already pointed at the same base
//! directory and tuned from `fscoord.toml`, so callers do not have to thread
//! settings through by hand.

use crate::config::CoordConfig;
use crate::coordination::{LeaderElector, NamedMutex};
use crate::error::CoordError;
use crate::events::EventLog;
use crate::identity::Identity;
use crate::layout::Layout;
use crate::queue::QueueEngine;
use crate::state::ReplicatedStateMachine;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Coordinator {
    layout: Layout,
    config: CoordConfig,
    identity: Identity,
}

impl Coordinator {
    /// Coordinator for `base`, reading `<base>/fscoord.toml` if present
    pub fn open(base: impl Into<PathBuf>) -> Result<Self, CoordError> {
        let layout = Layout::new(base);
        let config = CoordConfig::load(layout.base())?;
        Ok(Self::with_config(layout, config))
    }

    pub fn with_config(layout: Layout, config: CoordConfig) -> Self {
        Self {
            layout,
            config,
            identity: Identity::current(),
        }
    }

    /// Act under `identity` instead of a freshly generated one
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &CoordConfig {
        &self.config
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn mutex(&self) -> Result<NamedMutex, CoordError> {
        Ok(NamedMutex::open(&self.layout, self.identity.clone())?
            .with_settings(self.config.lock.clone())
            .with_backoff(self.config.backoff.clone()))
    }

    pub fn elector(&self) -> Result<LeaderElector, CoordError> {
        LeaderElector::open(
            &self.layout,
            self.identity.clone(),
            self.config.election.lease,
        )
    }

    pub fn queue(&self) -> Result<QueueEngine, CoordError> {
        Ok(QueueEngine::open(&self.layout, self.identity.clone())?
            .with_settings(self.config.queue.clone())
            .with_backoff(self.config.backoff.clone()))
    }

    /// State machine, initialized to `initial_state` if it does not exist yet
    pub fn state_machine(&self, initial_state: &str) -> Result<ReplicatedStateMachine, CoordError> {
        let machine = self.attach_state_machine()?;
        machine.initialize(initial_state)?;
        Ok(machine)
    }

    /// State machine without initializing it
    pub fn attach_state_machine(&self) -> Result<ReplicatedStateMachine, CoordError> {
        Ok(
            ReplicatedStateMachine::attach(&self.layout, self.identity.clone())?
                .with_lock_settings(self.config.lock.clone())
                .with_backoff(self.config.backoff.clone()),
        )
    }

    pub fn event_log(&self) -> Result<EventLog, CoordError> {
        Ok(EventLog::open(&self.layout, self.identity.clone())?
            .with_settings(self.config.events.clone()))
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
