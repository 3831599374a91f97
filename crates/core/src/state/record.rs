// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State machine records

use serde::{Deserialize, Serialize};

/// The single current state, replaced wholesale on every transition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub version: u32,
    pub state: String,
    pub data: serde_json::Value,
    /// Bumped by one per applied transition; 0 at initialization
    pub record_version: u64,
    pub updated_at: u64,
    pub updated_by: String,
}

impl StateRecord {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn initial(state: impl Into<String>, updated_at: u64, updated_by: impl Into<String>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            state: state.into(),
            data: serde_json::Value::Null,
            record_version: 0,
            updated_at,
            updated_by: updated_by.into(),
        }
    }

    /// The state a history entry leads to
    pub fn after(transition: &TransitionRecord) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            state: transition.to.clone(),
            data: transition.data.clone(),
            record_version: transition.record_version,
            updated_at: transition.timestamp,
            updated_by: transition.actor.clone(),
        }
    }
}

/// One applied transition in `history/`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub version: u32,
    pub from: String,
    pub to: String,
    pub data: serde_json::Value,
    pub timestamp: u64,
    pub actor: String,
    /// `record_version` of the state this transition produced
    pub record_version: u64,
}

impl TransitionRecord {
    pub const CURRENT_VERSION: u32 = 1;
}

#[derive(Clone, Debug, PartialEq)]
pub enum TransitionOutcome {
    Applied(StateRecord),
    /// The guard refused; nothing was written
    Rejected { current: StateRecord },
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }

    /// State after the call, whichever way it went
    pub fn state(&self) -> &StateRecord {
        match self {
            TransitionOutcome::Applied(record) => record,
            TransitionOutcome::Rejected { current } => current,
        }
    }
}
