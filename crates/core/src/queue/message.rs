// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue message record

use crate::identity::Identity;
use serde::{Deserialize, Serialize};

/// A unit of work travelling through the pipeline directories.
///
/// The payload is opaque to the queue; only the fixed fields around it are
/// interpreted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub version: u32,
    /// Stem of the name it was first enqueued under; stable across redelivery
    pub id: String,
    pub topic: String,
    pub payload: serde_json::Value,
    /// Enqueue time, microseconds since the Unix epoch
    pub timestamp: u64,
    pub producer_id: String,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Set while the message sits in `processing`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<Identity>,
}

impl Message {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(
        id: impl Into<String>,
        topic: impl Into<String>,
        payload: serde_json::Value,
        timestamp: u64,
        producer_id: impl Into<String>,
    ) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            id: id.into(),
            topic: topic.into(),
            payload,
            timestamp,
            producer_id: producer_id.into(),
            retry_count: 0,
            last_error: None,
            claimed_at: None,
            claimed_by: None,
        }
    }

    /// Decode the payload into a concrete type
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// A message this process has claimed, together with the file name it holds
#[derive(Clone, Debug, PartialEq)]
pub struct Claimed {
    pub name: String,
    pub message: Message,
}

/// What `fail` did with a message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailOutcome {
    /// Put back into `pending` under a new name, claimable from `available_at`
    Redelivered { name: String, available_at: u64 },
    /// Retries exhausted (or redelivery disabled); parked in `failed`
    DeadLettered,
    /// The claim was no longer ours (recovered by someone else)
    Lost,
}

/// Number of entries in each pipeline directory
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl std::fmt::Display for QueueStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "pending={} processing={} completed={} failed={}",
            self.pending, self.processing, self.completed, self.failed
        )
    }
}
