// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::naming::entry_name;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hex characters kept from the digest
const ID_LEN: usize = 32;

/// An immutable entry in `events/`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub version: u32,
    /// Content-derived, see [`event_id`]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Microseconds since the Unix epoch
    pub timestamp: u64,
    pub payload: serde_json::Value,
    pub emitter: String,
}

impl EventRecord {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(
        event_type: impl Into<String>,
        payload: serde_json::Value,
        timestamp: u64,
        emitter: impl Into<String>,
    ) -> Self {
        let event_type = event_type.into();
        Self {
            version: Self::CURRENT_VERSION,
            id: event_id(&event_type, &payload, timestamp),
            event_type,
            timestamp,
            payload,
            emitter: emitter.into(),
        }
    }

    /// Name of this record's file in `events/` and in its type index
    pub fn file_name(&self) -> String {
        entry_name(self.timestamp, &self.emitter, "json")
    }
}

/// Content id: SHA-256 over the type, the canonical payload JSON and the
/// timestamp in whole seconds, truncated to 32 hex characters.
///
/// Object keys serialize sorted, so equal payloads hash equally regardless of
/// how they were built. Two identical events in the same second share an id.
pub fn event_id(event_type: &str, payload: &serde_json::Value, timestamp_micros: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(event_type.as_bytes());
    hasher.update([0]);
    hasher.update(payload.to_string().as_bytes());
    hasher.update([0]);
    hasher.update((timestamp_micros / 1_000_000).to_string().as_bytes());
    let digest = hasher.finalize();
    let mut hex = hex_encode(&digest);
    hex.truncate(ID_LEN);
    hex
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
