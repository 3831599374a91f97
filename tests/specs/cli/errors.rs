//! Error reporting specs

use crate::prelude::*;

#[test]
fn invalid_json_payload_is_rejected() {
    let temp = Project::empty();
    temp.fscoord()
        .args(["queue", "enqueue", "jobs", "--payload", "{nope"])
        .fails()
        .stderr_has("invalid JSON");
    assert!(temp.entries("pending").is_empty());
}

#[test]
fn malformed_config_is_reported() {
    let temp = Project::with_config("[queue]\nmax_retries = \"lots\"\n");
    temp.fscoord()
        .args(["queue", "stats"])
        .fails()
        .stderr_has("fscoord.toml");
}

#[test]
fn state_get_before_init_fails() {
    let temp = Project::empty();
    temp.fscoord()
        .args(["state", "get"])
        .fails()
        .stderr_has("not initialized");
}

#[test]
fn completing_unknown_claim_fails() {
    let temp = Project::empty();
    temp.fscoord()
        .args(["queue", "complete", "00000000000000000001-x.msg"])
        .fails()
        .stderr_has("no claim named");
}
