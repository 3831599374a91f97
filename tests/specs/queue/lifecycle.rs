//! Queue lifecycle specs
//!
//! Enqueue, claim, complete and fail through separate CLI invocations.

use crate::prelude::*;

fn claim_json(temp: &Project) -> serde_json::Value {
    temp.fscoord()
        .args(["--format", "json", "queue", "claim"])
        .passes()
        .json()
}

#[test]
fn enqueue_lands_in_pending() {
    let temp = Project::empty();
    temp.fscoord_as("producer")
        .args(["queue", "enqueue", "jobs:build", "--payload", r#"{"n":1}"#])
        .passes()
        .stdout_has("Enqueued")
        .stdout_has("jobs:build");

    let pending = temp.entries("pending");
    assert_eq!(pending.len(), 1);
    assert!(pending[0].ends_with("-producer.msg"));
}

#[test]
fn claims_follow_enqueue_order() {
    let temp = Project::empty();
    for body in ["A", "B", "C"] {
        temp.fscoord_as("producer")
            .args(["queue", "enqueue", "letters", "--payload", &format!("\"{body}\"")])
            .passes();
    }
    settle();

    let order: Vec<_> = (0..3).map(|_| claim_json(&temp)["payload"].clone()).collect();
    assert_eq!(order, vec!["A", "B", "C"]);
    assert_eq!(temp.entries("processing").len(), 3);
}

#[test]
fn claim_on_empty_queue_reports_nothing() {
    let temp = Project::empty();
    temp.fscoord()
        .args(["queue", "claim"])
        .passes()
        .stdout_has("No messages available");
    temp.fscoord()
        .args(["--format", "json", "queue", "claim", "--wait", "50ms"])
        .passes()
        .stdout_has("null");
}

#[test]
fn complete_moves_claim_to_completed() {
    let temp = Project::empty();
    temp.fscoord().args(["queue", "enqueue", "t"]).passes();
    settle();
    let name = claim_json(&temp)["name"].as_str().unwrap().to_string();

    temp.fscoord()
        .args(["queue", "complete", &name])
        .passes()
        .stdout_has("Completed");

    assert_eq!(temp.entries("completed"), vec![name.clone()]);
    temp.fscoord().args(["queue", "complete", &name]).fails();
}

#[test]
fn fail_requeues_then_dead_letters() {
    let temp = Project::with_config("[queue]\nmax_retries = 1\nretry_delay = \"1ms\"\n");
    temp.fscoord().args(["queue", "enqueue", "t"]).passes();
    settle();

    let first = claim_json(&temp)["name"].as_str().unwrap().to_string();
    temp.fscoord()
        .args(["queue", "fail", &first, "--reason", "disk full"])
        .passes()
        .stdout_has("Requeued");
    settle();

    let second = claim_json(&temp);
    assert_eq!(second["retry_count"], 1);
    assert_eq!(second["last_error"], "disk full");
    let name = second["name"].as_str().unwrap();
    temp.fscoord()
        .args(["queue", "fail", name])
        .passes()
        .stdout_has("Dead-lettered");

    temp.fscoord()
        .args(["queue", "stats"])
        .passes()
        .stdout_has("pending=0 processing=0 completed=0 failed=1");
}

#[test]
fn recover_returns_abandoned_claims() {
    let temp = Project::empty();
    temp.fscoord().args(["queue", "enqueue", "t"]).passes();
    settle();
    claim_json(&temp);

    // The claiming process has exited, so its claim is abandoned at once
    temp.fscoord()
        .args(["queue", "recover"])
        .passes()
        .stdout_has("Recovered 1");
    assert_eq!(temp.entries("pending").len(), 1);
    assert!(temp.entries("processing").is_empty());
}

#[test]
fn stats_as_json() {
    let temp = Project::empty();
    temp.fscoord().args(["queue", "enqueue", "t"]).passes();
    let stats = temp
        .fscoord()
        .args(["--format", "json", "queue", "stats"])
        .passes()
        .json();
    assert_eq!(stats["pending"], 1);
    assert_eq!(stats["failed"], 0);
}
