//! State machine specs

use crate::prelude::*;

#[test]
fn init_then_get() {
    let temp = Project::empty();
    temp.fscoord_as("setup")
        .args(["state", "init", "IDLE"])
        .passes()
        .stdout_has("State: IDLE (version 0)");
    temp.fscoord()
        .args(["state", "get"])
        .passes()
        .stdout_has("State: IDLE");
}

#[test]
fn init_does_not_reset_existing_state() {
    let temp = Project::empty();
    temp.fscoord().args(["state", "init", "IDLE"]).passes();
    temp.fscoord().args(["state", "transition", "RUNNING"]).passes();
    temp.fscoord()
        .args(["state", "init", "IDLE"])
        .passes()
        .stdout_has("State: RUNNING");
}

#[test]
fn guarded_transition_applies_once() {
    let temp = Project::empty();
    temp.fscoord().args(["state", "init", "INIT"]).passes();

    temp.fscoord_as("worker-1")
        .args(["state", "transition", "RUNNING", "--from", "INIT", "--data", r#"{"job":1}"#])
        .passes()
        .stdout_has("State: RUNNING (version 1)");
    temp.fscoord_as("worker-2")
        .args(["state", "transition", "RUNNING", "--from", "INIT"])
        .fails()
        .stderr_has("rejected: state is RUNNING");

    let state = temp
        .fscoord()
        .args(["--format", "json", "state", "get"])
        .passes()
        .json();
    assert_eq!(state["updated_by"], "worker-1");
    assert_eq!(state["data"]["job"], 1);
}

#[test]
fn history_lists_transitions_in_order() {
    let temp = Project::empty();
    temp.fscoord().args(["state", "init", "A"]).passes();
    for next in ["B", "C"] {
        temp.fscoord().args(["state", "transition", next]).passes();
    }

    let history = temp
        .fscoord()
        .args(["--format", "json", "state", "history"])
        .passes()
        .json();
    let steps: Vec<_> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|t| format!("{}->{}", t["from"].as_str().unwrap(), t["to"].as_str().unwrap()))
        .collect();
    similar_asserts::assert_eq!(steps, vec!["A->B", "B->C"]);
}
