//! Leader election specs

use crate::prelude::*;

#[test]
fn first_candidate_is_elected() {
    let temp = Project::empty();
    temp.fscoord_as("node-1")
        .args(["leader", "elect", "cluster"])
        .passes()
        .stdout_has("Leader of cluster: node-1");

    temp.fscoord()
        .args(["--format", "json", "leader", "show", "cluster"])
        .passes()
        .stdout_has("\"leader_id\": \"node-1\"");
}

#[test]
fn abdicate_only_by_leader() {
    let temp = Project::empty();
    temp.fscoord_as("node-1")
        .args(["leader", "elect", "cluster"])
        .passes();

    temp.fscoord_as("node-2")
        .args(["leader", "abdicate", "cluster"])
        .fails();
    temp.fscoord_as("node-1")
        .args(["leader", "abdicate", "cluster"])
        .passes()
        .stdout_has("Abdicated cluster");
    temp.fscoord()
        .args(["leader", "show", "cluster"])
        .passes()
        .stdout_has("cluster has no leader");
}

#[test]
fn expired_lease_is_taken_over() {
    let temp = Project::with_config("[election]\nlease = \"10ms\"\n");
    temp.fscoord_as("node-1")
        .args(["leader", "elect", "cluster"])
        .passes();
    std::thread::sleep(std::time::Duration::from_millis(30));

    temp.fscoord_as("node-2")
        .args(["leader", "elect", "cluster"])
        .passes()
        .stdout_has("node-2");
}
