//! Help output specs

use crate::prelude::*;

#[test]
fn help_lists_every_primitive() {
    let temp = Project::empty();
    let out = temp.fscoord().args(["--help"]).passes();
    for command in ["queue", "lock", "leader", "state", "event"] {
        assert!(out.stdout.contains(command), "missing {command}");
    }
}

#[test]
fn queue_help_lists_subcommands() {
    let temp = Project::empty();
    temp.fscoord()
        .args(["queue", "--help"])
        .passes()
        .stdout_has("enqueue")
        .stdout_has("claim")
        .stdout_has("recover")
        .stdout_has("work");
}
