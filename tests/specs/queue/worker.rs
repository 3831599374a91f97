//! Queue worker specs

use crate::prelude::*;
use std::collections::HashSet;

#[test]
fn worker_drains_queue_and_exits_when_idle() {
    let temp = Project::empty();
    for n in 0..3 {
        temp.fscoord()
            .args(["queue", "enqueue", "jobs:build", "--payload", &n.to_string()])
            .passes();
    }
    settle();

    temp.fscoord()
        .args(["queue", "work", "--exit-when-idle", "100ms", "--poll", "10ms"])
        .passes()
        .stdout_has("jobs:build")
        .stderr_has("Handled 3 message(s)");

    assert_eq!(temp.entries("completed").len(), 3);
}

#[test]
fn worker_stops_after_max() {
    let temp = Project::empty();
    for _ in 0..3 {
        temp.fscoord().args(["queue", "enqueue", "t"]).passes();
    }
    settle();

    temp.fscoord()
        .args(["queue", "work", "--max", "2"])
        .passes();
    assert_eq!(temp.entries("completed").len(), 2);
    assert_eq!(temp.entries("pending").len(), 1);
}

#[test]
fn worker_dead_letters_unhandled_topics() {
    let temp = Project::with_config("[queue]\nredeliver = false\n");
    temp.fscoord().args(["queue", "enqueue", "mail:send"]).passes();
    temp.fscoord().args(["queue", "enqueue", "jobs:build"]).passes();
    settle();

    temp.fscoord()
        .args([
            "queue",
            "work",
            "--topic",
            "jobs:*",
            "--exit-when-idle",
            "50ms",
            "--poll",
            "10ms",
        ])
        .passes()
        .stdout_lacks("mail:send");

    assert_eq!(temp.entries("completed").len(), 1);
    assert_eq!(temp.entries("failed").len(), 1);
}

#[test]
fn concurrent_claim_processes_never_share_a_message() {
    let temp = Project::empty();
    for n in 0..12 {
        temp.fscoord()
            .args(["queue", "enqueue", "t", "--payload", &n.to_string()])
            .passes();
    }
    settle();

    let children: Vec<_> = (0..4)
        .map(|_| {
            std::process::Command::new(assert_cmd::cargo::cargo_bin("fscoord"))
                .env("FSCOORD_BASE", temp.path())
                .args(["--format", "json", "queue", "work", "--exit-when-idle", "100ms", "--poll", "5ms"])
                .spawn_piped()
        })
        .collect();

    let mut seen = Vec::new();
    for child in children {
        let output = child.wait_with_output().unwrap();
        assert!(output.status.success());
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            let message: serde_json::Value = serde_json::from_str(line).unwrap();
            seen.push(message["id"].as_str().unwrap().to_string());
        }
    }

    let unique: HashSet<_> = seen.iter().collect();
    assert_eq!(seen.len(), 12);
    assert_eq!(unique.len(), 12);
}

trait SpawnPiped {
    fn spawn_piped(&mut self) -> std::process::Child;
}

impl SpawnPiped for std::process::Command {
    fn spawn_piped(&mut self) -> std::process::Child {
        self.stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .unwrap()
    }
}
