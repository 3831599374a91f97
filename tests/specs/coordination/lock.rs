//! Named mutex specs

use crate::prelude::*;

#[test]
fn acquire_then_show_names_holder() {
    let temp = Project::empty();
    temp.fscoord_as("alice")
        .args(["lock", "acquire", "db", "--ttl", "1m"])
        .passes()
        .stdout_has("Holder: alice");

    temp.fscoord()
        .args(["lock", "show", "db"])
        .passes()
        .stdout_has("Lock: db")
        .stdout_has("TTL: 1m");
}

#[test]
fn release_requires_matching_holder() {
    let temp = Project::empty();
    temp.fscoord_as("alice")
        .args(["lock", "acquire", "db"])
        .passes();

    temp.fscoord_as("bob")
        .args(["lock", "release", "db"])
        .fails()
        .stderr_has("not held by bob");
    temp.fscoord_as("alice")
        .args(["lock", "release", "db"])
        .passes()
        .stdout_has("Released db");
    temp.fscoord()
        .args(["lock", "show", "db"])
        .passes()
        .stdout_has("db is free");
}

#[test]
fn lock_left_by_exited_process_is_reclaimed() {
    let temp = Project::empty();
    temp.fscoord_as("alice")
        .args(["lock", "acquire", "db", "--ttl", "1h"])
        .passes();

    // alice's process is gone, so the lock is stale on this host despite the TTL
    temp.fscoord_as("bob")
        .args(["lock", "acquire", "db", "--timeout", "2s"])
        .passes()
        .stdout_has("Holder: bob");
}

#[test]
fn held_lock_blocks_until_timeout() {
    let temp = Project::empty();
    let mut holder = std::process::Command::new(assert_cmd::cargo::cargo_bin("fscoord"))
        .env("FSCOORD_BASE", temp.path())
        .env("FSCOORD_ID", "alice")
        .args(["lock", "acquire", "db", "--hold", "5s"])
        .stdout(std::process::Stdio::null())
        .spawn()
        .unwrap();

    // Wait for the holder to take the lock
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while !temp.path().join("locks/db.lock").exists() {
        assert!(std::time::Instant::now() < deadline, "holder never acquired");
        std::thread::sleep(std::time::Duration::from_millis(10));
    }

    temp.fscoord_as("bob")
        .args(["lock", "acquire", "db", "--timeout", "200ms"])
        .fails()
        .stderr_has("timed out");

    holder.kill().unwrap();
    holder.wait().unwrap();
}
