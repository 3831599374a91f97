//! Event log specs

use crate::prelude::*;

fn emit(temp: &Project, event_type: &str, payload: &str) {
    temp.fscoord()
        .args(["event", "emit", event_type, "--payload", payload])
        .passes();
}

fn replay_payloads(temp: &Project, extra: &[&str]) -> Vec<serde_json::Value> {
    let mut args = vec!["--format", "json", "event", "replay"];
    args.extend_from_slice(extra);
    temp.fscoord()
        .args(args)
        .passes()
        .json()
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["payload"].clone())
        .collect()
}

#[test]
fn emit_writes_record_and_index() {
    let temp = Project::empty();
    temp.fscoord_as("svc")
        .args(["event", "emit", "order:created", "--payload", r#"{"id":7}"#])
        .passes()
        .stdout_has("order:created");

    let events = temp.entries("events");
    assert_eq!(events.len(), 1);
    assert!(events[0].ends_with("-svc.json"));
    assert_eq!(temp.entries("indexes/by_type/order_created"), events);
}

#[test]
fn replay_returns_everything_in_order() {
    let temp = Project::empty();
    for n in 0..3 {
        emit(&temp, "tick", &n.to_string());
    }
    assert_eq!(replay_payloads(&temp, &[]), vec![0, 1, 2]);
}

#[test]
fn replay_filters_by_type() {
    let temp = Project::empty();
    emit(&temp, "a", "1");
    emit(&temp, "b", "2");
    emit(&temp, "a", "3");
    assert_eq!(replay_payloads(&temp, &["--type", "a"]), vec![1, 3]);
    assert_eq!(replay_payloads(&temp, &["--type", "b", "--type", "a"]), vec![1, 2, 3]);
}

#[test]
fn replay_since_future_is_empty() {
    let temp = Project::empty();
    emit(&temp, "a", "1");
    assert!(replay_payloads(&temp, &["--since", "2999-01-01T00:00:00Z"]).is_empty());
}

#[test]
fn consumer_checkpoint_resumes() {
    let temp = Project::empty();
    emit(&temp, "a", "1");
    emit(&temp, "a", "2");
    assert_eq!(replay_payloads(&temp, &["--consumer", "auditor"]), vec![1, 2]);

    emit(&temp, "a", "3");
    assert_eq!(replay_payloads(&temp, &["--consumer", "auditor"]), vec![3]);
    assert!(replay_payloads(&temp, &["--consumer", "auditor"]).is_empty());
}

#[test]
fn reindex_restores_deleted_markers() {
    let temp = Project::empty();
    emit(&temp, "a", "1");
    let name = temp.entries("events").remove(0);
    std::fs::remove_file(temp.path().join("indexes/by_type/a").join(name)).unwrap();

    temp.fscoord()
        .args(["event", "reindex"])
        .passes()
        .stdout_has("Created 1");
    assert_eq!(replay_payloads(&temp, &["--type", "a"]), vec![1]);
}
