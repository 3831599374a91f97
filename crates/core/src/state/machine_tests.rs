// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FakeClock;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

fn machine(tmp: &TempDir, actor: &str, clock: &FakeClock) -> ReplicatedStateMachine<FakeClock> {
    ReplicatedStateMachine::open(&Layout::new(tmp.path()), Identity::named(actor), "INIT")
        .unwrap()
        .with_clock(clock.clone())
}

fn history_names(tmp: &TempDir) -> Vec<String> {
    sorted_entries(&tmp.path().join("history"), EXT).unwrap()
}

#[test]
fn open_initializes_once() {
    let tmp = TempDir::new().unwrap();
    let clock = FakeClock::at(1_000);
    let m = machine(&tmp, "a", &clock);

    let record = m.get_state().unwrap();
    assert_eq!(record.state, "INIT");
    assert_eq!(record.record_version, 0);
    assert_eq!(record.data, serde_json::Value::Null);

    // A second open with a different initial state does not reset it
    let again = ReplicatedStateMachine::open(&Layout::new(tmp.path()), Identity::named("b"), "OTHER")
        .unwrap();
    assert_eq!(again.get_state().unwrap().state, "INIT");
    assert!(!again.initialize("OTHER").unwrap());
}

#[test]
fn attach_without_init_reports_uninitialized() {
    let tmp = TempDir::new().unwrap();
    let m = ReplicatedStateMachine::attach(&Layout::new(tmp.path()), Identity::named("a")).unwrap();
    let err = m.get_state().unwrap_err();
    assert!(matches!(err, CoordError::Uninitialized { .. }));
}

#[test]
fn accepted_transition_updates_record_and_history() {
    let tmp = TempDir::new().unwrap();
    let clock = FakeClock::at(1_000);
    let m = machine(&tmp, "actor-1", &clock);
    clock.advance(Duration::from_secs(1));

    let outcome = m
        .transition("RUNNING", json!({"job": 7}), |state, _| state == "INIT")
        .unwrap();
    assert!(outcome.is_applied());

    let record = m.get_state().unwrap();
    assert_eq!(record.state, "RUNNING");
    assert_eq!(record.data, json!({"job": 7}));
    assert_eq!(record.record_version, 1);
    assert_eq!(record.updated_by, "actor-1");
    assert_eq!(outcome.state(), &record);

    let history = m.history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from, "INIT");
    assert_eq!(history[0].to, "RUNNING");
    assert_eq!(history[0].record_version, 1);
    assert_eq!(history[0].actor, "actor-1");
}

#[test]
fn rejected_guard_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    let clock = FakeClock::at(1_000);
    let m = machine(&tmp, "a", &clock);
    let before = std::fs::read(tmp.path().join("state.json")).unwrap();

    let outcome = m.transition("DONE", json!(1), |state, _| state == "RUNNING").unwrap();

    assert_eq!(
        outcome,
        TransitionOutcome::Rejected {
            current: m.get_state().unwrap()
        }
    );
    assert_eq!(std::fs::read(tmp.path().join("state.json")).unwrap(), before);
    assert!(m.history().unwrap().is_empty());
    // The mutex was released on the rejection path
    assert!(!tmp.path().join("locks").join("state.lock").exists());
}

#[test]
fn guard_sees_current_data() {
    let tmp = TempDir::new().unwrap();
    let clock = FakeClock::at(1_000);
    let m = machine(&tmp, "a", &clock);
    m.transition("COUNTING", json!({"n": 1}), |_, _| true).unwrap();

    let seen = std::cell::RefCell::new(None);
    m.transition("COUNTING", json!({"n": 2}), |state, data| {
        *seen.borrow_mut() = Some((state.to_string(), data.clone()));
        true
    })
    .unwrap();

    assert_eq!(
        seen.into_inner(),
        Some(("COUNTING".to_string(), json!({"n": 1})))
    );
}

#[test]
fn versions_increase_and_history_sorts_in_order() {
    let tmp = TempDir::new().unwrap();
    let clock = FakeClock::at(1_000);
    let m = machine(&tmp, "a", &clock);

    for state in ["A", "B", "C"] {
        m.transition(state, json!(null), |_, _| true).unwrap();
    }

    let history = m.history().unwrap();
    let versions: Vec<_> = history.iter().map(|t| t.record_version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
    let path: Vec<_> = history.iter().map(|t| t.to.as_str()).collect();
    assert_eq!(path, vec!["A", "B", "C"]);
    assert_eq!(m.get_state().unwrap().record_version, 3);
}

#[test]
fn lagging_clock_still_appends_after_tip() {
    let tmp = TempDir::new().unwrap();
    let ahead = FakeClock::at(10_000_000);
    let behind = FakeClock::at(1_000);
    let a = machine(&tmp, "a", &ahead);
    let b = machine(&tmp, "b", &behind);

    a.transition("ONE", json!(null), |_, _| true).unwrap();
    b.transition("TWO", json!(null), |_, _| true).unwrap();

    let names = history_names(&tmp);
    assert_eq!(names.len(), 2);
    assert!(names[1].ends_with("-b.json"));
    assert_eq!(b.get_state().unwrap().record_version, 2);
}

#[test]
fn interrupted_transition_is_rolled_forward() {
    let tmp = TempDir::new().unwrap();
    let clock = FakeClock::at(1_000);
    let m = machine(&tmp, "a", &clock);

    // A writer appended history and died before replacing the record
    let orphan = TransitionRecord {
        version: TransitionRecord::CURRENT_VERSION,
        from: "INIT".to_string(),
        to: "RUNNING".to_string(),
        data: json!({"by": "ghost"}),
        timestamp: 5_000,
        actor: "ghost".to_string(),
        record_version: 1,
    };
    publish_json(
        &tmp.path().join("history").join(entry_name(5_000, "ghost", EXT)),
        &orphan,
    )
    .unwrap();
    assert_eq!(m.get_state().unwrap().state, "INIT");

    let outcome = m
        .transition("DONE", json!(null), |state, _| state == "RUNNING")
        .unwrap();

    assert!(outcome.is_applied());
    assert_eq!(outcome.state().record_version, 2);
    let history = m.history().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].from, "RUNNING");
}

#[test]
fn corrupt_history_entry_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let clock = FakeClock::at(1_000);
    let m = machine(&tmp, "a", &clock);
    m.transition("A", json!(null), |_, _| true).unwrap();
    std::fs::write(
        tmp.path().join("history").join(entry_name(1, "junk", EXT)),
        b"not json",
    )
    .unwrap();

    assert_eq!(m.history().unwrap().len(), 1);
}

#[test]
fn corrupt_history_tip_does_not_block_transitions() {
    let tmp = TempDir::new().unwrap();
    let clock = FakeClock::at(1_000);
    let m = machine(&tmp, "a", &clock);
    m.transition("A", json!(null), |_, _| true).unwrap();
    let junk = entry_name(9_223_372_036_854_775_807, "junk", EXT);
    std::fs::write(tmp.path().join("history").join(&junk), b"not json").unwrap();

    clock.advance(Duration::from_millis(1));
    let outcome = m.transition("B", json!(null), |state, _| state == "A").unwrap();

    let TransitionOutcome::Applied(record) = outcome else {
        panic!("expected the transition to apply, got {outcome:?}");
    };
    assert_eq!((record.state.as_str(), record.record_version), ("B", 2));
    assert!(tmp
        .path()
        .join("history")
        .join(format!("{junk}.corrupt"))
        .exists());
    let steps: Vec<_> = m.history().unwrap().into_iter().map(|t| t.to).collect();
    assert_eq!(steps, vec!["A", "B"]);
}

#[test]
fn concurrent_guarded_transitions_apply_once() {
    let tmp = TempDir::new().unwrap();
    let layout = Layout::new(tmp.path());
    ReplicatedStateMachine::open(&layout, Identity::named("init"), "INIT").unwrap();
    let applied = AtomicUsize::new(0);
    let backoff = BackoffPolicy::default()
        .with_initial(Duration::from_millis(1))
        .with_max(Duration::from_millis(10));

    std::thread::scope(|s| {
        for n in 0..4 {
            let layout = layout.clone();
            let applied = &applied;
            let backoff = backoff.clone();
            s.spawn(move || {
                let m = ReplicatedStateMachine::attach(&layout, Identity::named(&format!("w{n}")))
                    .unwrap()
                    .with_backoff(backoff);
                let outcome = m
                    .transition("RUNNING", json!({"worker": n}), |state, _| state == "INIT")
                    .unwrap();
                if outcome.is_applied() {
                    applied.fetch_add(1, Ordering::SeqCst);
                } else {
                    assert_eq!(outcome.state().state, "RUNNING");
                }
            });
        }
    });

    assert_eq!(applied.load(Ordering::SeqCst), 1);
    let check = ReplicatedStateMachine::attach(&layout, Identity::named("check")).unwrap();
    assert_eq!(check.history().unwrap().len(), 1);
    assert_eq!(check.get_state().unwrap().record_version, 1);
}
