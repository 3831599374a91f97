// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn worker(poll: Duration) -> Worker {
    Worker { max: None, exit_when_idle: None, poll }
}

#[test]
fn idle_polling_backs_off_up_to_the_poll_interval() {
    let policy = worker(Duration::from_millis(40)).idle_policy(&BackoffPolicy::default());
    let mut backoff = policy.start();

    let first = backoff.next_delay();
    assert!(first <= Duration::from_millis(5), "first idle sleep {first:?}");
    let delays: Vec<Duration> = (0..20).map(|_| backoff.next_delay()).collect();
    assert!(delays.iter().all(|d| *d <= Duration::from_millis(40)));
    assert!(delays.iter().any(|d| *d > Duration::from_millis(5)), "never grew: {delays:?}");
}

#[test]
fn idle_polls_are_jittered() {
    let policy = worker(Duration::from_millis(200)).idle_policy(&BackoffPolicy::default());
    let delays: Vec<Duration> = (0..32).map(|_| policy.start().next_delay()).collect();
    assert!(delays.iter().any(|d| *d != delays[0]), "identical delays: {delays:?}");
}

#[test]
fn poll_shorter_than_the_initial_delay_caps_it() {
    let policy = worker(Duration::from_millis(1)).idle_policy(&BackoffPolicy::default());
    assert_eq!(policy.initial, Duration::from_millis(1));
    assert_eq!(policy.max, Duration::from_millis(1));
}
