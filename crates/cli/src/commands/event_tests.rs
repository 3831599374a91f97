// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parse_since_accepts_micros_and_rfc3339() {
    assert_eq!(parse_since("0").unwrap(), 0);
    assert_eq!(parse_since("1500000").unwrap(), 1_500_000);
    assert_eq!(parse_since("1970-01-01T00:00:02Z").unwrap(), 2_000_000);
}

#[test]
fn parse_since_rejects_garbage_and_pre_epoch() {
    assert!(parse_since("yesterday").is_err());
    assert!(parse_since("1969-12-31T23:59:59Z").is_err());
}
