// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    exact_hit = { "jobs:build", "jobs:build", true },
    exact_miss = { "jobs:build", "jobs:deploy", false },
    exact_is_not_a_prefix = { "jobs", "jobs:build", false },
    star_hit = { "jobs:*", "jobs:deploy", true },
    star_is_one_segment = { "jobs:*", "jobs:build:arm", false },
    star_needs_a_segment = { "jobs:*", "jobs", false },
    star_in_the_middle = { "jobs:*:arm", "jobs:build:arm", true },
    rest_hit = { "jobs:**", "jobs:build:arm", true },
    rest_covers_the_bare_prefix = { "jobs:**", "jobs", true },
    rest_other_prefix = { "jobs:**", "mail:send", false },
    rest_ignores_trailing_segments = { "jobs:**:arm", "jobs:build:x86", true },
    global_star_is_one_segment = { "*", "jobs:build", false },
    global_star_hit = { "*", "jobs", true },
    global_rest = { "**", "jobs:build:arm", true },
    empty_segment_is_literal = { "jobs::build", "jobs::build", true },
    empty_pattern_routes_nothing = { "", "", false },
)]
fn topic_pattern_cases(pattern: &str, topic: &str, expected: bool) {
    assert_eq!(TopicPattern::new(pattern).matches(topic), expected);
}

#[test]
fn exact_patterns_have_no_wildcards() {
    assert!(TopicPattern::new("jobs:build").is_exact());
    assert!(!TopicPattern::new("jobs:*").is_exact());
    assert!(!TopicPattern::from("jobs:**").is_exact());
}

#[test]
fn pattern_displays_as_written() {
    let pattern = TopicPattern::from("jobs:*:arm");
    assert_eq!(pattern.to_string(), "jobs:*:arm");
    assert_eq!(pattern.as_str(), "jobs:*:arm");
}
