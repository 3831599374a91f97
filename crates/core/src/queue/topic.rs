// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch route patterns over colon-separated topics
//!
//! Topics are free-form strings; the queue never rejects one at enqueue.
//! Routing reads them as `:`-separated segments, so `jobs:build` has two
//! segments and an empty topic has none a pattern can match.

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`: exactly one segment, whatever it holds
    One,
    /// `**`: the remaining segments, possibly none
    Rest,
}

/// Route pattern a `Dispatcher` matches message topics against.
///
/// `jobs:build` matches only itself, `jobs:*` matches `jobs:build` but not
/// `jobs:build:arm` and `jobs:**` matches `jobs` and everything beneath it.
/// `**` swallows whatever follows, so segments written after it never take
/// part in a match. An empty pattern routes nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicPattern {
    source: String,
    segments: Vec<Segment>,
}

impl TopicPattern {
    pub fn new(pattern: &str) -> Self {
        let segments = if pattern.is_empty() {
            Vec::new()
        } else {
            pattern
                .split(':')
                .map(|part| match part {
                    "*" => Segment::One,
                    "**" => Segment::Rest,
                    literal => Segment::Literal(literal.to_string()),
                })
                .collect()
        };
        Self { source: pattern.to_string(), segments }
    }

    pub fn matches(&self, topic: &str) -> bool {
        if self.segments.is_empty() {
            return false;
        }
        let mut parts = topic.split(':');
        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::One => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(expected) => {
                    if parts.next() != Some(expected.as_str()) {
                        return false;
                    }
                }
            }
        }
        parts.next().is_none()
    }

    /// True when the pattern names one topic and no wildcard
    pub fn is_exact(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Literal(_)))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for TopicPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl From<&str> for TopicPattern {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

#[cfg(test)]
#[path = "topic_tests.rs"]
mod tests;
