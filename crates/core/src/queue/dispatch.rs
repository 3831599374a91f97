// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topic → handler routing owned by one consumer
//!
//! A `Dispatcher` is an ordinary value the consumer builds and passes to
//! `QueueEngine::process_next`. There is no process-wide registry.

use super::message::Message;
use super::topic::TopicPattern;
use thiserror::Error;

/// Failure reported by a handler; becomes the message's `last_error`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

type Handler = Box<dyn Fn(&Message) -> Result<(), HandlerError> + Send + Sync>;

/// Outcome of routing one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Every matching handler succeeded
    Handled { handlers: usize },
    /// A handler failed; later handlers were not run
    Failed(HandlerError),
    /// No route matched the topic
    Unrouted,
}

#[derive(Default)]
pub struct Dispatcher {
    routes: Vec<(TopicPattern, Handler)>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for topics matching `pattern`. Handlers run in
    /// registration order.
    pub fn on<F>(mut self, pattern: impl Into<TopicPattern>, handler: F) -> Self
    where
        F: Fn(&Message) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.routes.push((pattern.into(), Box::new(handler)));
        self
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn handles(&self, topic: &str) -> bool {
        self.routes.iter().any(|(p, _)| p.matches(topic))
    }

    pub fn dispatch(&self, message: &Message) -> Dispatch {
        let mut handlers = 0;
        for (pattern, handler) in &self.routes {
            if !pattern.matches(&message.topic) {
                continue;
            }
            handlers += 1;
            if let Err(e) = handler(message) {
                return Dispatch::Failed(e);
            }
        }
        if handlers == 0 {
            Dispatch::Unrouted
        } else {
            Dispatch::Handled { handlers }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|(p, _)| p.as_str()))
            .finish()
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
