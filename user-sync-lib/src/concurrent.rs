//! Concurrent processing utilities for user sync runs.
//!
//! `ConcurrentProcessor` runs one task per record with a fixed number of
//! worker slots and yields results in completion order.

use futures::stream::{self, Stream, StreamExt};
use std::future::Future;

/// Runs tasks with bounded concurrency.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrentProcessor {
    max_concurrency: usize,
}

impl ConcurrentProcessor {
    /// Create a new concurrent processor. Zero is treated as one slot.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run `task` once per item, at most `max_concurrency` at a time.
    ///
    /// All items are queued immediately; the stream pulls new ones as slots
    /// free up. Results arrive in completion order, not input order.
    /// Dropping the stream cancels every task still pending or in flight.
    pub fn process<I, F, Fut>(&self, items: I, task: F) -> impl Stream<Item = Fut::Output>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future,
    {
        stream::iter(items)
            .map(task)
            .buffer_unordered(self.max_concurrency)
    }
}

impl Default for ConcurrentProcessor {
    fn default() -> Self {
        Self::new(crate::types::DEFAULT_CONCURRENCY)
    }
}
