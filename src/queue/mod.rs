//! Queue implementations
//!
//! This module provides the blocking FIFO queue used to hand items from producers to
//! consumers.
//!
//! ## Available Queues
//!
//! - [`BoundedBlockingQueue`]: mutex + condition-variable monitor, bounded or unbounded
//!
//! ## Operation Variants
//!
//! | Operation | Empty / Full queue | Closed queue |
//! |-----------|--------------------|--------------|
//! | `try_pop` / `try_push` | returns immediately | pop drains, push rejected |
//! | `pop_blocking` / `push_blocking` | suspends until signalled | pop waits for an item, push rejected |
//! | `pop_timeout` / `push_timeout` | suspends until signalled or deadline | pop drains then `Closed`, push rejected |
//! | `pop_until_closed` | suspends until signalled | drains then `None` |
//!
//! ## Examples
//!
//! ```rust
//! use handoff::queue::BoundedBlockingQueue;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let queue = Arc::new(BoundedBlockingQueue::new(4));
//!
//! let consumer = {
//!     let queue = Arc::clone(&queue);
//!     thread::spawn(move || {
//!         let mut sum = 0;
//!         while let Some(value) = queue.pop_until_closed() {
//!             sum += value;
//!         }
//!         sum
//!     })
//! };
//!
//! for i in 1..=10 {
//!     queue.push_blocking(i).unwrap();
//! }
//! queue.close();
//!
//! assert_eq!(consumer.join().unwrap(), 55);
//! ```

use core::fmt;

use crate::Error;

pub mod blocking;

pub use blocking::BoundedBlockingQueue;

/// Occupancy of a queue, derived from its length and capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueState {
    /// No items held
    Empty,
    /// Holding items with room for more
    Partial,
    /// Holding exactly `capacity` items; never reached by unbounded queues
    Full,
}

impl QueueState {
    /// Classify a length against an optional capacity
    pub fn classify(len: usize, capacity: Option<usize>) -> Self {
        match capacity {
            _ if len == 0 => QueueState::Empty,
            Some(capacity) if len >= capacity => QueueState::Full,
            _ => QueueState::Partial,
        }
    }
}

/// A push that could not complete, carrying the item back to the caller
#[derive(Clone, PartialEq, Eq)]
pub struct PushError<T> {
    item: T,
    kind: Error,
}

impl<T> PushError<T> {
    pub(crate) fn new(item: T, kind: Error) -> Self {
        Self { item, kind }
    }

    /// Recover the rejected item
    pub fn into_inner(self) -> T {
        self.item
    }

    /// Borrow the rejected item
    pub fn item(&self) -> &T {
        &self.item
    }

    /// Why the push failed: `WouldBlock`, `Closed` or `Timeout`
    pub fn kind(&self) -> &Error {
        &self.kind
    }

    /// The queue was at capacity
    pub fn is_full(&self) -> bool {
        self.kind == Error::WouldBlock
    }

    /// The queue was closed
    pub fn is_closed(&self) -> bool {
        self.kind == Error::Closed
    }

    /// The deadline expired while the queue stayed full
    pub fn is_timeout(&self) -> bool {
        self.kind == Error::Timeout
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushError")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "push rejected: {}", self.kind)
    }
}

impl<T> std::error::Error for PushError<T> {}

impl<T> From<PushError<T>> for Error {
    fn from(err: PushError<T>) -> Self {
        err.kind
    }
}


#[cfg(test)]
mod proptests;

#[cfg(test)]
mod loom_tests;
