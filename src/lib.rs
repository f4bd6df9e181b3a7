//! # handoff
//!
//! A bounded, blocking, thread-safe queue for coordinating producer and consumer threads.
//!
//! ## Features
//!
//! - **BoundedBlockingQueue**: FIFO monitor with non-blocking (`try_*`), blocking and
//!   deadline-bounded push/pop, plus close/drain for orderly shutdown
//! - **Worker collaborators**: producer/consumer runners and a pipeline driver that wires
//!   any number of producers and consumers to one queue
//! - **Metrics**: relaxed counters for pushes, pops, rejections and waits
//!
//! ## Synchronization Model
//!
//! Every queue operation runs under a single mutex. Two condition variables, one per
//! direction, suspend blocked callers:
//!
//! ```text
//! push ----> [ lock | append | unlock ] ----> notify not_empty
//! pop  ----> [ lock | remove | unlock ] ----> notify not_full
//! ```
//!
//! Blocked callers re-check their condition after every wake, so spurious wakeups and
//! signals that race with the emptiness check are harmless. Notifications, metrics and
//! tracing all happen after the lock is released.
//!
//! ## Quick Start
//!
//! ```rust
//! use handoff::BoundedBlockingQueue;
//!
//! let queue = BoundedBlockingQueue::new(2);
//! queue.try_push(1).unwrap();
//! queue.push_blocking(2).unwrap();
//! assert!(queue.try_push(3).is_err());
//! assert_eq!(queue.pop_blocking(), 1);
//! assert_eq!(queue.try_pop(), Some(2));
//! assert_eq!(queue.try_pop(), None);
//! ```

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

pub mod config;
pub mod metrics;
pub mod queue;
pub mod trace;
pub mod worker;

pub use crate::config::{QueueConfig, WorkloadConfig};
pub use crate::queue::{BoundedBlockingQueue, PushError, QueueState};
pub use crate::worker::{IdAllocator, Item};

/// Error types for handoff operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Operation could not proceed immediately (queue empty on pop, full on push)
    #[error("operation would block")]
    WouldBlock,
    /// Queue has been closed
    #[error("queue is closed")]
    Closed,
    /// A deadline-bounded wait expired
    #[error("timed out waiting on the queue")]
    Timeout,
    /// A bounded queue was requested with a capacity of zero
    #[error("capacity must be greater than zero")]
    InvalidCapacity,
    /// Workload configuration cannot be run
    #[error("invalid workload: {0}")]
    InvalidWorkload(&'static str),
    /// A worker thread could not be started
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Result type for handoff operations
pub type Result<T> = core::result::Result<T, Error>;
