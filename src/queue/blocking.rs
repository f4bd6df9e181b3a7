//! Bounded Blocking Queue
//!
//! A FIFO queue guarded by one mutex, with two condition variables:
//!
//! - `not_empty`: signalled after every push, waited on by blocked consumers
//! - `not_full`: signalled after every pop, waited on by blocked producers
//!
//! ## Waiting Discipline
//!
//! Every suspension goes through a predicate wait: the caller checks its condition
//! under the lock, suspends on the condition variable (which releases the lock
//! atomically) and re-checks the condition after each wake. A push that lands between
//! the check and the suspension cannot be missed, because the pusher needs the lock to
//! append and the waiter only gives the lock up inside the wait. Spurious wakeups and
//! wakeups stolen by a `try_*` caller just send the waiter around the loop again.
//!
//! There is no polling anywhere in the queue: blocked callers sleep until a
//! notification, a close, or their deadline.
//!
//! ## Signalling
//!
//! Notifications are sent after the guard is dropped, so a woken thread never
//! immediately collides with the lock still held by its waker. Metrics and tracing
//! follow the same rule. The one exception is the wait counter, a single relaxed
//! increment made just before a caller suspends so that blocked callers are visible
//! while they are still blocked.
//!
//! ## Shutdown
//!
//! [`BoundedBlockingQueue::close`] rejects further pushes and wakes every waiter.
//! Items already queued stay poppable; [`BoundedBlockingQueue::pop_until_closed`]
//! returns `None` once the queue is both closed and empty.

use core::fmt;
use core::num::NonZeroUsize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::config::QueueConfig;
use crate::metrics::{AtomicMetrics, MetricsCollector, QueueStats};
use crate::queue::{PushError, QueueState};
use crate::trace::{debug, trace};
use crate::{Error, Result};

/// Upper bound on the slots reserved up front for bounded queues
const PREALLOCATE_LIMIT: usize = 1024;

/// State guarded by the queue lock
struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// A bounded, blocking, multi-producer multi-consumer FIFO queue
///
/// The queue is a monitor: its item sequence and closed flag are only ever touched
/// while holding one mutex. Share it between threads with [`std::sync::Arc`].
///
/// # Capacity
///
/// A bounded queue never holds more than `capacity` items. Unbounded queues (see
/// [`BoundedBlockingQueue::unbounded`]) never report [`QueueState::Full`] and their
/// pushes never wait.
///
/// # Ownership
///
/// Items are moved in on push and moved out on pop. A rejected push hands the item
/// back inside [`PushError`]. Items still queued when the queue is dropped are dropped
/// with it.
///
/// # Examples
///
/// ```rust
/// use handoff::BoundedBlockingQueue;
/// use std::sync::Arc;
/// use std::thread;
///
/// let queue = Arc::new(BoundedBlockingQueue::new(1));
///
/// let producer = {
///     let queue = Arc::clone(&queue);
///     thread::spawn(move || {
///         for i in 0..3 {
///             // Waits whenever the single slot is taken
///             queue.push_blocking(i).unwrap();
///         }
///     })
/// };
///
/// let received: Vec<i32> = (0..3).map(|_| queue.pop_blocking()).collect();
/// producer.join().unwrap();
/// assert_eq!(received, vec![0, 1, 2]);
/// ```
pub struct BoundedBlockingQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<NonZeroUsize>,
    metrics: AtomicMetrics,
    metrics_enabled: AtomicBool,
}

impl<T> BoundedBlockingQueue<T> {
    /// Create a queue holding at most `capacity` items
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. Use [`BoundedBlockingQueue::try_new`] to get an
    /// error instead.
    pub fn new(capacity: usize) -> Self {
        match NonZeroUsize::new(capacity) {
            Some(capacity) => Self::with_bound(Some(capacity)),
            None => panic!("Capacity must be greater than 0"),
        }
    }

    /// Create a bounded queue, rejecting a zero capacity with [`Error::InvalidCapacity`]
    pub fn try_new(capacity: usize) -> Result<Self> {
        NonZeroUsize::new(capacity)
            .map(|capacity| Self::with_bound(Some(capacity)))
            .ok_or(Error::InvalidCapacity)
    }

    /// Create a queue without a capacity bound
    pub fn unbounded() -> Self {
        Self::with_bound(None)
    }

    /// Create a queue from a [`QueueConfig`]
    pub fn with_config(config: QueueConfig) -> Self {
        Self::with_bound(config.capacity)
    }

    fn with_bound(capacity: Option<NonZeroUsize>) -> Self {
        let reserved = capacity.map_or(0, |c| c.get().min(PREALLOCATE_LIMIT));

        Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(reserved),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            metrics: AtomicMetrics::default(),
            metrics_enabled: AtomicBool::new(true),
        }
    }

    /// Pop the front item without waiting
    ///
    /// Returns `None` immediately when the queue is empty. Never suspends and holds the
    /// lock for a single state check.
    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        let item = state.items.pop_front();
        let len = state.items.len();
        drop(state);

        match item {
            Some(item) => {
                self.popped(len, 0);
                Some(item)
            }
            None => {
                self.record(|m| m.record_empty_pop());
                None
            }
        }
    }

    /// Pop the front item, waiting as long as the queue is empty
    ///
    /// The wait is unconditional: closing the queue does not wake this call without an
    /// item. Consumers that must observe shutdown use
    /// [`BoundedBlockingQueue::pop_until_closed`] or
    /// [`BoundedBlockingQueue::pop_timeout`].
    pub fn pop_blocking(&self) -> T {
        let mut state = self.state.lock();
        let (item, waits) = self.wait(&self.not_empty, &mut state, |s| s.items.pop_front());
        let len = state.items.len();
        drop(state);

        self.popped(len, waits);
        item
    }

    /// Pop the front item, waiting until one arrives or the queue is closed and drained
    ///
    /// Returns `None` only when the queue is closed and holds no more items.
    pub fn pop_until_closed(&self) -> Option<T> {
        let mut state = self.state.lock();
        let (item, waits) = self.wait(&self.not_empty, &mut state, |s| {
            match s.items.pop_front() {
                Some(item) => Some(Some(item)),
                None if s.closed => Some(None),
                None => None,
            }
        });
        let len = state.items.len();
        drop(state);

        match item {
            Some(item) => {
                self.popped(len, waits);
                Some(item)
            }
            None => {
                self.record(|m| m.record_empty_pop());
                trace!(waits, "pop found queue closed and drained");
                None
            }
        }
    }

    /// Pop the front item, waiting at most `timeout`
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the queue stays empty until the deadline
    /// - [`Error::Closed`] if the queue is closed and drained
    pub fn pop_timeout(&self, timeout: Duration) -> Result<T> {
        let mut state = self.state.lock();
        let (outcome, waits) =
            self.wait_timeout(&self.not_empty, &mut state, timeout, |s| {
                match s.items.pop_front() {
                    Some(item) => Some(Ok(item)),
                    None if s.closed => Some(Err(Error::Closed)),
                    None => None,
                }
            });
        let len = state.items.len();
        drop(state);

        match outcome {
            Some(Ok(item)) => {
                self.popped(len, waits);
                Ok(item)
            }
            Some(Err(err)) => {
                self.record(|m| m.record_empty_pop());
                Err(err)
            }
            None => {
                self.record(|m| {
                    m.record_empty_pop();
                    m.record_timeout();
                });
                trace!(?timeout, waits, "pop timed out");
                Err(Error::Timeout)
            }
        }
    }

    /// Push an item without waiting
    ///
    /// # Errors
    ///
    /// Hands the item back with [`Error::WouldBlock`] when the queue is at capacity, or
    /// with [`Error::Closed`] when the queue has been closed. The queue is left
    /// unchanged in both cases.
    pub fn try_push(&self, item: T) -> core::result::Result<(), PushError<T>> {
        let mut state = self.state.lock();
        if state.closed {
            drop(state);
            return Err(self.rejected(item, Error::Closed));
        }
        if self.is_at_capacity(&state) {
            drop(state);
            return Err(self.rejected(item, Error::WouldBlock));
        }
        state.items.push_back(item);
        let len = state.items.len();
        drop(state);

        self.pushed(len, 0);
        Ok(())
    }

    /// Push an item, waiting as long as the queue is at capacity
    ///
    /// On a queue that is never closed this always succeeds.
    ///
    /// # Errors
    ///
    /// Hands the item back with [`Error::Closed`] if the queue is closed before or
    /// while waiting.
    pub fn push_blocking(&self, item: T) -> core::result::Result<(), PushError<T>> {
        let mut state = self.state.lock();
        let (room, waits) = self.wait(&self.not_full, &mut state, |s| self.room_for_push(s));
        self.finish_push(state, item, Some(room), waits)
    }

    /// Push an item, waiting at most `timeout` for capacity
    ///
    /// # Errors
    ///
    /// Hands the item back with [`Error::Timeout`] if the queue stays full until the
    /// deadline, or with [`Error::Closed`] if the queue is closed.
    pub fn push_timeout(
        &self,
        item: T,
        timeout: Duration,
    ) -> core::result::Result<(), PushError<T>> {
        let mut state = self.state.lock();
        let (room, waits) =
            self.wait_timeout(&self.not_full, &mut state, timeout, |s| self.room_for_push(s));
        if room.is_none() {
            self.record(|m| m.record_timeout());
            trace!(?timeout, waits, "push timed out");
        }
        self.finish_push(state, item, room, waits)
    }

    /// Close the queue
    ///
    /// Further pushes fail with [`Error::Closed`]. Every blocked caller is woken:
    /// blocked pushers get their item back, `pop_until_closed` and `pop_timeout` callers
    /// drain what is left and then observe the close. Closing twice is a no-op.
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let len = state.items.len();
        drop(state);

        self.not_empty.notify_all();
        self.not_full.notify_all();
        debug!(remaining = len, "queue closed");
    }

    /// Remove every queued item, in FIFO order
    ///
    /// Blocked pushers are woken since the queue now has room.
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.state.lock();
        let items: Vec<T> = state.items.drain(..).collect();
        drop(state);

        if !items.is_empty() {
            self.not_full.notify_all();
            self.record(|m| m.record_pops(items.len() as u64));
            debug!(drained = items.len(), "queue drained");
        }
        items
    }

    /// Get the current number of items in the queue
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Check if the queue holds `capacity` items; always `false` when unbounded
    pub fn is_full(&self) -> bool {
        let state = self.state.lock();
        self.is_at_capacity(&state)
    }

    /// Check if the queue has been closed
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Current occupancy: empty, partially filled or full
    pub fn state(&self) -> QueueState {
        QueueState::classify(self.len(), self.capacity())
    }

    /// Maximum number of items, or `None` for an unbounded queue
    pub fn capacity(&self) -> Option<usize> {
        self.capacity.map(NonZeroUsize::get)
    }

    fn is_at_capacity(&self, state: &State<T>) -> bool {
        self.capacity
            .map_or(false, |capacity| state.items.len() >= capacity.get())
    }

    fn room_for_push(&self, state: &mut State<T>) -> Option<Result<()>> {
        if state.closed {
            Some(Err(Error::Closed))
        } else if self.is_at_capacity(state) {
            None
        } else {
            Some(Ok(()))
        }
    }

    /// Predicate wait: run `attempt` under the lock, suspend on `condvar` until it
    /// yields a value. Returns the value and how many times the caller suspended.
    fn wait<R, F>(
        &self,
        condvar: &Condvar,
        state: &mut MutexGuard<'_, State<T>>,
        mut attempt: F,
    ) -> (R, u64)
    where
        F: FnMut(&mut State<T>) -> Option<R>,
    {
        let mut waits = 0;
        loop {
            if let Some(result) = attempt(&mut **state) {
                return (result, waits);
            }
            waits += 1;
            self.record(|m| m.record_waits(1));
            condvar.wait(state);
        }
    }

    /// Deadline-bounded predicate wait; `None` means the deadline passed first.
    ///
    /// The condition is re-checked before the deadline, so a notification that lands
    /// together with the timeout is never discarded.
    fn wait_timeout<R, F>(
        &self,
        condvar: &Condvar,
        state: &mut MutexGuard<'_, State<T>>,
        timeout: Duration,
        mut attempt: F,
    ) -> (Option<R>, u64)
    where
        F: FnMut(&mut State<T>) -> Option<R>,
    {
        let deadline = match Instant::now().checked_add(timeout) {
            Some(deadline) => deadline,
            // Too far in the future to represent: wait without a deadline
            None => {
                let (result, waits) = self.wait(condvar, state, attempt);
                return (Some(result), waits);
            }
        };

        let mut waits = 0;
        loop {
            if let Some(result) = attempt(&mut **state) {
                return (Some(result), waits);
            }
            if Instant::now() >= deadline {
                return (None, waits);
            }
            waits += 1;
            self.record(|m| m.record_waits(1));
            let _ = condvar.wait_until(state, deadline);
        }
    }

    fn finish_push(
        &self,
        mut state: MutexGuard<'_, State<T>>,
        item: T,
        room: Option<Result<()>>,
        waits: u64,
    ) -> core::result::Result<(), PushError<T>> {
        match room {
            Some(Ok(())) => {
                state.items.push_back(item);
                let len = state.items.len();
                drop(state);

                self.pushed(len, waits);
                Ok(())
            }
            Some(Err(err)) => {
                drop(state);
                trace!(waits, "push gave up");
                Err(self.rejected(item, err))
            }
            None => {
                drop(state);
                Err(self.rejected(item, Error::Timeout))
            }
        }
    }

    // The helpers below run after the guard is dropped.

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn pushed(&self, len: usize, waits: u64) {
        self.not_empty.notify_one();
        self.record(|m| m.record_push(len));
        trace!(len, waits, "item pushed");
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn popped(&self, len: usize, waits: u64) {
        self.not_full.notify_one();
        self.record(|m| m.record_pops(1));
        trace!(len, waits, "item popped");
    }

    fn rejected(&self, item: T, kind: Error) -> PushError<T> {
        self.record(|m| m.record_rejected_push());
        trace!(reason = %kind, "push rejected");
        PushError::new(item, kind)
    }

    #[inline]
    fn record<F: FnOnce(&AtomicMetrics)>(&self, f: F) {
        if self.metrics_enabled.load(Ordering::Relaxed) {
            f(&self.metrics);
        }
    }
}

impl<T> Default for BoundedBlockingQueue<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<T> fmt::Debug for BoundedBlockingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("BoundedBlockingQueue");
        s.field("capacity", &self.capacity());
        match self.state.try_lock() {
            Some(state) => s
                .field("len", &state.items.len())
                .field("closed", &state.closed),
            None => s.field("state", &format_args!("<locked>")),
        };
        s.finish()
    }
}

impl<T> MetricsCollector for BoundedBlockingQueue<T> {
    fn metrics(&self) -> QueueStats {
        self.metrics.snapshot()
    }

    fn reset_metrics(&self) {
        self.metrics.reset();
    }

    fn set_metrics_enabled(&self, enabled: bool) {
        self.metrics_enabled.store(enabled, Ordering::Relaxed);
    }

    fn is_metrics_enabled(&self) -> bool {
        self.metrics_enabled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let queue: BoundedBlockingQueue<i32> = BoundedBlockingQueue::new(3);

        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.state(), QueueState::Empty);
        assert_eq!(queue.try_pop(), None);

        queue.try_push(1).unwrap();
        assert_eq!(queue.state(), QueueState::Partial);
        queue.try_push(2).unwrap();
        queue.push_blocking(3).unwrap();

        assert_eq!(queue.len(), 3);
        assert!(queue.is_full());
        assert_eq!(queue.state(), QueueState::Full);

        let rejected = queue.try_push(4).unwrap_err();
        assert!(rejected.is_full());
        assert_eq!(rejected.into_inner(), 4);

        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.pop_blocking(), 2);
        assert_eq!(queue.try_pop(), Some(3));
        assert_eq!(queue.try_pop(), None);

        assert!(queue.is_empty());
        assert_eq!(queue.state(), QueueState::Empty);
    }

    #[test]
    fn test_construction() {
        assert_eq!(
            BoundedBlockingQueue::<u8>::try_new(0).unwrap_err(),
            Error::InvalidCapacity
        );
        assert_eq!(BoundedBlockingQueue::<u8>::try_new(5).unwrap().capacity(), Some(5));
        assert_eq!(BoundedBlockingQueue::<u8>::unbounded().capacity(), None);
        assert_eq!(BoundedBlockingQueue::<u8>::default().capacity(), None);
    }

    #[test]
    #[should_panic(expected = "Capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        let _queue: BoundedBlockingQueue<u8> = BoundedBlockingQueue::new(0);
    }

    #[test]
    fn test_unbounded_never_full() {
        let queue = BoundedBlockingQueue::unbounded();
        for i in 0..5000 {
            queue.try_push(i).unwrap();
        }
        assert!(!queue.is_full());
        assert_eq!(queue.state(), QueueState::Partial);
        assert_eq!(queue.len(), 5000);
    }

    #[test]
    fn test_close_rejects_pushes_and_drains() {
        let queue = BoundedBlockingQueue::new(4);
        queue.try_push('a').unwrap();
        queue.try_push('b').unwrap();
        queue.close();
        queue.close();

        assert!(queue.is_closed());
        assert!(queue.try_push('c').unwrap_err().is_closed());
        assert!(queue.push_blocking('d').unwrap_err().is_closed());
        assert!(queue
            .push_timeout('e', Duration::from_millis(5))
            .unwrap_err()
            .is_closed());

        assert_eq!(queue.pop_until_closed(), Some('a'));
        assert_eq!(queue.pop_timeout(Duration::from_millis(5)), Ok('b'));
        assert_eq!(queue.pop_until_closed(), None);
        assert_eq!(
            queue.pop_timeout(Duration::from_millis(5)),
            Err(Error::Closed)
        );
    }

    #[test]
    fn test_drain_keeps_fifo_order() {
        let queue = BoundedBlockingQueue::new(8);
        for i in 0..5 {
            queue.try_push(i).unwrap();
        }
        assert_eq!(queue.drain(), vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_metrics_recorded() {
        let queue = BoundedBlockingQueue::new(1);
        queue.try_push(1).unwrap();
        let _ = queue.try_push(2);
        queue.try_pop();
        queue.try_pop();

        let stats = queue.metrics();
        assert_eq!(stats.pushes, 1);
        assert_eq!(stats.pops, 1);
        assert_eq!(stats.rejected_pushes, 1);
        assert_eq!(stats.empty_pops, 1);
        assert_eq!(stats.waits, 0);
        assert_eq!(stats.peak_len, 1);

        queue.set_metrics_enabled(false);
        assert!(!queue.is_metrics_enabled());
        queue.try_push(3).unwrap();
        assert_eq!(queue.metrics().pushes, 1);

        queue.reset_metrics();
        assert_eq!(queue.metrics(), QueueStats::default());
    }

    #[test]
    fn test_spurious_wakeups_keep_consumer_waiting() {
        use std::sync::Arc;
        use std::thread;

        let queue = Arc::new(BoundedBlockingQueue::new(1));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop_blocking())
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while queue.metrics().waits == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }

        // Wake the consumer without giving it anything to take
        for _ in 0..50 {
            queue.not_empty.notify_all();
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!consumer.is_finished());
        assert!(queue.is_empty());

        queue.try_push(9).unwrap();
        assert_eq!(consumer.join().unwrap(), 9);
        assert!(queue.metrics().waits >= 2);
    }

    #[test]
    fn test_debug_output() {
        let queue = BoundedBlockingQueue::new(2);
        queue.try_push(String::from("x")).unwrap();
        let rendered = format!("{:?}", queue);
        assert!(rendered.contains("capacity: Some(2)"));
        assert!(rendered.contains("len: 1"));
        assert!(rendered.contains("closed: false"));
    }
}
