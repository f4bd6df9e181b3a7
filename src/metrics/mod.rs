//! Queue Metrics Module
//!
//! Counters describing how a queue has been used: successful transfers, rejected
//! attempts and the number of times callers had to suspend. Counters are relaxed
//! atomics. Transfer counters are updated after the queue lock has been released; the
//! wait counter is bumped just before a caller suspends.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Snapshot of a queue's counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Items successfully pushed
    pub pushes: u64,
    /// Items successfully popped (drained items included)
    pub pops: u64,
    /// Push attempts that handed the item back (full, closed or timed out)
    pub rejected_pushes: u64,
    /// Pop attempts that returned without an item
    pub empty_pops: u64,
    /// Times a caller suspended on a condition variable
    pub waits: u64,
    /// Deadline-bounded operations that expired
    pub timeouts: u64,
    /// Largest length observed after a push
    pub peak_len: usize,
}

impl QueueStats {
    /// Total number of attempted operations
    pub fn total_operations(&self) -> u64 {
        self.pushes + self.pops + self.rejected_pushes + self.empty_pops
    }

    /// Percentage of attempted operations that transferred an item
    pub fn success_rate(&self) -> f64 {
        let total = self.total_operations();
        if total == 0 {
            0.0
        } else {
            ((self.pushes + self.pops) as f64 / total as f64) * 100.0
        }
    }

    /// Average number of suspensions per successful transfer
    pub fn waits_per_transfer(&self) -> f64 {
        let transfers = self.pushes + self.pops;
        if transfers == 0 {
            0.0
        } else {
            self.waits as f64 / transfers as f64
        }
    }

    /// Items pushed but not (yet) popped
    pub fn in_flight(&self) -> u64 {
        self.pushes.saturating_sub(self.pops)
    }
}

/// Internal atomic metrics collection
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    pushes: AtomicU64,
    pops: AtomicU64,
    rejected_pushes: AtomicU64,
    empty_pops: AtomicU64,
    waits: AtomicU64,
    timeouts: AtomicU64,
    peak_len: AtomicUsize,
}

impl AtomicMetrics {
    /// Record a successful push that left the queue holding `len` items
    pub fn record_push(&self, len: usize) {
        self.pushes.fetch_add(1, Ordering::Relaxed);

        let mut current_peak = self.peak_len.load(Ordering::Relaxed);
        while len > current_peak {
            match self.peak_len.compare_exchange_weak(
                current_peak,
                len,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current_peak = x,
            }
        }
    }

    /// Record `count` successful pops
    pub fn record_pops(&self, count: u64) {
        self.pops.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a push that returned its item to the caller
    pub fn record_rejected_push(&self) {
        self.rejected_pushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a pop that returned without an item
    pub fn record_empty_pop(&self) {
        self.empty_pops.fetch_add(1, Ordering::Relaxed);
    }

    /// Record `count` condition-variable suspensions
    pub fn record_waits(&self, count: u64) {
        self.waits.fetch_add(count, Ordering::Relaxed);
    }

    /// Record an expired deadline
    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> QueueStats {
        QueueStats {
            pushes: self.pushes.load(Ordering::Relaxed),
            pops: self.pops.load(Ordering::Relaxed),
            rejected_pushes: self.rejected_pushes.load(Ordering::Relaxed),
            empty_pops: self.empty_pops.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            peak_len: self.peak_len.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.pushes.store(0, Ordering::Relaxed);
        self.pops.store(0, Ordering::Relaxed);
        self.rejected_pushes.store(0, Ordering::Relaxed);
        self.empty_pops.store(0, Ordering::Relaxed);
        self.waits.store(0, Ordering::Relaxed);
        self.timeouts.store(0, Ordering::Relaxed);
        self.peak_len.store(0, Ordering::Relaxed);
    }
}

/// Trait for data structures that support metrics collection
pub trait MetricsCollector {
    /// Get current metrics
    fn metrics(&self) -> QueueStats;

    /// Reset all metrics
    fn reset_metrics(&self);

    /// Enable or disable metrics collection
    fn set_metrics_enabled(&self, enabled: bool);

    /// Check if metrics collection is enabled
    fn is_metrics_enabled(&self) -> bool;
}
