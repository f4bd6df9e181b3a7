//! Queue and workload configuration
//!
//! Plain structs with builder-style setters. With the `serde` feature every type here
//! can be loaded from any serde format; durations use serde's `{ secs, nanos }` form.

use core::num::NonZeroUsize;
use std::time::Duration;

use crate::{Error, Result};

/// Construction parameters for a [`BoundedBlockingQueue`](crate::BoundedBlockingQueue)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct QueueConfig {
    /// Maximum number of items held at once; `None` means unbounded
    pub capacity: Option<NonZeroUsize>,
}

impl QueueConfig {
    /// A bounded configuration
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCapacity`] when `capacity` is zero.
    pub fn bounded(capacity: usize) -> Result<Self> {
        NonZeroUsize::new(capacity)
            .map(|capacity| Self {
                capacity: Some(capacity),
            })
            .ok_or(Error::InvalidCapacity)
    }

    /// An unbounded configuration (the default)
    pub fn unbounded() -> Self {
        Self { capacity: None }
    }

    /// Capacity as a plain number
    pub fn capacity(&self) -> Option<usize> {
        self.capacity.map(NonZeroUsize::get)
    }
}

/// How a worker reacts when the queue cannot serve it immediately
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Strategy {
    /// Suspend inside the queue until it can proceed
    #[default]
    Blocking,
    /// Use the non-blocking operations and sleep `interval` between failed attempts
    Polling {
        /// Pause between attempts
        interval: Duration,
    },
}

/// Work assigned to one producer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProducerPlan {
    /// Number of items to create and push
    pub items: usize,
    /// Push strategy
    pub strategy: Strategy,
    /// Simulated work before each push
    pub delay: Duration,
}

impl ProducerPlan {
    /// Produce `items` items with blocking pushes and no delay
    pub fn new(items: usize) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Set the push strategy
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the simulated work per item
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Work assigned to one consumer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConsumerPlan {
    /// Number of items to pop and process
    pub items: usize,
    /// Pop strategy
    pub strategy: Strategy,
    /// Simulated processing after each pop
    pub delay: Duration,
}

impl ConsumerPlan {
    /// Consume `items` items with blocking pops and no delay
    pub fn new(items: usize) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    /// Set the pop strategy
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the simulated processing per item
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A full producer/consumer run: one queue, any number of workers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WorkloadConfig {
    /// Queue shared by every worker
    pub queue: QueueConfig,
    /// One entry per producer thread
    pub producers: Vec<ProducerPlan>,
    /// One entry per consumer thread
    pub consumers: Vec<ConsumerPlan>,
}

impl WorkloadConfig {
    /// Start a workload around the given queue configuration
    pub fn new(queue: QueueConfig) -> Self {
        Self {
            queue,
            ..Self::default()
        }
    }

    /// Add a producer
    pub fn producer(mut self, plan: ProducerPlan) -> Self {
        self.producers.push(plan);
        self
    }

    /// Add a consumer
    pub fn consumer(mut self, plan: ConsumerPlan) -> Self {
        self.consumers.push(plan);
        self
    }

    /// Total items the producers intend to push
    pub fn planned_production(&self) -> usize {
        self.producers.iter().map(|p| p.items).sum()
    }

    /// Total items the consumers intend to pop
    pub fn planned_consumption(&self) -> usize {
        self.consumers.iter().map(|c| c.items).sum()
    }

    /// Whether production and consumption plans add up to the same total
    pub fn is_balanced(&self) -> bool {
        self.planned_production() == self.planned_consumption()
    }

    /// Check that the workload can run
    ///
    /// Unbalanced plans are allowed; the pipeline reports the difference instead.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidWorkload`] when there are no producers or no consumers.
    pub fn validate(&self) -> Result<()> {
        if self.producers.is_empty() {
            return Err(Error::InvalidWorkload("at least one producer is required"));
        }
        if self.consumers.is_empty() {
            return Err(Error::InvalidWorkload("at least one consumer is required"));
        }
        Ok(())
    }
}
