//! Multi-producer, multi-consumer pipeline
//!
//! Runs a [`WorkloadConfig`]: one thread per producer and consumer, all sharing one
//! queue. The last producer to finish closes the queue, which lets consumers drain
//! what is left and stop. The last consumer to finish closes it too, so producers with
//! nobody left to take their items are turned away instead of blocking forever. Plans
//! that do not add up therefore never hang a run; items nobody consumed are drained
//! and reported as leftover.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::{ConsumerPlan, ProducerPlan, QueueConfig, WorkloadConfig};
use crate::metrics::{MetricsCollector, QueueStats};
use crate::queue::BoundedBlockingQueue;
use crate::trace::{debug, info, warn};
use crate::worker::{run_worker, IdAllocator, Item, Role, Worker, WorkerReport};
use crate::{Error, Result};

/// Simulated work per produced item in [`Pipeline::classic`]
const CLASSIC_PRODUCE_DELAY: Duration = Duration::from_secs(1);
/// Simulated work per consumed item in [`Pipeline::classic`]
const CLASSIC_CONSUME_DELAY: Duration = Duration::from_secs(2);
/// Items moved by [`Pipeline::classic`]
const CLASSIC_ITEMS: usize = 10;

/// A configured producer/consumer run
#[derive(Debug)]
pub struct Pipeline {
    config: WorkloadConfig,
    queue: Arc<BoundedBlockingQueue<Item>>,
    ids: Arc<IdAllocator>,
}

impl Pipeline {
    /// Prepare a run
    ///
    /// # Errors
    ///
    /// [`Error::InvalidWorkload`] if the workload has no producers or no consumers.
    pub fn new(config: WorkloadConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    /// One producer and one consumer moving ten items through an unbounded queue,
    /// spending one second producing and two seconds consuming each item
    pub fn classic() -> Self {
        let config = WorkloadConfig::new(QueueConfig::unbounded())
            .producer(ProducerPlan::new(CLASSIC_ITEMS).delay(CLASSIC_PRODUCE_DELAY))
            .consumer(ConsumerPlan::new(CLASSIC_ITEMS).delay(CLASSIC_CONSUME_DELAY));
        Self::from_valid(config)
    }

    fn from_valid(config: WorkloadConfig) -> Self {
        Self {
            queue: Arc::new(BoundedBlockingQueue::with_config(config.queue)),
            ids: Arc::new(IdAllocator::new()),
            config,
        }
    }

    /// The workload being run
    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// The queue shared by the workers
    pub fn queue(&self) -> &Arc<BoundedBlockingQueue<Item>> {
        &self.queue
    }

    /// Run every worker to completion
    ///
    /// Consumers are started first so that producers never wait on an unattended
    /// queue longer than necessary. The queue is closed once either side has fully
    /// finished.
    ///
    /// # Errors
    ///
    /// [`Error::Spawn`] if a worker thread cannot be started. Workers that did start are
    /// stopped by closing the queue and joined before returning.
    ///
    /// # Panics
    ///
    /// A panic inside a worker is propagated to the caller.
    pub fn run(self) -> Result<RunReport> {
        let started = Instant::now();
        info!(
            producers = self.config.producers.len(),
            consumers = self.config.consumers.len(),
            capacity = ?self.config.queue.capacity(),
            planned_production = self.config.planned_production(),
            planned_consumption = self.config.planned_consumption(),
            "pipeline starting"
        );
        if !self.config.is_balanced() {
            warn!(
                planned_production = self.config.planned_production(),
                planned_consumption = self.config.planned_consumption(),
                "production and consumption plans differ"
            );
        }

        let consumers_left = Arc::new(AtomicUsize::new(self.config.consumers.len()));
        let producers_left = Arc::new(AtomicUsize::new(self.config.producers.len()));

        let mut consumers = Vec::with_capacity(self.config.consumers.len());
        for (index, plan) in self.config.consumers.iter().copied().enumerate() {
            let worker = Worker::Consumer(plan);
            match self.spawn(format!("consumer-{index}"), index, worker, &consumers_left) {
                Ok(handle) => consumers.push(handle),
                Err(err) => return Err(self.abort(consumers, Vec::new(), err)),
            }
        }

        let mut producers = Vec::with_capacity(self.config.producers.len());
        for (index, plan) in self.config.producers.iter().copied().enumerate() {
            let worker = Worker::Producer(plan);
            match self.spawn(format!("producer-{index}"), index, worker, &producers_left) {
                Ok(handle) => producers.push(handle),
                Err(err) => return Err(self.abort(consumers, producers, err)),
            }
        }

        let producers = join_all(producers);
        let consumers = join_all(consumers);

        let leftover: Vec<u64> = self.queue.drain().into_iter().map(|item| item.id()).collect();
        if !leftover.is_empty() {
            warn!(leftover = leftover.len(), "items left unconsumed");
        }

        let report = RunReport {
            producers,
            consumers,
            leftover,
            stats: self.queue.metrics(),
            elapsed: started.elapsed(),
        };
        info!(
            produced = report.produced(),
            consumed = report.consumed(),
            leftover = report.leftover.len(),
            elapsed = ?report.elapsed,
            "pipeline finished"
        );
        Ok(report)
    }

    fn spawn(
        &self,
        name: String,
        index: usize,
        worker: Worker,
        remaining: &Arc<AtomicUsize>,
    ) -> Result<JoinHandle<WorkerReport>> {
        let ids = Arc::clone(&self.ids);
        let last_out = CloseOnLast {
            remaining: Arc::clone(remaining),
            queue: Arc::clone(&self.queue),
            role: worker.role(),
        };

        thread::Builder::new()
            .name(name)
            .spawn(move || {
                let last_out = last_out;
                run_worker(index, worker, &last_out.queue, &ids)
            })
            .map_err(|err| Error::Spawn(err.to_string()))
    }

    fn abort(
        &self,
        consumers: Vec<JoinHandle<WorkerReport>>,
        producers: Vec<JoinHandle<WorkerReport>>,
        err: Error,
    ) -> Error {
        warn!(error = %err, "aborting pipeline");
        self.queue.close();
        for handle in producers.into_iter().chain(consumers) {
            let _ = handle.join();
        }
        err
    }
}

/// Closes the queue when the last worker of a role exits, panics included
struct CloseOnLast {
    remaining: Arc<AtomicUsize>,
    queue: Arc<BoundedBlockingQueue<Item>>,
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    role: Role,
}

impl Drop for CloseOnLast {
    fn drop(&mut self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            debug!(role = ?self.role, "last worker of role exited, closing queue");
            self.queue.close();
        }
    }
}

fn join_all(handles: Vec<JoinHandle<WorkerReport>>) -> Vec<WorkerReport> {
    handles
        .into_iter()
        .map(|handle| {
            handle
                .join()
                .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
        })
        .collect()
}

/// Outcome of a [`Pipeline::run`]
#[derive(Debug, Clone)]
pub struct RunReport {
    /// One report per producer, by index
    pub producers: Vec<WorkerReport>,
    /// One report per consumer, by index
    pub consumers: Vec<WorkerReport>,
    /// Ids still queued after every consumer stopped, in FIFO order
    pub leftover: Vec<u64>,
    /// Queue counters at the end of the run
    pub stats: QueueStats,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl RunReport {
    /// Items pushed across all producers
    pub fn produced(&self) -> usize {
        self.producers.iter().map(WorkerReport::handled).sum()
    }

    /// Items processed across all consumers
    pub fn consumed(&self) -> usize {
        self.consumers.iter().map(WorkerReport::handled).sum()
    }

    /// Every pushed id, grouped by producer
    pub fn produced_ids(&self) -> Vec<u64> {
        self.producers.iter().flat_map(|r| r.ids.iter().copied()).collect()
    }

    /// Every processed id, grouped by consumer
    pub fn consumed_ids(&self) -> Vec<u64> {
        self.consumers.iter().flat_map(|r| r.ids.iter().copied()).collect()
    }

    /// All produced items were consumed and nothing was left over
    pub fn is_balanced(&self) -> bool {
        self.produced() == self.consumed() && self.leftover.is_empty()
    }

    /// Every pushed item came out exactly once, either to a consumer or as leftover
    pub fn is_exactly_once(&self) -> bool {
        let mut produced = self.produced_ids();
        produced.sort_unstable();

        let mut delivered = self.consumed_ids();
        delivered.extend_from_slice(&self.leftover);
        delivered.sort_unstable();

        produced == delivered
    }
}
