//! Producer and consumer workers
//!
//! Workers are the queue's callers. A producer creates [`Item`]s and pushes them; a
//! consumer pops items, processes them and drops them. Neither holds a lock of its own:
//! all coordination goes through the queue.
//!
//! Both roles are described by data ([`Worker`]) and executed by one function,
//! [`run_worker`]. [`pipeline::Pipeline`] wires any number of them to a shared queue.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crate::queue::{BoundedBlockingQueue, PushError};
use crate::trace::{debug, info, warn};

pub use crate::config::{ConsumerPlan, ProducerPlan, Strategy};

pub mod pipeline;

pub use pipeline::{Pipeline, RunReport};

/// Hands out increasing item ids
///
/// Shared by every producer of a run, usually through an `Arc`. Ids are unique per
/// allocator; two allocators may hand out the same id.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    /// An allocator whose first id is 0
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// An allocator whose first id is `first`
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Take the next id
    #[inline]
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// The id the next call to [`IdAllocator::next_id`] will return
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// A unit of work
///
/// Deliberately neither `Clone` nor `Copy`: an item has exactly one owner at a time.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Item {
    id: u64,
}

impl Item {
    /// An item with an explicit id
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    /// An item carrying the allocator's next id
    pub fn create(ids: &IdAllocator) -> Self {
        Self::new(ids.next_id())
    }

    /// Identity of this item
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Which side of the queue a worker sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Creates and pushes items
    Producer,
    /// Pops and processes items
    Consumer,
}

/// A worker's assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Worker {
    /// Push `plan.items` new items
    Producer(ProducerPlan),
    /// Pop and process `plan.items` items
    Consumer(ConsumerPlan),
}

impl Worker {
    /// Role of this worker
    pub fn role(&self) -> Role {
        match self {
            Worker::Producer(_) => Role::Producer,
            Worker::Consumer(_) => Role::Consumer,
        }
    }

    /// Number of items the worker intends to handle
    pub fn planned(&self) -> usize {
        match self {
            Worker::Producer(plan) => plan.items,
            Worker::Consumer(plan) => plan.items,
        }
    }
}

/// What one worker actually did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    /// Index of the worker within its role
    pub index: usize,
    /// Producer or consumer
    pub role: Role,
    /// Items the worker was asked to handle
    pub planned: usize,
    /// Ids of the items pushed (producer) or processed (consumer), in order
    pub ids: Vec<u64>,
}

impl WorkerReport {
    fn new(index: usize, worker: &Worker) -> Self {
        Self {
            index,
            role: worker.role(),
            planned: worker.planned(),
            ids: Vec::with_capacity(worker.planned()),
        }
    }

    /// Number of items handled
    pub fn handled(&self) -> usize {
        self.ids.len()
    }

    /// Whether the worker stopped before completing its plan
    pub fn finished_short(&self) -> bool {
        self.handled() < self.planned
    }
}

/// Run a worker to completion on the current thread
///
/// Producers stop early if the queue is closed under them; consumers stop early once
/// the queue is closed and drained. Either way the report says how far they got.
pub fn run_worker(
    index: usize,
    worker: Worker,
    queue: &BoundedBlockingQueue<Item>,
    ids: &IdAllocator,
) -> WorkerReport {
    let report = match worker {
        Worker::Producer(plan) => produce(WorkerReport::new(index, &worker), plan, queue, ids),
        Worker::Consumer(plan) => consume(WorkerReport::new(index, &worker), plan, queue),
    };

    info!(
        role = ?report.role,
        worker = index,
        handled = report.handled(),
        planned = report.planned,
        "worker finished"
    );
    report
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn produce(
    mut report: WorkerReport,
    plan: ProducerPlan,
    queue: &BoundedBlockingQueue<Item>,
    ids: &IdAllocator,
) -> WorkerReport {
    for _ in 0..plan.items {
        let item = Item::create(ids);
        let id = item.id();
        simulate_work(plan.delay);

        match push(queue, item, plan.strategy) {
            Ok(()) => {
                debug!(worker = report.index, id, "item produced");
                report.ids.push(id);
            }
            Err(err) => {
                warn!(worker = report.index, id, reason = %err.kind(), "producer stopping");
                break;
            }
        }
    }
    report
}

fn consume(
    mut report: WorkerReport,
    plan: ConsumerPlan,
    queue: &BoundedBlockingQueue<Item>,
) -> WorkerReport {
    while report.handled() < plan.items {
        let Some(item) = pop(queue, plan.strategy) else {
            warn!(
                worker = report.index,
                handled = report.handled(),
                planned = plan.items,
                "queue closed and drained before plan completed"
            );
            break;
        };

        let id = process(item, plan.delay);
        debug!(worker = report.index, id, "item consumed");
        report.ids.push(id);
    }
    report
}

fn push(
    queue: &BoundedBlockingQueue<Item>,
    item: Item,
    strategy: Strategy,
) -> Result<(), PushError<Item>> {
    match strategy {
        Strategy::Blocking => queue.push_blocking(item),
        Strategy::Polling { interval } => {
            let mut item = item;
            loop {
                match queue.try_push(item) {
                    Ok(()) => return Ok(()),
                    Err(err) if err.is_full() => {
                        item = err.into_inner();
                        thread::sleep(interval);
                    }
                    Err(err) => return Err(err),
                }
            }
        }
    }
}

fn pop(queue: &BoundedBlockingQueue<Item>, strategy: Strategy) -> Option<Item> {
    match strategy {
        Strategy::Blocking => queue.pop_until_closed(),
        Strategy::Polling { interval } => loop {
            if let Some(item) = queue.try_pop() {
                return Some(item);
            }
            // No push can land after close, so one last attempt settles it
            if queue.is_closed() {
                return queue.try_pop();
            }
            thread::sleep(interval);
        },
    }
}

/// Simulate processing, then release the item. Returns the processed id.
fn process(item: Item, delay: Duration) -> u64 {
    simulate_work(delay);
    item.id()
}

fn simulate_work(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}
