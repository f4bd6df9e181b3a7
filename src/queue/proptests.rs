//! Property-based tests for the blocking queue using proptest
//!
//! These tests drive the queue with generated operation sequences and check it against
//! a plain `VecDeque` model.

use crate::metrics::MetricsCollector;
use crate::queue::{BoundedBlockingQueue, QueueState};
use proptest::prelude::*;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone)]
enum Op {
    TryPush(u16),
    TryPop,
    Drain,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => any::<u16>().prop_map(Op::TryPush),
        4 => Just(Op::TryPop),
        1 => Just(Op::Drain),
    ]
}

/// Property: FIFO ordering and capacity hold for single-threaded use
mod sequential_properties {
    use super::*;

    proptest! {
        #[test]
        fn test_fifo_ordering_single_thread(
            values in prop::collection::vec(any::<i32>(), 1..200)
        ) {
            let queue = BoundedBlockingQueue::unbounded();
            for &value in &values {
                prop_assert!(queue.try_push(value).is_ok());
            }

            for expected in values {
                prop_assert_eq!(queue.try_pop(), Some(expected));
            }
            prop_assert!(queue.is_empty());
        }

        #[test]
        fn test_capacity_invariant(
            capacity in 1usize..32,
            values in prop::collection::vec(any::<i32>(), 1..100)
        ) {
            let queue = BoundedBlockingQueue::new(capacity);
            let mut accepted = 0;

            for &value in &values {
                match queue.try_push(value) {
                    Ok(()) => accepted += 1,
                    Err(rejected) => {
                        prop_assert!(rejected.is_full());
                        prop_assert_eq!(rejected.into_inner(), value);
                        prop_assert_eq!(queue.len(), capacity);
                    }
                }
                prop_assert!(queue.len() <= capacity);
            }

            prop_assert_eq!(accepted, values.len().min(capacity));
            prop_assert_eq!(queue.len(), accepted);
        }

        #[test]
        fn test_matches_model(
            capacity in 1usize..16,
            ops in prop::collection::vec(op_strategy(), 1..300)
        ) {
            let queue = BoundedBlockingQueue::new(capacity);
            let mut model: VecDeque<u16> = VecDeque::new();

            for op in ops {
                match op {
                    Op::TryPush(value) => {
                        let accepted = queue.try_push(value).is_ok();
                        prop_assert_eq!(accepted, model.len() < capacity);
                        if accepted {
                            model.push_back(value);
                        }
                    }
                    Op::TryPop => {
                        prop_assert_eq!(queue.try_pop(), model.pop_front());
                    }
                    Op::Drain => {
                        let drained: Vec<u16> = model.drain(..).collect();
                        prop_assert_eq!(queue.drain(), drained);
                    }
                }

                prop_assert_eq!(queue.len(), model.len());
                prop_assert_eq!(
                    queue.state(),
                    QueueState::classify(model.len(), Some(capacity))
                );
            }
        }

        #[test]
        fn test_metrics_balance(
            capacity in 1usize..8,
            ops in prop::collection::vec(op_strategy(), 1..200)
        ) {
            let queue = BoundedBlockingQueue::new(capacity);
            for op in ops {
                match op {
                    Op::TryPush(value) => { let _ = queue.try_push(value); }
                    Op::TryPop => { queue.try_pop(); }
                    Op::Drain => { queue.drain(); }
                }
            }

            let stats = queue.metrics();
            prop_assert_eq!(stats.in_flight() as usize, queue.len());
            prop_assert!(stats.peak_len <= capacity);
            prop_assert_eq!(stats.waits, 0);
        }
    }
}

/// Property: concurrent transfers deliver every item exactly once
mod concurrent_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn test_exactly_once_delivery(
            capacity in 1usize..8,
            plans in prop::collection::vec(1usize..50, 1..5),
            consumers in 1usize..5
        ) {
            let queue = Arc::new(BoundedBlockingQueue::new(capacity));

            let producer_handles: Vec<_> = plans
                .iter()
                .enumerate()
                .map(|(p, &count)| {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || {
                        for i in 0..count {
                            queue.push_blocking((p, i)).unwrap();
                        }
                    })
                })
                .collect();

            let consumer_handles: Vec<_> = (0..consumers)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || {
                        let mut seen = Vec::new();
                        while let Some(value) = queue.pop_until_closed() {
                            seen.push(value);
                        }
                        seen
                    })
                })
                .collect();

            for handle in producer_handles {
                handle.join().unwrap();
            }
            queue.close();

            let mut delivered: Vec<(usize, usize)> = consumer_handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect();
            delivered.sort_unstable();

            let mut expected: Vec<(usize, usize)> = plans
                .iter()
                .enumerate()
                .flat_map(|(p, &count)| (0..count).map(move |i| (p, i)))
                .collect();
            expected.sort_unstable();

            prop_assert_eq!(delivered, expected);
            prop_assert!(queue.metrics().peak_len <= capacity);
        }
    }
}
