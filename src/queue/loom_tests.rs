//! Loom-based model checking of the monitor discipline
//!
//! Loom cannot instrument `parking_lot`, so these tests run a compact copy of the
//! queue's locking protocol built on loom's `Mutex` and `Condvar`: one lock, one
//! condition variable per direction, predicate waits, notification after unlock.
//! Loom then explores every interleaving, including the window between a waiter's
//! emptiness check and its suspension.

#[cfg(test)]
mod loom_tests {
    use loom::sync::{Arc, Condvar, Mutex};
    use loom::thread;
    use std::collections::VecDeque;

    struct LoomMonitor<T> {
        items: Mutex<VecDeque<T>>,
        not_empty: Condvar,
        not_full: Condvar,
        capacity: usize,
    }

    impl<T> LoomMonitor<T> {
        fn new(capacity: usize) -> Self {
            Self {
                items: Mutex::new(VecDeque::new()),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                capacity,
            }
        }

        fn try_push(&self, value: T) -> Result<(), T> {
            let mut items = self.items.lock().unwrap();
            if items.len() >= self.capacity {
                return Err(value);
            }
            items.push_back(value);
            drop(items);
            self.not_empty.notify_one();
            Ok(())
        }

        fn push_blocking(&self, value: T) {
            let mut items = self.items.lock().unwrap();
            while items.len() >= self.capacity {
                items = self.not_full.wait(items).unwrap();
            }
            items.push_back(value);
            assert!(items.len() <= self.capacity);
            drop(items);
            self.not_empty.notify_one();
        }

        fn try_pop(&self) -> Option<T> {
            let mut items = self.items.lock().unwrap();
            let value = items.pop_front();
            drop(items);
            if value.is_some() {
                self.not_full.notify_one();
            }
            value
        }

        fn pop_blocking(&self) -> T {
            let mut items = self.items.lock().unwrap();
            let value = loop {
                if let Some(value) = items.pop_front() {
                    break value;
                }
                items = self.not_empty.wait(items).unwrap();
            };
            drop(items);
            self.not_full.notify_one();
            value
        }
    }

    /// A single waiting consumer is never stranded by a concurrent push
    #[test]
    fn loom_test_no_lost_wakeup() {
        loom::model(|| {
            let queue = Arc::new(LoomMonitor::new(1));

            let consumer = {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.pop_blocking())
            };

            assert!(queue.try_push(42).is_ok());
            assert_eq!(consumer.join().unwrap(), 42);
        });
    }

    /// A producer blocked on a full queue proceeds once a slot frees up
    #[test]
    fn loom_test_blocked_push_resumes() {
        loom::model(|| {
            let queue = Arc::new(LoomMonitor::new(1));
            queue.push_blocking(1);

            let producer = {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.push_blocking(2))
            };

            assert_eq!(queue.pop_blocking(), 1);
            producer.join().unwrap();
            assert_eq!(queue.try_pop(), Some(2));
        });
    }

    /// Two blocked consumers both receive one item each, in FIFO order overall
    #[test]
    fn loom_test_two_waiters_two_items() {
        loom::model(|| {
            let queue = Arc::new(LoomMonitor::new(2));

            let consumers: Vec<_> = (0..2)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || queue.pop_blocking())
                })
                .collect();

            queue.push_blocking(1);
            queue.push_blocking(2);

            let mut received: Vec<i32> =
                consumers.into_iter().map(|h| h.join().unwrap()).collect();
            received.sort_unstable();
            assert_eq!(received, vec![1, 2]);
        });
    }

    /// A try_pop racing a push never duplicates or loses the item
    #[test]
    fn loom_test_try_pop_races_push() {
        loom::model(|| {
            let queue = Arc::new(LoomMonitor::new(1));

            let poller = {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.try_pop())
            };

            queue.push_blocking(7);
            let polled = poller.join().unwrap();

            match polled {
                Some(value) => {
                    assert_eq!(value, 7);
                    assert_eq!(queue.try_pop(), None);
                }
                None => assert_eq!(queue.pop_blocking(), 7),
            }
        });
    }
}
