//! Basic usage example for handoff
//!
//! Walks through the non-blocking and blocking operations of a bounded queue, then
//! hands items between a few producer and consumer threads and shuts the queue down.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use handoff::metrics::MetricsCollector;
use handoff::{BoundedBlockingQueue, Error};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("handoff Basic Usage Example");
    println!("===========================");

    let queue: Arc<BoundedBlockingQueue<i32>> = Arc::new(BoundedBlockingQueue::try_new(4)?);

    // Non-blocking operations
    println!("\n1. Non-blocking Operations:");
    println!("   try_pop on empty queue: {:?}", queue.try_pop());
    for value in 1..=4 {
        queue.try_push(value)?;
    }
    match queue.try_push(5) {
        Ok(()) => println!("   Unexpectedly accepted 5"),
        Err(rejected) => println!(
            "   Queue full ({:?}), got {} back",
            queue.state(),
            rejected.into_inner()
        ),
    }
    println!("   Drained: {:?}", queue.drain());

    // Deadline-bounded operations
    println!("\n2. Timeouts:");
    match queue.pop_timeout(Duration::from_millis(50)) {
        Err(Error::Timeout) => println!("   pop_timeout expired on an empty queue"),
        other => println!("   Unexpected result: {:?}", other),
    }

    // Blocking hand-off between threads
    println!("\n3. Multi-Producer / Multi-Consumer:");
    let producer_handles: Vec<_> = (0..3)
        .map(|i| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for j in 0..10 {
                    if queue.push_blocking(i * 10 + j).is_err() {
                        println!("   Producer {}: queue closed", i);
                        return j;
                    }
                }
                10
            })
        })
        .collect();

    let consumer_handles: Vec<_> = (0..2)
        .map(|i| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut consumed = 0;
                let mut sum = 0;
                while let Some(value) = queue.pop_until_closed() {
                    consumed += 1;
                    sum += value;
                }
                println!("   Consumer {} took {} items (sum {})", i, consumed, sum);
                consumed
            })
        })
        .collect();

    let mut total_produced = 0;
    for handle in producer_handles {
        total_produced += handle.join().unwrap_or(0);
    }
    queue.close();

    let mut total_consumed = 0;
    for handle in consumer_handles {
        total_consumed += handle.join().unwrap_or(0);
    }
    println!("   Produced {}, consumed {}", total_produced, total_consumed);

    // Metrics
    println!("\n4. Metrics:");
    let stats = queue.metrics();
    println!("   Pushes:          {}", stats.pushes);
    println!("   Pops:            {}", stats.pops);
    println!("   Rejected pushes: {}", stats.rejected_pushes);
    println!("   Waits:           {}", stats.waits);
    println!("   Peak length:     {}", stats.peak_len);
    println!("   Success rate:    {:.1}%", stats.success_rate());

    Ok(())
}
