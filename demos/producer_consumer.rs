//! Producer/consumer pipeline example
//!
//! Runs a workload of several producers and consumers sharing one bounded queue and
//! prints what each worker did. Pass `--classic` to run the slow single pair instead.
//! Set `RUST_LOG=handoff=debug` to see per-item events.

use std::env;
use std::time::Duration;

use handoff::config::{ConsumerPlan, ProducerPlan, QueueConfig, Strategy, WorkloadConfig};
use handoff::worker::{Pipeline, RunReport};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    handoff::trace::init_tracing();

    let pipeline = if env::args().any(|arg| arg == "--classic") {
        Pipeline::classic()
    } else {
        let polling = Strategy::Polling {
            interval: Duration::from_millis(5),
        };
        let config = WorkloadConfig::new(QueueConfig::bounded(5)?)
            .producer(ProducerPlan::new(4).delay(Duration::from_millis(20)))
            .producer(ProducerPlan::new(7).delay(Duration::from_millis(10)))
            .producer(ProducerPlan::new(3).strategy(polling))
            .producer(ProducerPlan::new(3))
            .consumer(ConsumerPlan::new(10).delay(Duration::from_millis(5)))
            .consumer(ConsumerPlan::new(5).delay(Duration::from_millis(15)))
            .consumer(ConsumerPlan::new(1).strategy(polling))
            .consumer(ConsumerPlan::new(1));
        Pipeline::new(config)?
    };

    println!("handoff Producer/Consumer Example");
    println!("=================================");
    println!("Queue capacity: {:?}", pipeline.queue().capacity());

    let report = pipeline.run()?;
    print_report(&report);

    Ok(())
}

fn print_report(report: &RunReport) {
    println!("\nProducers:");
    for worker in &report.producers {
        println!(
            "   #{} pushed {}/{}: {:?}",
            worker.index,
            worker.handled(),
            worker.planned,
            worker.ids
        );
    }

    println!("\nConsumers:");
    for worker in &report.consumers {
        println!(
            "   #{} processed {}/{}: {:?}",
            worker.index,
            worker.handled(),
            worker.planned,
            worker.ids
        );
    }

    println!("\nSummary:");
    println!("   Produced:        {}", report.produced());
    println!("   Consumed:        {}", report.consumed());
    println!("   Leftover:        {:?}", report.leftover);
    println!("   Exactly once:    {}", report.is_exactly_once());
    println!("   Waits:           {}", report.stats.waits);
    println!("   Peak length:     {}", report.stats.peak_len);
    println!("   Elapsed:         {:.2?}", report.elapsed);
}
