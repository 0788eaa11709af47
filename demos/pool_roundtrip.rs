//! Basic worker pool usage example
//!
//! Demonstrates the pull/activate protocol, payload handoff, and the
//! dispatch convenience wrapper.
//!
//! Run with: cargo run --example pool_roundtrip

use audio_offload::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A block of audio to synthesize off the realtime path.
struct RenderJob {
    label: &'static str,
    frames: usize,
    frequency: f64,
}

fn main() -> Result<()> {
    println!("=== Audio Offload - Worker Pool Example ===\n");

    // Up to 4 workers, with 2 kept warm between bursts
    let pool = WorkerPool::with_bounds(4, 2)?;

    println!(
        "1. Starting pool (ceiling {}, warm floor {})",
        pool.max_threads(),
        pool.max_unused_threads()
    );
    pool.start()?;
    println!("   {} workers prewarmed", pool.idle_workers());

    println!("\n2. Manual pull protocol:");

    // Pull a worker, hand it a payload and an entry point, then fire it
    let worker = pool.pull()?;
    println!("   Pulled worker {} ({})", worker.id(), worker.state().as_str());

    worker.set_safe_data(safe_data(RenderJob {
        label: "sine",
        frames: 1024,
        frequency: 440.0,
    }));
    worker.connect_safe_run(|data| {
        let job: RenderJob = downcast_safe_data(data.unwrap()).unwrap();
        let mut peak = 0.0f64;
        for i in 0..job.frames {
            let sample = (i as f64 * job.frequency / 44_100.0).sin();
            peak = peak.max(sample.abs());
        }
        println!(
            "  Rendered {} frames of '{}' on {:?}, peak {:.3}",
            job.frames,
            job.label,
            thread::current().id(),
            peak
        );
    });
    worker.activate()?;

    println!("\n3. Dispatch convenience wrapper:");

    let completed = Arc::new(AtomicUsize::new(0));
    for i in 0..10 {
        let completed = Arc::clone(&completed);
        pool.dispatch(
            Some(safe_data(RenderJob {
                label: "batch",
                frames: 256 * (i + 1),
                frequency: 220.0,
            })),
            move |data| {
                let job: RenderJob = downcast_safe_data(data.unwrap()).unwrap();
                println!("  Job {} rendering {} frames", i, job.frames);
                thread::sleep(Duration::from_millis(20));
                completed.fetch_add(1, Ordering::SeqCst);
            },
        )?;
    }
    println!("   Submitted 10 render jobs");

    // Give the batch a moment to drain
    thread::sleep(Duration::from_millis(300));
    println!("   {} jobs completed", completed.load(Ordering::SeqCst));

    println!("\n4. Releasing a lease without firing it:");

    let lease = pool.pull()?;
    println!("   Pulled worker {}", lease.id());
    drop(lease);
    println!("   Dropped the lease, worker returns to the warm set");

    println!("\n5. Pool statistics:");
    let stats = pool.stats();
    println!("   Workers created:  {}", stats.workers_created);
    println!("   Workers retired:  {}", stats.workers_retired);
    println!("   Activations:      {}", stats.activations);
    println!("   Warm pulls:       {}", stats.pulls_warm);
    println!("   Waited pulls:     {}", stats.pulls_waited);
    println!(
        "   Live/idle now:    {}/{}",
        stats.live_workers, stats.idle_workers
    );

    println!("\n6. Shutting down...");
    pool.shutdown()?;

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
