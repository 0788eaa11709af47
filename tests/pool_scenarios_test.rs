//! End-to-end scenarios for the worker pool

use audio_offload::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

fn scenario_pool(max_threads: usize, max_unused_threads: usize) -> WorkerPool {
    let config = WorkerPoolConfig::new(max_threads)
        .with_max_unused_threads(max_unused_threads)
        .with_thread_name_prefix("scenario")
        .with_poll_interval(Duration::from_millis(10));
    WorkerPool::with_config(config).expect("Failed to create pool")
}

/// Poll a condition until it holds or the deadline passes.
fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn test_pulls_up_to_ceiling_yield_distinct_workers() {
    let pool = scenario_pool(4, 2);
    pool.start().expect("Failed to start pool");

    let mut leases = Vec::new();
    for _ in 0..4 {
        leases.push(pool.pull().expect("Failed to pull worker"));
    }

    let ids: HashSet<usize> = leases.iter().map(|lease| lease.id()).collect();
    assert_eq!(ids.len(), 4, "every concurrent pull must get its own worker");
    assert_eq!(pool.live_workers(), 4);

    drop(leases);
    pool.shutdown().expect("Failed to shutdown pool");
}

#[test]
fn test_blocked_pull_is_served_by_a_released_worker() {
    let pool = Arc::new(scenario_pool(2, 1));
    pool.start().expect("Failed to start pool");

    let mut leases = Vec::new();
    for _ in 0..2 {
        leases.push(pool.pull().expect("Failed to pull worker"));
    }

    // The ceiling is reached, so a fifth pull has to wait for a release.
    let waiter_pool = Arc::clone(&pool);
    let (tx, rx) = mpsc::channel();
    let waiter = thread::spawn(move || {
        let lease = waiter_pool.pull().expect("Blocked pull failed");
        tx.send(lease.id()).expect("Failed to report pulled id");
    });

    assert!(
        rx.recv_timeout(Duration::from_millis(100)).is_err(),
        "pull must block while every worker is leased"
    );

    let released = leases.pop().expect("lease vector is empty");
    let released_id = released.id();
    drop(released);

    let served_id = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("Blocked pull never completed");
    assert_eq!(served_id, released_id);
    waiter.join().expect("Waiter thread panicked");

    drop(leases);
    pool.shutdown().expect("Failed to shutdown pool");
}

#[test]
fn test_release_cycles_settle_on_the_warm_floor() {
    let pool = scenario_pool(4, 2);
    pool.start().expect("Failed to start pool");
    assert_eq!(pool.idle_workers(), 2);

    for _ in 0..6 {
        let lease = pool.pull().expect("Failed to pull worker");
        assert!(pool.live_workers() <= 4);
        drop(lease);
    }

    assert!(
        wait_until(|| pool.idle_workers() == 2 && pool.live_workers() <= 4),
        "warm set should settle back on the floor"
    );

    pool.shutdown().expect("Failed to shutdown pool");
}

#[test]
fn test_dispatch_payload_roundtrip() {
    struct RenderRequest {
        frames: usize,
        channels: usize,
    }

    let pool = scenario_pool(2, 1);
    pool.start().expect("Failed to start pool");

    let (tx, rx) = mpsc::channel();
    let request = RenderRequest {
        frames: 1024,
        channels: 2,
    };
    pool.dispatch(Some(safe_data(request)), move |data| {
        let request: RenderRequest =
            downcast_safe_data(data.expect("Payload missing")).expect("Payload type mismatch");
        tx.send(request.frames * request.channels)
            .expect("Failed to send result");
    })
    .expect("Failed to dispatch");

    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5))
            .expect("Callback never ran"),
        2048
    );

    pool.shutdown().expect("Failed to shutdown pool");
}

#[test]
fn test_concurrent_dispatch_saturates_without_exceeding_ceiling() {
    let pool = Arc::new(scenario_pool(4, 2));
    pool.start().expect("Failed to start pool");

    let completed = Arc::new(AtomicUsize::new(0));
    let peak_live = Arc::new(AtomicUsize::new(0));
    let sampling = Arc::new(AtomicBool::new(true));

    let sampler_pool = Arc::clone(&pool);
    let sampler_peak = Arc::clone(&peak_live);
    let sampler_running = Arc::clone(&sampling);
    let sampler = thread::spawn(move || {
        while sampler_running.load(Ordering::Acquire) {
            sampler_peak.fetch_max(sampler_pool.live_workers(), Ordering::AcqRel);
            thread::sleep(Duration::from_millis(1));
        }
    });

    let mut producers = Vec::new();
    for _ in 0..8 {
        let pool = Arc::clone(&pool);
        let completed = Arc::clone(&completed);
        producers.push(thread::spawn(move || {
            for _ in 0..5 {
                let completed = Arc::clone(&completed);
                pool.dispatch(None, move |_| {
                    thread::sleep(Duration::from_millis(2));
                    completed.fetch_add(1, Ordering::AcqRel);
                })
                .expect("Failed to dispatch");
            }
        }));
    }
    for producer in producers {
        producer.join().expect("Producer thread panicked");
    }

    assert!(
        wait_until(|| completed.load(Ordering::Acquire) == 40),
        "all dispatched callbacks must complete"
    );
    sampling.store(false, Ordering::Release);
    sampler.join().expect("Sampler thread panicked");

    assert!(
        peak_live.load(Ordering::Acquire) <= 4,
        "live workers must never exceed the ceiling"
    );

    pool.shutdown().expect("Failed to shutdown pool");
    let stats = pool.stats();
    assert_eq!(stats.activations, 40);
    assert_eq!(stats.live_workers, 0);
}

#[test]
fn test_shutdown_waits_for_busy_workers() {
    let pool = scenario_pool(2, 1);
    pool.start().expect("Failed to start pool");

    let finished = Arc::new(AtomicBool::new(false));
    let finished_clone = Arc::clone(&finished);
    let (started_tx, started_rx) = mpsc::channel();
    pool.dispatch(None, move |_| {
        started_tx.send(()).expect("Failed to signal start");
        thread::sleep(Duration::from_millis(150));
        finished_clone.store(true, Ordering::Release);
    })
    .expect("Failed to dispatch");

    started_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("Callback never started");
    pool.shutdown().expect("Failed to shutdown pool");

    assert!(
        finished.load(Ordering::Acquire),
        "shutdown must wait for the running callback to complete"
    );
}

#[test]
fn test_pool_drives_through_thread_node_interface() {
    let node: Arc<dyn ThreadNode> =
        Arc::new(WorkerPool::with_bounds(2, 1).expect("Failed to create pool"));

    assert_eq!(node.name(), "offload");
    node.start().expect("Failed to start node");
    node.stop();
    node.join().expect("Failed to join node");
}
