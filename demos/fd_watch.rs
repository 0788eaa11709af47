//! Descriptor polling example
//!
//! Watches a pipe with the fixed-tick poller and shows suspend/resume,
//! removal, and the poller's drop handling for dead descriptors.
//!
//! Set RUST_LOG=audio_offload=debug to see the poller's own logging.
//!
//! Run with: cargo run --example fd_watch

use audio_offload::prelude::*;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn make_pipe() -> (RawFd, RawFd) {
    let mut fds = [0 as RawFd; 2];
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(rc, 0, "pipe(2) failed");
    (fds[0], fds[1])
}

fn write_byte(fd: RawFd, byte: u8) {
    unsafe { libc::write(fd, &byte as *const u8 as *const libc::c_void, 1) };
}

fn read_byte(fd: RawFd) -> u8 {
    let mut byte = 0u8;
    unsafe { libc::read(fd, &mut byte as *mut u8 as *mut libc::c_void, 1) };
    byte
}

fn main() -> Result<()> {
    env_logger::init();

    println!("=== Audio Offload - Descriptor Watch Example ===\n");

    // A 10 ms tick without realtime elevation, so the demo runs unprivileged
    let poller = Arc::new(FdPoller::with_config(
        FdPollerConfig::default()
            .with_tick_interval(Duration::from_millis(10))
            .without_rt_priority(),
    )?);

    println!(
        "1. Starting poller '{}' with a {:?} tick",
        poller.name(),
        poller.tick_interval()
    );
    poller.start()?;

    println!("\n2. Watching a pipe:");
    let (read_fd, write_fd) = make_pipe();
    let events = Arc::new(AtomicUsize::new(0));
    let events_clone = Arc::clone(&events);
    poller.add(read_fd, move |fd, readiness| {
        if readiness.has_data() {
            let byte = read_byte(fd);
            println!("  Descriptor {} readable, got byte {}", fd, byte);
        }
        events_clone.fetch_add(1, Ordering::SeqCst);
    })?;

    for byte in 1..=3u8 {
        write_byte(write_fd, byte);
        thread::sleep(Duration::from_millis(30));
    }
    println!("   {} dispatches so far", events.load(Ordering::SeqCst));

    println!("\n3. Suspending the poller:");
    poller.suspend();
    thread::sleep(Duration::from_millis(30));
    write_byte(write_fd, 4);
    thread::sleep(Duration::from_millis(50));
    println!(
        "   Wrote while suspended, still {} dispatches",
        events.load(Ordering::SeqCst)
    );

    println!("\n4. Resuming:");
    poller.resume();
    thread::sleep(Duration::from_millis(50));
    println!("   Now {} dispatches", events.load(Ordering::SeqCst));

    println!("\n5. Removing the descriptor:");
    poller.remove(read_fd);
    write_byte(write_fd, 5);
    thread::sleep(Duration::from_millis(50));
    println!(
        "   Wrote after removal, still {} dispatches",
        events.load(Ordering::SeqCst)
    );

    println!("\n6. A dead descriptor is dropped automatically:");
    let (dead_read_fd, dead_write_fd) = make_pipe();
    poller.add(dead_read_fd, |fd, readiness| {
        println!("  Descriptor {} reported {:?}", fd, readiness);
    })?;
    unsafe { libc::close(dead_read_fd) };
    thread::sleep(Duration::from_millis(50));
    println!(
        "   Still watched: {}, descriptors dropped: {}",
        poller.contains(dead_read_fd),
        poller.stats().descriptors_dropped
    );
    unsafe { libc::close(dead_write_fd) };

    println!("\n7. Poller statistics:");
    let stats = poller.stats();
    println!("   Iterations:  {}", stats.iterations);
    println!("   Dispatches:  {}", stats.dispatches);
    println!("   Dropped:     {}", stats.descriptors_dropped);
    println!("   Registered:  {}", stats.registered);

    println!("\n8. Shutting down...");
    poller.shutdown()?;
    unsafe {
        libc::close(read_fd);
        libc::close(write_fd);
    }

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
