//! End-to-end scenarios for the descriptor poller

use audio_offload::prelude::*;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(10);

fn scenario_poller(tick: Duration) -> FdPoller {
    let config = FdPollerConfig::default()
        .with_tick_interval(tick)
        .without_rt_priority()
        .with_thread_name("scenario-poller");
    FdPoller::with_config(config).expect("Failed to create poller")
}

fn make_pipe() -> (RawFd, RawFd) {
    let mut fds = [0 as RawFd; 2];
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(rc, 0, "Failed to create pipe");
    (fds[0], fds[1])
}

fn write_byte(fd: RawFd) {
    let byte = 1u8;
    let rc = unsafe { libc::write(fd, &byte as *const u8 as *const libc::c_void, 1) };
    assert_eq!(rc, 1, "Failed to write to pipe");
}

/// Read whatever is pending so a level-triggered descriptor goes quiet.
fn drain(fd: RawFd) {
    let mut buf = [0u8; 64];
    unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
}

fn close_fd(fd: RawFd) {
    unsafe { libc::close(fd) };
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
fn test_readable_descriptor_dispatches() {
    let poller = scenario_poller(TICK);
    let (read_fd, write_fd) = make_pipe();

    let hits = Arc::new(AtomicUsize::new(0));
    let saw_data = Arc::new(AtomicBool::new(false));
    let hits_clone = Arc::clone(&hits);
    let saw_data_clone = Arc::clone(&saw_data);
    poller
        .add(read_fd, move |fd, readiness| {
            if readiness.has_data() {
                saw_data_clone.store(true, Ordering::Release);
            }
            drain(fd);
            hits_clone.fetch_add(1, Ordering::AcqRel);
        })
        .expect("Failed to add descriptor");
    poller.start().expect("Failed to start poller");

    write_byte(write_fd);
    assert!(
        wait_until(|| hits.load(Ordering::Acquire) >= 1),
        "readable descriptor never reached the callback"
    );
    assert!(saw_data.load(Ordering::Acquire));

    poller.shutdown().expect("Failed to shutdown poller");
    close_fd(read_fd);
    close_fd(write_fd);
}

#[test]
fn test_remove_stops_dispatch_immediately() {
    let poller = scenario_poller(TICK);
    let (read_fd, write_fd) = make_pipe();

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&hits);
    poller
        .add(read_fd, move |fd, _| {
            drain(fd);
            hits_clone.fetch_add(1, Ordering::AcqRel);
        })
        .expect("Failed to add descriptor");
    poller.start().expect("Failed to start poller");

    write_byte(write_fd);
    assert!(wait_until(|| hits.load(Ordering::Acquire) >= 1));

    poller.remove(read_fd);
    assert!(!poller.contains(read_fd));
    let settled = hits.load(Ordering::Acquire);

    // New readiness on the removed descriptor must go unnoticed.
    write_byte(write_fd);
    thread::sleep(TICK * 5);
    assert_eq!(hits.load(Ordering::Acquire), settled);

    poller.shutdown().expect("Failed to shutdown poller");
    close_fd(read_fd);
    close_fd(write_fd);
}

#[test]
fn test_add_then_remove_never_dispatches() {
    let poller = scenario_poller(TICK);
    let (read_fd, write_fd) = make_pipe();

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&hits);
    poller.start().expect("Failed to start poller");
    poller
        .add(read_fd, move |_, _| {
            hits_clone.fetch_add(1, Ordering::AcqRel);
        })
        .expect("Failed to add descriptor");
    assert!(poller.contains(read_fd));
    poller.remove(read_fd);
    // Removing an unregistered descriptor is a no-op.
    poller.remove(read_fd);

    write_byte(write_fd);
    thread::sleep(TICK * 5);
    assert_eq!(hits.load(Ordering::Acquire), 0);

    poller.shutdown().expect("Failed to shutdown poller");
    close_fd(read_fd);
    close_fd(write_fd);
}

#[test]
fn test_callback_can_remove_its_own_descriptor() {
    let poller = Arc::new(scenario_poller(TICK));
    let (read_fd, write_fd) = make_pipe();

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&hits);
    let poller_clone = Arc::clone(&poller);
    poller
        .add(read_fd, move |fd, _| {
            drain(fd);
            hits_clone.fetch_add(1, Ordering::AcqRel);
            poller_clone.remove(fd);
        })
        .expect("Failed to add descriptor");
    poller.start().expect("Failed to start poller");

    write_byte(write_fd);
    assert!(
        wait_until(|| hits.load(Ordering::Acquire) == 1 && !poller.contains(read_fd)),
        "self-removing callback deadlocked or never ran"
    );

    write_byte(write_fd);
    thread::sleep(TICK * 3);
    assert_eq!(hits.load(Ordering::Acquire), 1);

    poller.shutdown().expect("Failed to shutdown poller");
    close_fd(read_fd);
    close_fd(write_fd);
}

#[test]
fn test_suspend_pauses_dispatch_until_resume() {
    let poller = scenario_poller(TICK);
    let (read_fd, write_fd) = make_pipe();

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&hits);
    poller
        .add(read_fd, move |fd, _| {
            drain(fd);
            hits_clone.fetch_add(1, Ordering::AcqRel);
        })
        .expect("Failed to add descriptor");
    poller.start().expect("Failed to start poller");

    poller.suspend();
    assert_eq!(poller.phase(), PollerPhase::Suspended);
    // Let the loop park before making the descriptor readable.
    thread::sleep(TICK * 3);

    write_byte(write_fd);
    thread::sleep(TICK * 5);
    assert_eq!(
        hits.load(Ordering::Acquire),
        0,
        "suspended poller must not dispatch"
    );

    poller.resume();
    assert!(
        wait_until(|| hits.load(Ordering::Acquire) >= 1),
        "resume never restored dispatch"
    );

    poller.shutdown().expect("Failed to shutdown poller");
    close_fd(read_fd);
    close_fd(write_fd);
}

#[test]
fn test_hangup_is_delivered_to_the_callback() {
    let poller = Arc::new(scenario_poller(TICK));
    let (read_fd, write_fd) = make_pipe();

    let saw_hangup = Arc::new(AtomicBool::new(false));
    let saw_hangup_clone = Arc::clone(&saw_hangup);
    let poller_clone = Arc::clone(&poller);
    poller
        .add(read_fd, move |fd, readiness| {
            if readiness.is_hangup() {
                saw_hangup_clone.store(true, Ordering::Release);
                poller_clone.remove(fd);
            } else {
                drain(fd);
            }
        })
        .expect("Failed to add descriptor");
    poller.start().expect("Failed to start poller");

    close_fd(write_fd);
    assert!(
        wait_until(|| saw_hangup.load(Ordering::Acquire)),
        "hangup never reached the callback"
    );
    assert!(wait_until(|| !poller.contains(read_fd)));

    poller.shutdown().expect("Failed to shutdown poller");
    close_fd(read_fd);
}

#[test]
fn test_invalid_descriptor_is_dropped() {
    let poller = scenario_poller(TICK);

    // A descriptor number far above anything this process has opened.
    let bogus_fd: RawFd = 900;
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&hits);
    poller
        .add(bogus_fd, move |_, _| {
            hits_clone.fetch_add(1, Ordering::AcqRel);
        })
        .expect("Failed to add descriptor");
    poller.start().expect("Failed to start poller");

    assert!(
        wait_until(|| !poller.contains(bogus_fd)),
        "invalid descriptor was never dropped"
    );
    assert_eq!(
        hits.load(Ordering::Acquire),
        0,
        "invalid descriptor must not reach the callback"
    );
    assert!(poller.stats().descriptors_dropped >= 1);

    poller.shutdown().expect("Failed to shutdown poller");
}

#[test]
fn test_error_streak_drops_the_registration() {
    let poller = scenario_poller(TICK);
    let (read_fd, write_fd) = make_pipe();
    // A pipe write end with no reader reports a persistent error condition.
    close_fd(read_fd);

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&hits);
    poller
        .add_with_interest(write_fd, Readiness::empty(), move |_, readiness| {
            assert!(readiness.is_error());
            hits_clone.fetch_add(1, Ordering::AcqRel);
        })
        .expect("Failed to add descriptor");
    poller.start().expect("Failed to start poller");

    assert!(
        wait_until(|| !poller.contains(write_fd)),
        "erroring descriptor was never dropped"
    );
    assert_eq!(
        hits.load(Ordering::Acquire),
        3,
        "the callback must see each errored sweep until the streak limit"
    );
    assert!(poller.stats().descriptors_dropped >= 1);

    poller.shutdown().expect("Failed to shutdown poller");
    close_fd(write_fd);
}

#[test]
fn test_busy_descriptor_engages_the_throttle() {
    let poller = scenario_poller(Duration::from_millis(5));
    let (busy_read_fd, busy_write_fd) = make_pipe();
    let (idle_read_fd, idle_write_fd) = make_pipe();

    // Never drained, so the descriptor stays readable on every sweep.
    let busy_hits = Arc::new(AtomicUsize::new(0));
    let busy_hits_clone = Arc::clone(&busy_hits);
    poller
        .add(busy_read_fd, move |_, _| {
            busy_hits_clone.fetch_add(1, Ordering::AcqRel);
        })
        .expect("Failed to add busy descriptor");

    let idle_hits = Arc::new(AtomicUsize::new(0));
    let idle_hits_clone = Arc::clone(&idle_hits);
    poller
        .add(idle_read_fd, move |fd, _| {
            drain(fd);
            idle_hits_clone.fetch_add(1, Ordering::AcqRel);
        })
        .expect("Failed to add idle descriptor");

    poller.start().expect("Failed to start poller");
    write_byte(busy_write_fd);

    assert!(
        wait_until(|| poller.stats().throttle_engagements >= 1),
        "hot descriptor never engaged the throttle"
    );

    // A throttled poller still serves other descriptors each tick.
    write_byte(idle_write_fd);
    assert!(
        wait_until(|| idle_hits.load(Ordering::Acquire) >= 1),
        "throttled poller stopped serving healthy descriptors"
    );

    poller.shutdown().expect("Failed to shutdown poller");
    close_fd(busy_read_fd);
    close_fd(busy_write_fd);
    close_fd(idle_read_fd);
    close_fd(idle_write_fd);
}

#[test]
fn test_descriptors_are_watched_independently() {
    let poller = scenario_poller(TICK);
    let (first_read_fd, first_write_fd) = make_pipe();
    let (second_read_fd, second_write_fd) = make_pipe();

    let first_hits = Arc::new(AtomicUsize::new(0));
    let first_hits_clone = Arc::clone(&first_hits);
    poller
        .add(first_read_fd, move |fd, _| {
            drain(fd);
            first_hits_clone.fetch_add(1, Ordering::AcqRel);
        })
        .expect("Failed to add first descriptor");

    let second_hits = Arc::new(AtomicUsize::new(0));
    let second_hits_clone = Arc::clone(&second_hits);
    poller
        .add(second_read_fd, move |fd, _| {
            drain(fd);
            second_hits_clone.fetch_add(1, Ordering::AcqRel);
        })
        .expect("Failed to add second descriptor");

    poller.start().expect("Failed to start poller");
    assert_eq!(poller.len(), 2);

    poller.remove(first_read_fd);
    write_byte(first_write_fd);
    write_byte(second_write_fd);

    assert!(
        wait_until(|| second_hits.load(Ordering::Acquire) >= 1),
        "surviving descriptor stopped dispatching"
    );
    assert_eq!(first_hits.load(Ordering::Acquire), 0);

    poller.shutdown().expect("Failed to shutdown poller");
    close_fd(first_read_fd);
    close_fd(first_write_fd);
    close_fd(second_read_fd);
    close_fd(second_write_fd);
}

#[test]
fn test_registrations_added_before_start_are_polled() {
    let poller = scenario_poller(TICK);
    let (read_fd, write_fd) = make_pipe();

    let hits = Arc::new(AtomicUsize::new(0));
    let hits_clone = Arc::clone(&hits);
    poller
        .add(read_fd, move |fd, _| {
            drain(fd);
            hits_clone.fetch_add(1, Ordering::AcqRel);
        })
        .expect("Failed to add descriptor");
    write_byte(write_fd);

    poller.start().expect("Failed to start poller");
    assert!(
        wait_until(|| hits.load(Ordering::Acquire) >= 1),
        "registration added before start was ignored"
    );

    poller.shutdown().expect("Failed to shutdown poller");
    close_fd(read_fd);
    close_fd(write_fd);
}

#[test]
fn test_poller_drives_through_thread_node_interface() {
    let node: Arc<dyn ThreadNode> = Arc::new(
        FdPoller::with_config(
            FdPollerConfig::default()
                .without_rt_priority()
                .with_thread_name("node-poller"),
        )
        .expect("Failed to create poller"),
    );

    assert_eq!(node.name(), "node-poller");
    node.start().expect("Failed to start node");
    node.stop();
    node.join().expect("Failed to join node");
}
