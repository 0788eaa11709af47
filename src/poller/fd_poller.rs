//! Fixed-tick descriptor poller
//!
//! An [`FdPoller`] owns one thread that multiplexes a dynamic set of file
//! descriptors through `poll(2)` at a fixed tick. Registrations can be added
//! and removed from any thread at any time, including from inside a dispatch
//! callback. The poller thread optionally elevates itself to `SCHED_FIFO` so
//! device descriptors are serviced ahead of ordinary threads.

use crate::core::error::{OffloadError, Result};
use crate::core::node::ThreadNode;
use crate::poller::readiness::Readiness;
use crate::poller::registry::{DispatchFn, FdRegistry, MAX_ERROR_STREAK};
use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::os::unix::io::RawFd;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

/// Default polling tick: 10 ms, i.e. 100 sweeps per second.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Default `SCHED_FIFO` priority requested for the poller thread.
pub const DEFAULT_RT_PRIORITY: i32 = 45;

/// Default number of consecutive hot iterations before the loop throttles.
pub const DEFAULT_THROTTLE_AFTER: u32 = 8;

/// How long `Drop` waits for the poller thread before giving up on it.
const DROP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle phases of an [`FdPoller`].
///
/// The poller alternates `Running -> Suspended -> Running` while alive, and
/// `Stopped` is terminal: a stopped poller cannot be started again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerPhase {
    /// Not polling: never started, or stopped for good.
    Stopped,
    /// Sweeping the descriptor set every tick.
    Running,
    /// Parked: registrations persist but nothing is polled or dispatched.
    Suspended,
}

/// Configuration for an [`FdPoller`].
#[derive(Debug, Clone)]
pub struct FdPollerConfig {
    /// Interval between polling sweeps. Granularity is milliseconds;
    /// sub-millisecond ticks are rounded up to 1 ms.
    pub tick_interval: Duration,
    /// `SCHED_FIFO` priority requested for the poller thread, or `None` to
    /// stay at normal scheduling. Failure to elevate is logged and the
    /// poller continues at normal priority.
    pub rt_priority: Option<i32>,
    /// Name of the poller thread.
    pub thread_name: String,
    /// Consecutive hot iterations before the loop throttles itself to one
    /// sweep per tick.
    pub throttle_after: u32,
}

impl Default for FdPollerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            rt_priority: Some(DEFAULT_RT_PRIORITY),
            thread_name: "fd-poller".to_string(),
            throttle_after: DEFAULT_THROTTLE_AFTER,
        }
    }
}

impl FdPollerConfig {
    /// Set the interval between polling sweeps.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Request the given `SCHED_FIFO` priority for the poller thread.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_rt_priority(mut self, priority: i32) -> Self {
        self.rt_priority = Some(priority);
        self
    }

    /// Keep the poller thread at normal scheduling priority.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn without_rt_priority(mut self) -> Self {
        self.rt_priority = None;
        self
    }

    /// Set the poller thread name.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set how many consecutive hot iterations engage the throttle.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_throttle_after(mut self, throttle_after: u32) -> Self {
        self.throttle_after = throttle_after;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(OffloadError::invalid_config(
                "tick_interval",
                "must be non-zero",
            ));
        }
        if let Some(priority) = self.rt_priority {
            if !(1..=99).contains(&priority) {
                return Err(OffloadError::invalid_config(
                    "rt_priority",
                    format!("{priority} is outside the SCHED_FIFO range 1..=99"),
                ));
            }
        }
        if self.thread_name.is_empty() {
            return Err(OffloadError::invalid_config(
                "thread_name",
                "must not be empty",
            ));
        }
        if self.throttle_after == 0 {
            return Err(OffloadError::invalid_config(
                "throttle_after",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Counters for poller activity
#[derive(Debug, Default)]
pub struct PollerStats {
    iterations: AtomicU64,
    dispatches: AtomicU64,
    transient_errors: AtomicU64,
    descriptors_dropped: AtomicU64,
    throttle_engagements: AtomicU64,
    callback_panics: AtomicU64,
}

impl PollerStats {
    /// Increment the loop-iteration counter
    pub fn increment_iterations(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the dispatch counter
    pub fn increment_dispatches(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the transient-error counter
    pub fn increment_transient_errors(&self) {
        self.transient_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the dropped-descriptor counter
    pub fn increment_descriptors_dropped(&self) {
        self.descriptors_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the throttle-engagement counter
    pub fn increment_throttle_engagements(&self) {
        self.throttle_engagements.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the callback-panic counter
    pub fn increment_callback_panics(&self) {
        self.callback_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total polling sweeps
    pub fn get_iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Get total callback dispatches
    pub fn get_dispatches(&self) -> u64 {
        self.dispatches.load(Ordering::Relaxed)
    }

    /// Get total transient poll errors that were retried
    pub fn get_transient_errors(&self) -> u64 {
        self.transient_errors.load(Ordering::Relaxed)
    }

    /// Get total registrations dropped by the poller
    pub fn get_descriptors_dropped(&self) -> u64 {
        self.descriptors_dropped.load(Ordering::Relaxed)
    }

    /// Get how many times the throttle engaged
    pub fn get_throttle_engagements(&self) -> u64 {
        self.throttle_engagements.load(Ordering::Relaxed)
    }

    /// Get total dispatch callbacks that panicked
    pub fn get_callback_panics(&self) -> u64 {
        self.callback_panics.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of poller activity, obtained from [`FdPoller::stats`].
#[derive(Debug, Clone)]
pub struct PollerStatsSnapshot {
    /// Total polling sweeps.
    pub iterations: u64,
    /// Total callback dispatches.
    pub dispatches: u64,
    /// Transient poll errors that were retried.
    pub transient_errors: u64,
    /// Registrations dropped by the poller itself.
    pub descriptors_dropped: u64,
    /// How many times the throttle engaged.
    pub throttle_engagements: u64,
    /// Dispatch callbacks that panicked.
    pub callback_panics: u64,
    /// Descriptors currently registered.
    pub registered: usize,
}

struct PhaseState {
    phase: PollerPhase,
    stop_requested: bool,
}

/// State shared between the poller handle and its thread.
struct PollerShared {
    config: FdPollerConfig,
    phase: Mutex<PhaseState>,
    phase_cv: Condvar,
    registry: Mutex<FdRegistry>,
    registry_cv: Condvar,
    stats: PollerStats,
}

impl PollerShared {
    fn name(&self) -> &str {
        &self.config.thread_name
    }

    /// One dispatch: mark the descriptor in flight, invoke the callback
    /// without holding the registration guard, then clear the marker.
    ///
    /// The presence check under the guard is what makes `remove()` strict:
    /// once a registration is gone, readiness left over in a snapshot is
    /// ignored.
    fn dispatch(&self, fd: RawFd, observed: Readiness) {
        let (callback, drop_after) = {
            let mut registry = self.registry.lock();
            let Some(entry) = registry.entry_mut(fd) else {
                return; // removed since the snapshot was taken
            };
            if observed.is_error() && !observed.has_data() {
                entry.error_streak += 1;
            } else {
                entry.error_streak = 0;
            }
            let drop_after = entry.error_streak >= MAX_ERROR_STREAK;
            let callback = Arc::clone(&entry.callback);
            registry.in_flight = Some((fd, thread::current().id()));
            (callback, drop_after)
        };

        let panicked = catch_unwind(AssertUnwindSafe(|| callback(fd, observed))).is_err();
        self.stats.increment_dispatches();

        {
            let mut registry = self.registry.lock();
            registry.in_flight = None;
            if panicked {
                self.stats.increment_callback_panics();
                if registry.remove(fd) {
                    self.stats.increment_descriptors_dropped();
                    error!(
                        "poller '{}': descriptor {} callback panicked; dropping registration",
                        self.name(),
                        fd
                    );
                }
            } else if drop_after && registry.remove(fd) {
                self.stats.increment_descriptors_dropped();
                error!(
                    "poller '{}': {}",
                    self.name(),
                    OffloadError::poll_persistent(
                        fd,
                        format!("{MAX_ERROR_STREAK} consecutive error wakes")
                    )
                );
            }
        }
        self.registry_cv.notify_all();
    }

    /// Unregister a descriptor the kernel reported as unusable.
    fn drop_registration(&self, fd: RawFd, detail: &str) {
        let removed = { self.registry.lock().remove(fd) };
        if removed {
            self.stats.increment_descriptors_dropped();
            error!(
                "poller '{}': {}",
                self.name(),
                OffloadError::poll_persistent(fd, detail)
            );
        }
    }

    /// The poller thread body: gate on the phase, sweep, dispatch, repeat.
    fn poll_loop(shared: Arc<PollerShared>) {
        if let Some(priority) = shared.config.rt_priority {
            match elevate_to_realtime(priority) {
                Ok(()) => info!(
                    "poller '{}': elevated to SCHED_FIFO priority {}",
                    shared.name(),
                    priority
                ),
                Err(e) => warn!(
                    "poller '{}': could not elevate to SCHED_FIFO priority {}: {}; \
                     continuing at normal priority",
                    shared.name(),
                    priority,
                    e
                ),
            }
        }

        let tick = shared.config.tick_interval;
        let mut hot_streak: u32 = 0;
        let mut throttled = false;

        loop {
            {
                let mut phase = shared.phase.lock();
                while phase.phase == PollerPhase::Suspended && !phase.stop_requested {
                    shared.phase_cv.wait(&mut phase);
                }
                if phase.stop_requested {
                    break;
                }
            }

            let started_at = Instant::now();
            let mut fds = { shared.registry.lock().snapshot() };
            shared.stats.increment_iterations();

            if fds.is_empty() {
                hot_streak = 0;
                throttled = false;
                thread::sleep(tick);
                continue;
            }

            let timeout_ms = tick.as_millis().min(i32::MAX as u128) as libc::c_int;
            let ready = unsafe {
                libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms.max(1))
            };

            if ready < 0 {
                let errno = std::io::Error::last_os_error();
                if errno.raw_os_error() == Some(libc::EINTR) {
                    shared.stats.increment_transient_errors();
                    debug!(
                        "poller '{}': {}",
                        shared.name(),
                        OffloadError::poll_transient(libc::EINTR)
                    );
                    continue;
                }
                // EFAULT/EINVAL/ENOMEM: back off one tick and keep going;
                // the loop itself never dies.
                error!("poller '{}': poll(2) failed: {}", shared.name(), errno);
                thread::sleep(tick);
                continue;
            }

            if ready == 0 {
                // Quiet tick: the descriptor set is behaving again.
                if throttled {
                    debug!("poller '{}': throttle released", shared.name());
                    throttled = false;
                }
                hot_streak = 0;
                continue;
            }

            for pfd in &fds {
                if pfd.revents == 0 {
                    continue;
                }
                let observed = Readiness::from_revents(pfd.revents);
                if observed.is_invalid() {
                    shared.drop_registration(pfd.fd, "closed or invalid descriptor (POLLNVAL)");
                    continue;
                }
                shared.dispatch(pfd.fd, observed);
            }

            // Busy descriptors make poll(2) return immediately on every
            // call. After enough consecutive hot iterations, pad each sweep
            // to a full tick so co-resident threads keep getting CPU.
            if started_at.elapsed() < tick {
                hot_streak = hot_streak.saturating_add(1);
                if hot_streak >= shared.config.throttle_after {
                    if !throttled {
                        throttled = true;
                        shared.stats.increment_throttle_engagements();
                        warn!(
                            "poller '{}': {} consecutive hot iterations; \
                             throttling to one sweep per tick",
                            shared.name(),
                            hot_streak
                        );
                    }
                    let spent = started_at.elapsed();
                    if spent < tick {
                        thread::sleep(tick - spent);
                    }
                }
            } else {
                hot_streak = 0;
            }
        }

        debug!("poller '{}' loop exiting", shared.name());
    }
}

/// Request `SCHED_FIFO` scheduling for the calling thread.
fn elevate_to_realtime(priority: i32) -> std::io::Result<()> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // pthread_setschedparam returns the error number directly instead of
    // setting errno.
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &param) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::from_raw_os_error(rc))
    }
}

/// A fixed-tick poller multiplexing file descriptors onto one thread.
///
/// Descriptors are registered with a dispatch callback; when `poll(2)`
/// reports readiness, the callback runs on the poller thread with the
/// descriptor and the observed [`Readiness`]. Registrations may be added and
/// removed at any time, from any thread, including from inside a callback.
///
/// [`remove()`] is strict: when it returns, the callback for that descriptor
/// is not running and will never run again. The one exemption is a callback
/// removing its own descriptor, which returns immediately instead of
/// deadlocking on itself.
///
/// [`remove()`]: FdPoller::remove
///
/// # Example
///
/// ```no_run
/// use audio_offload::poller::FdPoller;
///
/// # fn main() -> audio_offload::Result<()> {
/// let poller = FdPoller::new()?;
/// poller.start()?;
///
/// // Watch stdin for readable data.
/// poller.add(0, |fd, readiness| {
///     println!("fd {fd} is ready: {readiness:?}");
/// })?;
///
/// // ... the callback now runs on the poller thread every time
/// // stdin has data, until the descriptor is removed ...
///
/// poller.remove(0);
/// poller.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub struct FdPoller {
    shared: Arc<PollerShared>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
    parent: Mutex<Option<Weak<dyn ThreadNode>>>,
}

impl FdPoller {
    /// Create a poller with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(FdPollerConfig::default())
    }

    /// Create a poller from a full configuration.
    pub fn with_config(config: FdPollerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(PollerShared {
                config,
                phase: Mutex::new(PhaseState {
                    phase: PollerPhase::Stopped,
                    stop_requested: false,
                }),
                phase_cv: Condvar::new(),
                registry: Mutex::new(FdRegistry::new()),
                registry_cv: Condvar::new(),
                stats: PollerStats::default(),
            }),
            thread: Mutex::new(None),
            parent: Mutex::new(None),
        })
    }

    /// Start the poller thread.
    ///
    /// Registrations added beforehand are picked up by the first sweep.
    /// Fails with [`OffloadError::AlreadyRunning`] on a live poller and
    /// [`OffloadError::PoolShutdown`] on one that has been stopped.
    pub fn start(&self) -> Result<()> {
        {
            let mut phase = self.shared.phase.lock();
            if phase.stop_requested {
                return Err(OffloadError::pool_shutdown(self.name()));
            }
            if phase.phase != PollerPhase::Stopped {
                return Err(OffloadError::already_running(self.name()));
            }
            phase.phase = PollerPhase::Running;
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(self.shared.config.thread_name.clone())
            .spawn(move || PollerShared::poll_loop(shared))
            .map_err(|e| {
                let mut phase = self.shared.phase.lock();
                phase.phase = PollerPhase::Stopped;
                phase.stop_requested = true;
                OffloadError::spawn_with_source(
                    self.shared.config.thread_name.clone(),
                    e.to_string(),
                    e,
                )
            })?;
        *self.thread.lock() = Some(handle);

        info!(
            "poller '{}' started ({:?} tick)",
            self.name(),
            self.shared.config.tick_interval
        );
        Ok(())
    }

    /// Register a descriptor with the default input interest.
    pub fn add<F>(&self, fd: RawFd, callback: F) -> Result<()>
    where
        F: Fn(RawFd, Readiness) + Send + Sync + 'static,
    {
        self.add_with_interest(fd, Readiness::input(), callback)
    }

    /// Register a descriptor with an explicit interest mask.
    ///
    /// The registration becomes visible to the next sweep at the latest.
    /// Registering a descriptor that is already present is a no-op that
    /// keeps the existing callback and interest.
    pub fn add_with_interest<F>(&self, fd: RawFd, interest: Readiness, callback: F) -> Result<()>
    where
        F: Fn(RawFd, Readiness) + Send + Sync + 'static,
    {
        if fd < 0 {
            return Err(OffloadError::invalid_config(
                "descriptor",
                format!("{fd} is not a valid descriptor"),
            ));
        }
        if self.shared.phase.lock().stop_requested {
            return Err(OffloadError::pool_shutdown(self.name()));
        }

        let callback: Arc<DispatchFn> = Arc::new(callback);
        let mut registry = self.shared.registry.lock();
        if registry.add(fd, interest, callback) {
            debug!("poller '{}': descriptor {} registered", self.name(), fd);
        } else {
            debug!(
                "poller '{}': descriptor {} already registered; add ignored",
                self.name(),
                fd
            );
        }
        Ok(())
    }

    /// Unregister a descriptor.
    ///
    /// Blocks until any dispatch already running for this descriptor has
    /// completed, so when `remove` returns the callback is not running and
    /// will never run again. A callback removing its own descriptor is
    /// exempt from the wait and returns immediately. Removing a descriptor
    /// that is not registered is a no-op.
    pub fn remove(&self, fd: RawFd) {
        let mut registry = self.shared.registry.lock();
        let was_registered = registry.remove(fd);
        while let Some((busy_fd, dispatcher)) = registry.in_flight {
            if busy_fd != fd || dispatcher == thread::current().id() {
                break;
            }
            self.shared.registry_cv.wait(&mut registry);
        }
        if was_registered {
            debug!("poller '{}': descriptor {} removed", self.name(), fd);
        }
    }

    /// Whether a descriptor is currently registered.
    pub fn contains(&self, fd: RawFd) -> bool {
        self.shared.registry.lock().contains(fd)
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.shared.registry.lock().len()
    }

    /// Whether no descriptors are registered.
    pub fn is_empty(&self) -> bool {
        self.shared.registry.lock().is_empty()
    }

    /// Pause polling without losing registrations.
    ///
    /// Takes effect at the next tick boundary; a dispatch already running
    /// completes first. No-op unless the poller is running.
    pub fn suspend(&self) {
        let mut phase = self.shared.phase.lock();
        if phase.phase == PollerPhase::Running {
            phase.phase = PollerPhase::Suspended;
            info!("poller '{}' suspended", self.name());
        }
    }

    /// Resume a suspended poller.
    pub fn resume(&self) {
        let mut phase = self.shared.phase.lock();
        if phase.phase == PollerPhase::Suspended {
            phase.phase = PollerPhase::Running;
            self.shared.phase_cv.notify_all();
            info!("poller '{}' resumed", self.name());
        }
    }

    /// Stop the poller for good.
    ///
    /// The loop exits after the sweep in progress; remaining registrations
    /// are discarded. Idempotent, and terminal: a stopped poller cannot be
    /// started again.
    pub fn stop(&self) {
        {
            let mut phase = self.shared.phase.lock();
            if phase.stop_requested {
                return;
            }
            phase.stop_requested = true;
            phase.phase = PollerPhase::Stopped;
            self.shared.phase_cv.notify_all();
        }
        self.shared.registry.lock().clear();
        info!("poller '{}' stopping", self.name());
    }

    /// Block until the poller thread has exited.
    ///
    /// Call after [`stop`]; joining a live poller reports
    /// [`OffloadError::AlreadyRunning`].
    ///
    /// [`stop`]: FdPoller::stop
    pub fn join(&self) -> Result<()> {
        {
            let phase = self.shared.phase.lock();
            if !phase.stop_requested && phase.phase != PollerPhase::Stopped {
                return Err(OffloadError::already_running(self.name()));
            }
        }
        if let Some(handle) = self.thread.lock().take() {
            handle
                .join()
                .map_err(|_| OffloadError::join(self.name(), "poller thread panicked"))?;
        }
        Ok(())
    }

    /// Stop the poller and wait for its thread to exit.
    pub fn shutdown(&self) -> Result<()> {
        self.stop();
        self.join()
    }

    /// The poller thread name.
    pub fn name(&self) -> &str {
        &self.shared.config.thread_name
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> PollerPhase {
        self.shared.phase.lock().phase
    }

    /// Whether the poller is sweeping.
    pub fn is_running(&self) -> bool {
        self.phase() == PollerPhase::Running
    }

    /// The configured interval between sweeps.
    pub fn tick_interval(&self) -> Duration {
        self.shared.config.tick_interval
    }

    /// Snapshot of poller activity counters.
    pub fn stats(&self) -> PollerStatsSnapshot {
        PollerStatsSnapshot {
            iterations: self.shared.stats.get_iterations(),
            dispatches: self.shared.stats.get_dispatches(),
            transient_errors: self.shared.stats.get_transient_errors(),
            descriptors_dropped: self.shared.stats.get_descriptors_dropped(),
            throttle_engagements: self.shared.stats.get_throttle_engagements(),
            callback_panics: self.shared.stats.get_callback_panics(),
            registered: self.len(),
        }
    }
}

impl ThreadNode for FdPoller {
    fn name(&self) -> &str {
        FdPoller::name(self)
    }

    fn start(&self) -> Result<()> {
        FdPoller::start(self)
    }

    fn stop(&self) {
        FdPoller::stop(self)
    }

    fn join(&self) -> Result<()> {
        FdPoller::join(self)
    }

    fn parent(&self) -> Option<Arc<dyn ThreadNode>> {
        self.parent.lock().as_ref().and_then(Weak::upgrade)
    }

    fn set_parent(&self, parent: Weak<dyn ThreadNode>) {
        *self.parent.lock() = Some(parent);
    }
}

impl fmt::Debug for FdPoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FdPoller")
            .field("name", &self.name())
            .field("phase", &self.phase())
            .field("registered", &self.len())
            .finish()
    }
}

impl Drop for FdPoller {
    fn drop(&mut self) {
        self.stop();
        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        // The loop re-checks the phase at every tick boundary, so this
        // resolves within a tick plus whatever dispatch is in progress.
        let start = Instant::now();
        while !handle.is_finished() {
            if start.elapsed() >= DROP_JOIN_TIMEOUT {
                warn!(
                    "poller '{}' did not stop within {:?}; thread may be leaked",
                    self.name(),
                    DROP_JOIN_TIMEOUT
                );
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        if handle.join().is_err() {
            error!("poller '{}' panicked during shutdown", self.name());
        }
    }
}
