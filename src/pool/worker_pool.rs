//! Bounded worker pool with pull-based activation
//!
//! A [`WorkerPool`] keeps a warm set of idle [`ReturnableWorker`] threads
//! between a soft floor (`max_unused_threads`) and a hard ceiling
//! (`max_threads`). Callers [`pull()`] an idle worker, load it with a payload
//! and a callback, and activate it; the worker hands itself back when the run
//! completes. A background creation loop grows the pool on demand and keeps
//! the warm set topped up, so pulls on a healthy pool are O(1) channel
//! receives.
//!
//! [`pull()`]: WorkerPool::pull

use crate::core::error::{OffloadError, Result};
use crate::core::node::ThreadNode;
use crate::core::payload::SafeData;
use crate::pool::returnable::ReturnableWorker;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

/// Default soft floor of idle workers kept warm.
pub const DEFAULT_MAX_UNUSED_THREADS: usize = 2;

/// Default interval at which blocked pool waits re-check the pool phase.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Base delay before a failed worker spawn is retried.
const SPAWN_RETRY_BASE_MS: u64 = 10;

/// Upper bound of the random jitter added to the spawn retry delay.
const SPAWN_RETRY_JITTER_MS: u64 = 40;

/// How long `Drop` waits for each worker thread before giving up on it.
const DROP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

const PHASE_NEW: u8 = 0;
const PHASE_RUNNING: u8 = 1;
const PHASE_STOPPING: u8 = 2;
const PHASE_STOPPED: u8 = 3;

/// Lifecycle phases of a [`WorkerPool`].
///
/// The machine is one-shot: `Stopped -> Running -> Stopping -> Stopped`.
/// A pool that has wound down cannot be started again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPhase {
    /// Not running: never started, or fully wound down.
    Stopped,
    /// Serving pulls and keeping the warm set topped up.
    Running,
    /// Winding down: idle workers are torn down, busy ones finish first.
    Stopping,
}

/// Configuration for a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Hard ceiling on live workers. Defaults to the number of CPU cores.
    pub max_threads: usize,
    /// Soft floor of idle workers kept warm while below the ceiling.
    pub max_unused_threads: usize,
    /// Prefix for worker thread names (`{prefix}-worker-{id}`).
    pub thread_name_prefix: String,
    /// Interval at which blocked waits re-check the pool phase.
    pub poll_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        let max_threads = num_cpus::get().max(1);
        Self {
            max_threads,
            max_unused_threads: DEFAULT_MAX_UNUSED_THREADS.min(max_threads),
            thread_name_prefix: "offload".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WorkerPoolConfig {
    /// Create a configuration with the given worker ceiling.
    ///
    /// Passing 0 keeps the default ceiling (number of CPU cores).
    pub fn new(max_threads: usize) -> Self {
        let mut config = Self::default();
        if max_threads > 0 {
            config.max_threads = max_threads;
            config.max_unused_threads = config.max_unused_threads.min(max_threads);
        }
        config
    }

    /// Set the soft floor of idle workers kept warm.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_unused_threads(mut self, max_unused_threads: usize) -> Self {
        self.max_unused_threads = max_unused_threads;
        self
    }

    /// Set the prefix used for worker thread names.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the interval at which blocked waits re-check the pool phase.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_threads == 0 {
            return Err(OffloadError::invalid_config(
                "max_threads",
                "must be at least 1",
            ));
        }
        if self.max_unused_threads > self.max_threads {
            return Err(OffloadError::invalid_config(
                "max_unused_threads",
                format!(
                    "soft floor {} exceeds hard ceiling {}",
                    self.max_unused_threads, self.max_threads
                ),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(OffloadError::invalid_config(
                "poll_interval",
                "must be non-zero",
            ));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(OffloadError::invalid_config(
                "thread_name_prefix",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// Counters for pool activity
#[derive(Debug, Default)]
pub struct PoolStats {
    workers_created: AtomicU64,
    workers_retired: AtomicU64,
    spawn_failures: AtomicU64,
    activations: AtomicU64,
    pulls_warm: AtomicU64,
    pulls_waited: AtomicU64,
}

impl PoolStats {
    /// Increment the created-worker counter
    pub fn increment_workers_created(&self) {
        self.workers_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the retired-worker counter
    pub fn increment_workers_retired(&self) {
        self.workers_retired.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the spawn-failure counter
    pub fn increment_spawn_failures(&self) {
        self.spawn_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the completed-run counter
    pub fn increment_activations(&self) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the counter of pulls served from the warm set
    pub fn increment_pulls_warm(&self) {
        self.pulls_warm.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the counter of pulls that had to wait
    pub fn increment_pulls_waited(&self) {
        self.pulls_waited.fetch_add(1, Ordering::Relaxed);
    }

    /// Get workers spawned over the pool's lifetime
    pub fn get_workers_created(&self) -> u64 {
        self.workers_created.load(Ordering::Relaxed)
    }

    /// Get workers torn down over the pool's lifetime
    pub fn get_workers_retired(&self) -> u64 {
        self.workers_retired.load(Ordering::Relaxed)
    }

    /// Get spawn attempts that failed at the OS level
    pub fn get_spawn_failures(&self) -> u64 {
        self.spawn_failures.load(Ordering::Relaxed)
    }

    /// Get completed worker runs, empty runs included
    pub fn get_activations(&self) -> u64 {
        self.activations.load(Ordering::Relaxed)
    }

    /// Get pulls served immediately from the warm set
    pub fn get_pulls_warm(&self) -> u64 {
        self.pulls_warm.load(Ordering::Relaxed)
    }

    /// Get pulls that had to wait for a worker
    pub fn get_pulls_waited(&self) -> u64 {
        self.pulls_waited.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of pool activity, obtained from [`WorkerPool::stats`].
#[derive(Debug, Clone)]
pub struct PoolStatsSnapshot {
    /// Workers spawned over the pool's lifetime.
    pub workers_created: u64,
    /// Workers torn down over the pool's lifetime.
    pub workers_retired: u64,
    /// Worker spawn attempts that failed at the OS level.
    pub spawn_failures: u64,
    /// Completed worker runs, empty runs included.
    pub activations: u64,
    /// Pulls served immediately from the warm set.
    pub pulls_warm: u64,
    /// Pulls that had to wait for a worker.
    pub pulls_waited: u64,
    /// Workers currently alive, whether idle, leased or running.
    pub live_workers: usize,
    /// Workers currently parked in the warm set.
    pub idle_workers: usize,
    /// Pulls currently blocked waiting for a worker.
    pub queued_pulls: usize,
    /// Whether the creation loop had nothing to do on its last pass.
    pub creator_idle: bool,
}

/// What the pool decided to do with a worker that finished a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReturnDisposition {
    /// The worker was re-offered to the warm set and parks for the next run.
    Reoffer,
    /// The warm set is full or the pool is stopping; the worker exits.
    Retire,
}

struct Roster {
    workers: Vec<Arc<ReturnableWorker>>,
    next_id: usize,
}

/// Shared pool state: the roster, the warm set and the demand signal.
///
/// Workers hold a `Weak` reference back to this so a pool dropped mid-run
/// cannot keep itself alive through its own threads. The roster guard and a
/// worker's handoff guard are never held at the same time; teardown
/// decisions are computed first, then applied to the worker.
pub(crate) struct PoolCore {
    config: WorkerPoolConfig,
    phase: AtomicU8,
    roster: Mutex<Roster>,
    /// Workers that left the roster and whose threads await a join.
    retired: Mutex<Vec<Arc<ReturnableWorker>>>,
    idle_tx: Sender<Arc<ReturnableWorker>>,
    idle_rx: Receiver<Arc<ReturnableWorker>>,
    demand_tx: Sender<()>,
    demand_rx: Receiver<()>,
    queued_pulls: AtomicUsize,
    creator_idle: AtomicBool,
    stats: PoolStats,
}

impl PoolCore {
    fn name(&self) -> &str {
        &self.config.thread_name_prefix
    }

    fn is_running(&self) -> bool {
        self.phase.load(Ordering::Acquire) == PHASE_RUNNING
    }

    fn live_workers(&self) -> usize {
        self.roster.lock().workers.len()
    }

    fn idle_workers(&self) -> usize {
        self.idle_rx.len()
    }

    /// Offer a worker to the warm set. Both channel ends live in the core,
    /// so the send cannot fail while anyone holds the pool.
    fn reoffer(&self, worker: Arc<ReturnableWorker>) {
        let _ = self.idle_tx.send(worker);
    }

    fn remove_from_roster(&self, id: usize) -> Option<Arc<ReturnableWorker>> {
        let mut roster = self.roster.lock();
        let position = roster.workers.iter().position(|w| w.id() == id)?;
        Some(roster.workers.swap_remove(position))
    }

    /// Spawn one worker and add it to the roster.
    ///
    /// Returns `Ok(None)` when the ceiling is reached or the pool is no
    /// longer running. The roster guard is held across the spawn so the
    /// ceiling check and the insert are atomic.
    fn create_worker(self: &Arc<Self>) -> Result<Option<Arc<ReturnableWorker>>> {
        let mut roster = self.roster.lock();
        if !self.is_running() || roster.workers.len() >= self.config.max_threads {
            return Ok(None);
        }
        let id = roster.next_id;
        let name = format!("{}-worker-{}", self.config.thread_name_prefix, id);
        let worker = ReturnableWorker::spawn(id, name, Arc::downgrade(self))?;
        roster.next_id += 1;
        roster.workers.push(Arc::clone(&worker));
        self.stats.increment_workers_created();
        debug!(
            "pool '{}': created worker #{} ({} live)",
            self.name(),
            id,
            roster.workers.len()
        );
        Ok(Some(worker))
    }

    /// Take an idle worker, blocking until one is available.
    fn pull(self: &Arc<Self>) -> Result<Arc<ReturnableWorker>> {
        match self.phase.load(Ordering::Acquire) {
            PHASE_RUNNING => {}
            PHASE_NEW => return Err(OffloadError::not_running(self.name())),
            _ => return Err(OffloadError::pool_shutdown(self.name())),
        }

        // Fast path: a warm worker is already parked in the idle set.
        while let Ok(worker) = self.idle_rx.try_recv() {
            if worker.mark_leased() {
                self.stats.increment_pulls_warm();
                return Ok(worker);
            }
            // Stale entry, torn down since it was offered; skip it.
        }

        // Slow path: signal demand and wait for a worker to be created or
        // to return from a run.
        self.queued_pulls.fetch_add(1, Ordering::SeqCst);
        let _ = self.demand_tx.send(());
        let result = self.wait_for_worker();
        self.queued_pulls.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn wait_for_worker(&self) -> Result<Arc<ReturnableWorker>> {
        loop {
            match self.idle_rx.recv_timeout(self.config.poll_interval) {
                Ok(worker) => {
                    if worker.mark_leased() {
                        self.stats.increment_pulls_waited();
                        return Ok(worker);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !self.is_running() {
                        return Err(OffloadError::pool_shutdown(self.name()));
                    }
                    // Lost wakeups heal here: re-assert demand each interval.
                    let _ = self.demand_tx.send(());
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(OffloadError::pool_shutdown(self.name()));
                }
            }
        }
    }

    /// Recycling decision for a worker that just finished a run.
    ///
    /// Keeps the worker when someone is waiting or the warm set is below the
    /// floor; otherwise the worker retires so the idle population converges
    /// on `max_unused_threads`.
    pub(crate) fn worker_returned(&self, worker: &Arc<ReturnableWorker>) -> ReturnDisposition {
        self.stats.increment_activations();

        if !self.is_running() {
            // Shutdown path: the worker stays in the roster so join()
            // collects its thread.
            self.stats.increment_workers_retired();
            debug!(
                "pool '{}': worker #{} retiring on shutdown",
                self.name(),
                worker.id()
            );
            return ReturnDisposition::Retire;
        }

        let warm = self.idle_workers();
        let waiting = self.queued_pulls.load(Ordering::SeqCst);
        if waiting > 0 || warm < self.config.max_unused_threads {
            self.reoffer(Arc::clone(worker));
            return ReturnDisposition::Reoffer;
        }

        if let Some(worker) = self.remove_from_roster(worker.id()) {
            self.retired.lock().push(worker);
        }
        self.stats.increment_workers_retired();
        debug!(
            "pool '{}': worker #{} recycled ({} warm)",
            self.name(),
            worker.id(),
            warm
        );
        ReturnDisposition::Retire
    }

    /// Create a worker for a blocked pull, if demand still stands.
    fn service_demand(self: &Arc<Self>) {
        if self.queued_pulls.load(Ordering::SeqCst) == 0 {
            return; // a returning worker satisfied the pull in the meantime
        }
        match self.create_worker() {
            Ok(Some(worker)) => self.reoffer(worker),
            Ok(None) => {
                // At the ceiling: the next returning worker serves the wait.
            }
            Err(e) => self.handle_spawn_failure(e),
        }
    }

    fn handle_spawn_failure(&self, e: OffloadError) {
        error!("pool '{}': {}", self.name(), e);
        self.stats.increment_spawn_failures();
        let jitter = fastrand::u64(..=SPAWN_RETRY_JITTER_MS);
        thread::sleep(Duration::from_millis(SPAWN_RETRY_BASE_MS + jitter));
        // Leave a wakeup behind so the attempt is repeated.
        let _ = self.demand_tx.send(());
    }

    /// Create workers until the warm set reaches the floor or the roster
    /// reaches the ceiling.
    fn top_up_warm_floor(self: &Arc<Self>) {
        while self.is_running() && self.idle_workers() < self.config.max_unused_threads {
            match self.create_worker() {
                Ok(Some(worker)) => self.reoffer(worker),
                Ok(None) => return,
                Err(e) => {
                    self.handle_spawn_failure(e);
                    return;
                }
            }
        }
    }

    /// Tear down idle workers beyond the floor when nobody is waiting.
    fn trim_warm_surplus(&self) {
        while self.queued_pulls.load(Ordering::SeqCst) == 0
            && self.idle_workers() > self.config.max_unused_threads
        {
            let Ok(worker) = self.idle_rx.try_recv() else {
                return;
            };
            if worker.request_teardown_if_idle() {
                self.remove_from_roster(worker.id());
                self.retired.lock().push(worker);
                self.stats.increment_workers_retired();
            }
            // A stale entry was accounted for when it was torn down.
        }
    }

    /// Join threads of workers that left the roster. Their run loops have
    /// already broken out, so each join is momentary.
    fn reap_retired(&self) {
        let retired: Vec<_> = {
            let mut guard = self.retired.lock();
            guard.drain(..).collect()
        };
        for worker in retired {
            if let Err(e) = worker.join_thread() {
                warn!("pool '{}': {}", self.name(), e);
            }
        }
    }

    /// Background loop that grows the pool on demand and keeps the warm set
    /// between the floor and the ceiling.
    fn creation_loop(core: Arc<PoolCore>) {
        debug!("pool '{}': creation loop online", core.name());

        loop {
            match core.demand_rx.recv_timeout(core.config.poll_interval) {
                Ok(()) => {
                    core.creator_idle.store(false, Ordering::Release);
                    core.service_demand();
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if !core.is_running() {
                break;
            }
            core.top_up_warm_floor();
            core.trim_warm_surplus();
            core.reap_retired();

            let settled = core.queued_pulls.load(Ordering::SeqCst) == 0
                && (core.idle_workers() >= core.config.max_unused_threads
                    || core.live_workers() >= core.config.max_threads);
            core.creator_idle.store(settled, Ordering::Release);
        }

        core.creator_idle.store(true, Ordering::Release);
        debug!("pool '{}': creation loop exiting", core.name());
    }

    fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            workers_created: self.stats.get_workers_created(),
            workers_retired: self.stats.get_workers_retired(),
            spawn_failures: self.stats.get_spawn_failures(),
            activations: self.stats.get_activations(),
            pulls_warm: self.stats.get_pulls_warm(),
            pulls_waited: self.stats.get_pulls_waited(),
            live_workers: self.live_workers(),
            idle_workers: self.idle_workers(),
            queued_pulls: self.queued_pulls.load(Ordering::SeqCst),
            creator_idle: self.creator_idle.load(Ordering::Acquire),
        }
    }
}

/// RAII lease on an idle worker obtained from [`WorkerPool::pull`].
///
/// Dereferences to the underlying [`ReturnableWorker`], so the activation
/// protocol reads the same as operating on the worker directly:
/// [`set_safe_data`], [`connect_safe_run`], then [`activate`]. Dropping the
/// lease without activating hands the worker straight back to the warm set.
///
/// [`set_safe_data`]: ReturnableWorker::set_safe_data
/// [`connect_safe_run`]: ReturnableWorker::connect_safe_run
/// [`activate`]: PulledWorker::activate
pub struct PulledWorker {
    worker: Option<Arc<ReturnableWorker>>,
    pool: Arc<PoolCore>,
}

impl PulledWorker {
    /// Authorize the run and release the lease.
    ///
    /// The worker invokes its registered callback on its own thread and
    /// returns to the pool when the run completes.
    pub fn activate(mut self) -> Result<()> {
        let worker = self.worker.take().expect("lease already consumed");
        worker.activate()
    }

    /// The leased worker.
    pub fn worker(&self) -> &Arc<ReturnableWorker> {
        self.worker.as_ref().expect("lease already consumed")
    }
}

impl Deref for PulledWorker {
    type Target = ReturnableWorker;

    fn deref(&self) -> &Self::Target {
        self.worker()
    }
}

impl fmt::Debug for PulledWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PulledWorker")
            .field("worker", &self.worker)
            .finish()
    }
}

impl Drop for PulledWorker {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.clear_lease_if_unactivated() {
                self.pool.reoffer(worker);
            }
        }
    }
}

/// A bounded pool of returnable worker threads.
///
/// # Example
///
/// ```
/// use audio_offload::pool::WorkerPool;
/// use audio_offload::safe_data;
/// use std::sync::mpsc;
///
/// # fn main() -> audio_offload::Result<()> {
/// let pool = WorkerPool::with_bounds(4, 2)?;
/// pool.start()?;
///
/// let (tx, rx) = mpsc::channel();
/// let worker = pool.pull()?;
/// worker.set_safe_data(safe_data(440.0f64));
/// worker.connect_safe_run(move |data| {
///     // runs on the worker thread
///     let _ = tx.send(data.is_some());
/// });
/// worker.activate()?;
///
/// assert!(rx.recv().unwrap());
/// pool.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub struct WorkerPool {
    core: Arc<PoolCore>,
    creator: Mutex<Option<thread::JoinHandle<()>>>,
    parent: Mutex<Option<Weak<dyn ThreadNode>>>,
}

impl WorkerPool {
    /// Create a pool with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(WorkerPoolConfig::default())
    }

    /// Create a pool with the given worker ceiling and warm floor.
    pub fn with_bounds(max_threads: usize, max_unused_threads: usize) -> Result<Self> {
        Self::with_config(
            WorkerPoolConfig::new(max_threads).with_max_unused_threads(max_unused_threads),
        )
    }

    /// Create a pool from a full configuration.
    pub fn with_config(config: WorkerPoolConfig) -> Result<Self> {
        config.validate()?;
        let (idle_tx, idle_rx) = unbounded();
        let (demand_tx, demand_rx) = unbounded();
        Ok(Self {
            core: Arc::new(PoolCore {
                config,
                phase: AtomicU8::new(PHASE_NEW),
                roster: Mutex::new(Roster {
                    workers: Vec::new(),
                    next_id: 0,
                }),
                retired: Mutex::new(Vec::new()),
                idle_tx,
                idle_rx,
                demand_tx,
                demand_rx,
                queued_pulls: AtomicUsize::new(0),
                creator_idle: AtomicBool::new(true),
                stats: PoolStats::default(),
            }),
            creator: Mutex::new(None),
            parent: Mutex::new(None),
        })
    }

    /// Start the pool: launch the creation loop and prewarm the idle set.
    ///
    /// Prewarming is synchronous, so pulls issued right after `start`
    /// returns are served from the warm set. Fails with
    /// [`OffloadError::AlreadyRunning`] on a running pool and
    /// [`OffloadError::PoolShutdown`] on one that has already wound down.
    pub fn start(&self) -> Result<()> {
        match self.core.phase.compare_exchange(
            PHASE_NEW,
            PHASE_RUNNING,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {}
            Err(PHASE_RUNNING) => return Err(OffloadError::already_running(self.name())),
            Err(_) => return Err(OffloadError::pool_shutdown(self.name())),
        }

        // Prewarm before the creation loop launches, so the floor is
        // already met when it takes over.
        let floor = self
            .core
            .config
            .max_unused_threads
            .min(self.core.config.max_threads);
        while self.core.live_workers() < floor {
            match self.core.create_worker() {
                Ok(Some(worker)) => self.core.reoffer(worker),
                Ok(None) => break,
                Err(e) => {
                    // The creation loop retries the floor on its next pass.
                    error!("pool '{}': prewarm: {}", self.name(), e);
                    self.core.stats.increment_spawn_failures();
                    break;
                }
            }
        }

        let creator_name = format!("{}-creator", self.core.config.thread_name_prefix);
        let core = Arc::clone(&self.core);
        let handle = thread::Builder::new()
            .name(creator_name.clone())
            .spawn(move || PoolCore::creation_loop(core))
            .map_err(|e| {
                // Without the creation loop the pool can neither grow nor
                // recycle, so give up entirely.
                self.core.phase.store(PHASE_STOPPED, Ordering::Release);
                let workers: Vec<_> = self.core.roster.lock().workers.clone();
                for worker in workers {
                    worker.request_teardown_if_idle();
                }
                OffloadError::spawn_with_source(creator_name, e.to_string(), e)
            })?;
        *self.creator.lock() = Some(handle);

        info!(
            "pool '{}' started ({} warm, ceiling {})",
            self.name(),
            self.core.idle_workers(),
            self.core.config.max_threads
        );
        Ok(())
    }

    /// Take an idle worker out of the pool.
    ///
    /// Served O(1) from the warm set when a worker is parked there;
    /// otherwise blocks until the creation loop spawns one or a running
    /// worker returns. At the ceiling with every worker busy, the call
    /// blocks until a run completes. Fails with
    /// [`OffloadError::NotRunning`] before [`start`] and
    /// [`OffloadError::PoolShutdown`] once the pool stops.
    ///
    /// [`start`]: WorkerPool::start
    pub fn pull(&self) -> Result<PulledWorker> {
        let worker = self.core.pull()?;
        Ok(PulledWorker {
            worker: Some(worker),
            pool: Arc::clone(&self.core),
        })
    }

    /// Pull a worker, load it and activate it in one call.
    pub fn dispatch<F>(&self, data: Option<SafeData>, callback: F) -> Result<()>
    where
        F: FnOnce(Option<SafeData>) + Send + 'static,
    {
        let worker = self.pull()?;
        if let Some(data) = data {
            worker.set_safe_data(data);
        }
        worker.connect_safe_run(callback);
        worker.activate()
    }

    /// Request wind-down.
    ///
    /// Idle workers, leased-but-unactivated ones included, are torn down
    /// immediately; busy workers finish their current run and then retire on
    /// their own. Pending and future pulls fail with
    /// [`OffloadError::PoolShutdown`]. Idempotent.
    pub fn stop(&self) {
        if self
            .core
            .phase
            .compare_exchange(
                PHASE_RUNNING,
                PHASE_STOPPING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            // Never started or already stopping. A pool that never ran
            // still becomes permanently unusable.
            let _ = self.core.phase.compare_exchange(
                PHASE_NEW,
                PHASE_STOPPED,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            return;
        }
        info!("pool '{}' stopping", self.name());

        // Wake the creation loop so it notices the phase change.
        let _ = self.core.demand_tx.send(());

        // Tear down idle workers. Busy ones observe the phase when they
        // return and retire on their own.
        let workers: Vec<_> = self.core.roster.lock().workers.clone();
        for worker in workers {
            if worker.request_teardown_if_idle() {
                self.core.stats.increment_workers_retired();
            }
        }
    }

    /// Block until the creation loop and every worker thread have exited.
    ///
    /// Call after [`stop`]; joining a running pool reports
    /// [`OffloadError::AlreadyRunning`]. Busy workers are never preempted,
    /// so this waits for their current runs to complete.
    ///
    /// [`stop`]: WorkerPool::stop
    pub fn join(&self) -> Result<()> {
        if self.core.is_running() {
            return Err(OffloadError::already_running(self.name()));
        }

        if let Some(handle) = self.creator.lock().take() {
            handle.join().map_err(|_| {
                OffloadError::join(
                    format!("{}-creator", self.core.config.thread_name_prefix),
                    "creation loop panicked",
                )
            })?;
        }

        let workers: Vec<_> = {
            let mut roster = self.core.roster.lock();
            roster.workers.drain(..).collect()
        };
        for worker in workers {
            worker.join_thread()?;
        }
        self.core.reap_retired();

        // A pool that never ran stays startable; only a stopping one
        // becomes terminally stopped.
        let _ = self.core.phase.compare_exchange(
            PHASE_STOPPING,
            PHASE_STOPPED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        debug!("pool '{}' joined", self.name());
        Ok(())
    }

    /// Stop the pool and wait for every thread to exit.
    pub fn shutdown(&self) -> Result<()> {
        self.stop();
        self.join()
    }

    /// The pool name, also used as the worker thread name prefix.
    pub fn name(&self) -> &str {
        self.core.name()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> PoolPhase {
        match self.core.phase.load(Ordering::Acquire) {
            PHASE_RUNNING => PoolPhase::Running,
            PHASE_STOPPING => PoolPhase::Stopping,
            _ => PoolPhase::Stopped,
        }
    }

    /// Whether the pool is currently serving pulls.
    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    /// Hard ceiling on live workers.
    pub fn max_threads(&self) -> usize {
        self.core.config.max_threads
    }

    /// Soft floor of idle workers kept warm.
    pub fn max_unused_threads(&self) -> usize {
        self.core.config.max_unused_threads
    }

    /// Workers currently alive, whether idle, leased or running.
    pub fn live_workers(&self) -> usize {
        self.core.live_workers()
    }

    /// Workers currently parked in the warm set.
    pub fn idle_workers(&self) -> usize {
        self.core.idle_workers()
    }

    /// Snapshot of pool activity counters.
    pub fn stats(&self) -> PoolStatsSnapshot {
        self.core.snapshot()
    }
}

impl ThreadNode for WorkerPool {
    fn name(&self) -> &str {
        WorkerPool::name(self)
    }

    fn start(&self) -> Result<()> {
        WorkerPool::start(self)
    }

    fn stop(&self) {
        WorkerPool::stop(self)
    }

    fn join(&self) -> Result<()> {
        WorkerPool::join(self)
    }

    fn parent(&self) -> Option<Arc<dyn ThreadNode>> {
        self.parent.lock().as_ref().and_then(Weak::upgrade)
    }

    fn set_parent(&self, parent: Weak<dyn ThreadNode>) {
        *self.parent.lock() = Some(parent);
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name())
            .field("phase", &self.phase())
            .field("live_workers", &self.live_workers())
            .field("idle_workers", &self.idle_workers())
            .finish()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.creator.lock().take() {
            // The creation loop re-checks the phase every poll interval.
            if handle.join().is_err() {
                error!("pool '{}': creation loop panicked", self.name());
            }
        }
        let workers: Vec<_> = {
            let mut roster = self.core.roster.lock();
            roster.workers.drain(..).collect()
        };
        for worker in workers {
            worker.join_thread_timeout(DROP_JOIN_TIMEOUT);
        }
        self.core.reap_retired();
        self.core.phase.store(PHASE_STOPPED, Ordering::Release);
    }
}
