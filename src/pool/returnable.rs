//! Returnable worker threads
//!
//! A [`ReturnableWorker`] owns one OS thread and runs exactly one registered
//! callback per activation. Between activations the thread parks on the
//! worker's handoff guard; after a run it resets its payload and callback
//! slots and hands itself back to the owning pool, which re-offers it to the
//! next [`pull()`] caller or retires it.
//!
//! [`pull()`]: crate::pool::WorkerPool::pull

use crate::core::error::{OffloadError, Result};
use crate::core::payload::{SafeData, SafeRunFn};
use crate::pool::worker_pool::{PoolCore, ReturnDisposition};
use log::{debug, error, warn};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

/// Lifecycle states of a returnable worker.
///
/// A worker cycles `Idle -> InUse -> Resetting -> Idle` for every activation.
/// `Teardown` is terminal and is only ever entered from `Idle`, chosen by the
/// pool's recycling policy or by shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Parked, waiting to be pulled and activated.
    Idle,
    /// Running (or about to run) the registered callback.
    InUse,
    /// Clearing the payload and callback slots after a run.
    Resetting,
    /// Terminal: the worker thread has exited or is about to.
    Teardown,
}

impl WorkerState {
    /// Short lowercase label used in log output and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::InUse => "in-use",
            WorkerState::Resetting => "resetting",
            WorkerState::Teardown => "teardown",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for a worker thread
#[derive(Debug, Default)]
pub struct WorkerCounters {
    /// Total number of activations that ran a callback
    pub activations: AtomicU64,
    /// Total number of activations with no callback registered
    pub empty_runs: AtomicU64,
    /// Total number of callbacks that panicked
    pub panics: AtomicU64,
}

impl WorkerCounters {
    /// Create new worker counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the activation counter
    pub fn increment_activations(&self) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the empty-run counter
    pub fn increment_empty_runs(&self) {
        self.empty_runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the panic counter
    pub fn increment_panics(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total activations that ran a callback
    pub fn get_activations(&self) -> u64 {
        self.activations.load(Ordering::Relaxed)
    }

    /// Get total activations with no callback registered
    pub fn get_empty_runs(&self) -> u64 {
        self.empty_runs.load(Ordering::Relaxed)
    }

    /// Get total callbacks that panicked
    pub fn get_panics(&self) -> u64 {
        self.panics.load(Ordering::Relaxed)
    }
}

/// Everything the activator and the worker thread exchange.
///
/// One mutex guards the whole handoff so no thread ever observes a
/// half-written activation: state tag, payload slot, callback slot and the
/// lease mark move together.
struct Handoff {
    state: WorkerState,
    safe_data: Option<SafeData>,
    callback: Option<SafeRunFn>,
    leased: bool,
}

/// A worker thread that runs one registered callback per activation and
/// returns itself to its pool afterwards.
///
/// Obtained through [`WorkerPool::pull()`], which hands out a
/// [`PulledWorker`] lease dereferencing to this type. The activation
/// protocol is: set the payload with [`set_safe_data`], register the entry
/// point with [`connect_safe_run`], then [`activate`]. The worker invokes
/// the callback on its own thread, clears both slots, and becomes idle
/// again.
///
/// [`WorkerPool::pull()`]: crate::pool::WorkerPool::pull
/// [`PulledWorker`]: crate::pool::PulledWorker
/// [`set_safe_data`]: ReturnableWorker::set_safe_data
/// [`connect_safe_run`]: ReturnableWorker::connect_safe_run
/// [`activate`]: ReturnableWorker::activate
pub struct ReturnableWorker {
    id: usize,
    name: String,
    handoff: Mutex<Handoff>,
    wakeup: Condvar,
    owner: Weak<PoolCore>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
    counters: WorkerCounters,
}

impl ReturnableWorker {
    /// Create a worker and start its OS thread.
    pub(crate) fn spawn(id: usize, name: String, owner: Weak<PoolCore>) -> Result<Arc<Self>> {
        let worker = Arc::new(Self {
            id,
            name: name.clone(),
            handoff: Mutex::new(Handoff {
                state: WorkerState::Idle,
                safe_data: None,
                callback: None,
                leased: false,
            }),
            wakeup: Condvar::new(),
            owner,
            thread: Mutex::new(None),
            counters: WorkerCounters::new(),
        });

        let thread_worker = Arc::clone(&worker);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || Self::run(thread_worker))
            .map_err(|e| OffloadError::spawn_with_source(name, e.to_string(), e))?;

        *worker.thread.lock() = Some(handle);
        Ok(worker)
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.handoff.lock().state
    }

    /// Whether a payload is currently set.
    ///
    /// A worker that is visible as idle to the pool always reports `false`;
    /// the payload only exists between the activator setting it and the run
    /// consuming it.
    pub fn has_safe_data(&self) -> bool {
        self.handoff.lock().safe_data.is_some()
    }

    /// Get worker counters
    pub fn counters(&self) -> &WorkerCounters {
        &self.counters
    }

    /// Sets the payload for the next activation.
    ///
    /// Call between pulling the worker and activating it; a second call
    /// overwrites the first. The payload is dropped unread if the worker is
    /// torn down before it runs.
    pub fn set_safe_data(&self, data: SafeData) {
        self.handoff.lock().safe_data = Some(data);
    }

    /// Registers the entry point for the next activation.
    ///
    /// The slot holds a single callback; registering over an existing one
    /// overwrites it. The slot is cleared when the worker resets after a
    /// run, so each registration authorizes exactly one run.
    pub fn connect_safe_run<F>(&self, callback: F)
    where
        F: FnOnce(Option<SafeData>) + Send + 'static,
    {
        let mut guard = self.handoff.lock();
        if guard.callback.is_some() {
            debug!("worker #{}: overwriting safe-run registration", self.id);
        }
        guard.callback = Some(Box::new(callback));
    }

    /// Clears the callback slot.
    pub fn disconnect_safe_run(&self) {
        self.handoff.lock().callback = None;
    }

    /// Authorizes the worker to run: `Idle -> InUse`.
    ///
    /// Only one activation can win; a concurrent attempt on a worker that is
    /// already in use (or resetting) fails fast with
    /// [`OffloadError::DoubleActivation`] and is logged, without disturbing
    /// the run in progress. Activating a worker whose pool has torn it down
    /// reports [`OffloadError::PoolShutdown`].
    pub fn activate(&self) -> Result<()> {
        let mut guard = self.handoff.lock();
        match guard.state {
            WorkerState::Idle => {
                guard.state = WorkerState::InUse;
                guard.leased = false;
                self.wakeup.notify_one();
                Ok(())
            }
            WorkerState::Teardown => Err(OffloadError::pool_shutdown(self.name.as_str())),
            busy => {
                let err = OffloadError::double_activation(self.id, busy.as_str());
                warn!("{}", err);
                Err(err)
            }
        }
    }

    /// Claim the worker for a `pull()`. Fails on anything but an unleased
    /// idle worker, which lets the pool skip stale idle-set entries.
    pub(crate) fn mark_leased(&self) -> bool {
        let mut guard = self.handoff.lock();
        if guard.state == WorkerState::Idle && !guard.leased {
            guard.leased = true;
            true
        } else {
            false
        }
    }

    /// Drop the lease without activating. Returns whether the worker is
    /// still idle and should be re-offered to the pool.
    pub(crate) fn clear_lease_if_unactivated(&self) -> bool {
        let mut guard = self.handoff.lock();
        if !guard.leased {
            return false;
        }
        guard.leased = false;
        guard.state == WorkerState::Idle
    }

    /// Tear the worker down if it is idle; `Teardown` is unreachable from
    /// any other state. Pending payload and callback are dropped.
    pub(crate) fn request_teardown_if_idle(&self) -> bool {
        let mut guard = self.handoff.lock();
        if guard.state == WorkerState::Idle {
            guard.state = WorkerState::Teardown;
            guard.safe_data = None;
            guard.callback = None;
            self.wakeup.notify_one();
            true
        } else {
            false
        }
    }

    /// Take the thread handle, leaving the worker joinable exactly once.
    pub(crate) fn take_thread(&self) -> Option<thread::JoinHandle<()>> {
        self.thread.lock().take()
    }

    /// Join the worker thread, blocking until it exits.
    pub(crate) fn join_thread(&self) -> Result<()> {
        if let Some(handle) = self.take_thread() {
            handle
                .join()
                .map_err(|_| OffloadError::join(self.name.as_str(), "worker thread panicked"))?;
        }
        Ok(())
    }

    /// Wait up to `timeout` for the thread to finish, then join it.
    /// Returns `false` if the thread is still running when time runs out.
    pub(crate) fn join_thread_timeout(&self, timeout: Duration) -> bool {
        let Some(handle) = self.take_thread() else {
            return true;
        };
        let start = std::time::Instant::now();
        while !handle.is_finished() {
            if start.elapsed() >= timeout {
                warn!(
                    "worker #{} did not finish within {:?}; thread may be leaked",
                    self.id, timeout
                );
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
        if handle.join().is_err() {
            error!("worker #{} panicked during shutdown", self.id);
        }
        true
    }

    /// Main worker loop.
    ///
    /// Parks until activated, runs the callback, resets, and offers itself
    /// back to the pool. Exits on teardown or when the pool is gone.
    fn run(worker: Arc<ReturnableWorker>) {
        debug!("worker #{} online", worker.id);

        loop {
            let (callback, data) = {
                let mut guard = worker.handoff.lock();
                while guard.state != WorkerState::InUse && guard.state != WorkerState::Teardown {
                    worker.wakeup.wait(&mut guard);
                }
                if guard.state == WorkerState::Teardown {
                    break;
                }
                (guard.callback.take(), guard.safe_data.take())
            };

            worker.safe_run(callback, data);

            // Reset: both slots are clear before the worker is visible as
            // idle again.
            {
                let mut guard = worker.handoff.lock();
                guard.state = WorkerState::Resetting;
                guard.safe_data = None;
                guard.callback = None;
                guard.state = WorkerState::Idle;
            }

            let Some(pool) = worker.owner.upgrade() else {
                worker.handoff.lock().state = WorkerState::Teardown;
                break;
            };
            if pool.worker_returned(&worker) == ReturnDisposition::Retire {
                worker.handoff.lock().state = WorkerState::Teardown;
                break;
            }
        }

        debug!("worker #{} retiring", worker.id);
    }

    /// Run one activation with panic protection.
    fn safe_run(&self, callback: Option<SafeRunFn>, data: Option<SafeData>) {
        match callback {
            Some(callback) => {
                self.counters.increment_activations();
                if let Err(panic_info) = catch_unwind(AssertUnwindSafe(|| callback(data))) {
                    let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    error!("worker #{}: callback panicked: {}", self.id, panic_msg);
                    self.counters.increment_panics();
                }
            }
            None => {
                // The payload is dropped so an empty run cannot leave a
                // stale value behind.
                drop(data);
                error!("{}", OffloadError::no_callback(self.id));
                self.counters.increment_empty_runs();
            }
        }
    }
}

impl fmt::Debug for ReturnableWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ReturnableWorker");
        d.field("id", &self.id).field("name", &self.name);
        match self.handoff.try_lock() {
            Some(guard) => d.field("state", &guard.state),
            None => d.field("state", &"<contended>"),
        };
        d.finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::payload::{downcast_safe_data, safe_data};
    use std::sync::mpsc;

    // With no live pool behind the weak owner, a worker runs exactly one
    // activation and then retires, which keeps these tests self-contained.
    fn lone_worker(id: usize) -> Arc<ReturnableWorker> {
        ReturnableWorker::spawn(id, format!("test-worker-{}", id), Weak::new())
            .expect("failed to spawn worker")
    }

    #[test]
    fn test_activation_runs_callback_with_payload() {
        let worker = lone_worker(0);
        assert_eq!(worker.state(), WorkerState::Idle);

        let (tx, rx) = mpsc::channel();
        worker.set_safe_data(safe_data(21u32));
        worker.connect_safe_run(move |data| {
            let value: u32 = downcast_safe_data(data.expect("payload missing")).unwrap();
            tx.send(value * 2).unwrap();
        });
        worker.activate().expect("activation failed");

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        worker.join_thread().unwrap();

        assert_eq!(worker.state(), WorkerState::Teardown);
        assert!(!worker.has_safe_data());
        assert_eq!(worker.counters().get_activations(), 1);
    }

    #[test]
    fn test_double_activation_fails_fast() {
        let worker = lone_worker(1);

        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        worker.connect_safe_run(move |_| {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        });
        worker.activate().unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let err = worker.activate().unwrap_err();
        assert!(matches!(err, OffloadError::DoubleActivation { worker_id: 1, .. }));

        release_tx.send(()).unwrap();
        worker.join_thread().unwrap();
        assert_eq!(worker.counters().get_activations(), 1);
    }

    #[test]
    fn test_activation_without_callback_returns_to_idle() {
        let worker = lone_worker(2);

        worker.set_safe_data(safe_data("orphaned payload"));
        worker.activate().unwrap();
        worker.join_thread().unwrap();

        assert!(!worker.has_safe_data());
        assert_eq!(worker.counters().get_empty_runs(), 1);
        assert_eq!(worker.counters().get_activations(), 0);
    }

    #[test]
    fn test_disconnect_clears_registration() {
        let worker = lone_worker(3);

        worker.connect_safe_run(|_| panic!("must never run"));
        worker.disconnect_safe_run();
        worker.activate().unwrap();
        worker.join_thread().unwrap();

        assert_eq!(worker.counters().get_empty_runs(), 1);
        assert_eq!(worker.counters().get_panics(), 0);
    }

    #[test]
    fn test_callback_panic_is_contained() {
        let worker = lone_worker(4);

        worker.connect_safe_run(|_| panic!("intentional panic for testing"));
        worker.activate().unwrap();
        worker.join_thread().unwrap();

        // The panic stayed on the worker thread and the reset still ran.
        assert_eq!(worker.counters().get_panics(), 1);
        assert!(!worker.has_safe_data());
        assert_eq!(worker.state(), WorkerState::Teardown);
    }

    #[test]
    fn test_teardown_only_from_idle() {
        let worker = lone_worker(5);

        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        worker.connect_safe_run(move |_| {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        });
        worker.activate().unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // Busy worker refuses teardown; it finishes its run first.
        assert!(!worker.request_teardown_if_idle());

        release_tx.send(()).unwrap();
        worker.join_thread().unwrap();
    }

    #[test]
    fn test_activate_after_teardown_reports_shutdown() {
        let worker = lone_worker(6);

        assert!(worker.request_teardown_if_idle());
        worker.join_thread().unwrap();

        let err = worker.activate().unwrap_err();
        assert!(matches!(err, OffloadError::PoolShutdown { .. }));
    }

    #[test]
    fn test_worker_state_labels() {
        assert_eq!(WorkerState::Idle.as_str(), "idle");
        assert_eq!(WorkerState::InUse.to_string(), "in-use");
        assert_eq!(WorkerState::Resetting.as_str(), "resetting");
        assert_eq!(WorkerState::Teardown.to_string(), "teardown");
    }
}
