//! # Audio Offload
//!
//! Realtime-safe background work scheduling for audio applications: a bounded
//! pool of returnable worker threads plus a fixed-tick descriptor poller.
//!
//! Audio render threads cannot afford to spawn threads, wait on unbounded
//! queues or block on device descriptors. This crate keeps that work off the
//! hot path:
//!
//! - **Worker Pool**: a warm set of idle threads between a soft floor and a
//!   hard ceiling; callers pull a worker, load it with a payload and a
//!   callback, and activate it
//! - **Returnable Workers**: one callback per activation, then the worker
//!   resets and hands itself back to the pool
//! - **Descriptor Poller**: one thread sweeping a dynamic descriptor set
//!   through `poll(2)` at a fixed tick, optionally elevated to `SCHED_FIFO`
//! - **Panic Isolation**: a panicking callback never takes down a worker
//!   thread or the poller loop
//! - **Graceful Shutdown**: busy workers finish their run, every thread is
//!   joined
//!
//! ## Quick Start
//!
//! ```rust
//! use audio_offload::prelude::*;
//!
//! # fn main() -> Result<()> {
//! // Create and start a pool: at most 4 workers, 2 kept warm.
//! let pool = WorkerPool::with_bounds(4, 2)?;
//! pool.start()?;
//!
//! // Hand work to pool workers.
//! for i in 0..4 {
//!     pool.dispatch(None, move |_| {
//!         println!("export slice {} rendered off the audio thread", i);
//!     })?;
//! }
//!
//! // Shutdown waits for running callbacks to complete.
//! pool.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## The Pull Protocol
//!
//! [`dispatch`] is a convenience around the underlying protocol: pull an
//! idle worker, set its payload, connect its callback, activate it.
//!
//! ```rust
//! use audio_offload::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let pool = WorkerPool::with_bounds(2, 1)?;
//! pool.start()?;
//!
//! let worker = pool.pull()?;
//! worker.set_safe_data(safe_data(440.0f64));
//! worker.connect_safe_run(|data| {
//!     let frequency: f64 = downcast_safe_data(data.unwrap()).unwrap();
//!     println!("rendering sine at {frequency} Hz");
//! });
//! worker.activate()?;
//!
//! pool.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Watching Device Descriptors
//!
//! ```rust,no_run
//! use audio_offload::prelude::*;
//!
//! # fn main() -> Result<()> {
//! # let device_fd = 0;
//! let poller = FdPoller::new()?;
//! poller.start()?;
//!
//! poller.add(device_fd, |fd, readiness| {
//!     if readiness.has_data() {
//!         // read from the device, kick the render loop, ...
//!     }
//!     if readiness.is_hangup() {
//!         println!("device on fd {fd} went away");
//!     }
//! })?;
//!
//! // ... the poller sweeps every 10 ms until stopped ...
//!
//! poller.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`dispatch`]: pool::WorkerPool::dispatch

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod poller;
pub mod pool;
pub mod prelude;

pub use core::{downcast_safe_data, safe_data, OffloadError, Result, SafeData, SafeRunFn, ThreadNode};
pub use poller::{FdPoller, FdPollerConfig, Readiness};
pub use pool::{PulledWorker, ReturnableWorker, WorkerPool, WorkerPoolConfig};
