//! Worker pool and returnable worker implementations

pub mod returnable;
pub mod worker_pool;

pub use returnable::{ReturnableWorker, WorkerCounters, WorkerState};
pub use worker_pool::{
    PoolPhase, PoolStats, PoolStatsSnapshot, PulledWorker, WorkerPool, WorkerPoolConfig,
    DEFAULT_MAX_UNUSED_THREADS, DEFAULT_POLL_INTERVAL,
};
