//! Convenient re-exports for common types and traits

pub use crate::core::{
    downcast_safe_data, safe_data, OffloadError, Result, SafeData, SafeRunFn, ThreadNode,
};
pub use crate::poller::{FdPoller, FdPollerConfig, PollerPhase, Readiness};
pub use crate::pool::{
    PoolPhase, PulledWorker, ReturnableWorker, WorkerPool, WorkerPoolConfig, WorkerState,
};
