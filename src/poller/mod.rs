//! Fixed-tick descriptor polling

pub mod fd_poller;
pub mod readiness;
mod registry;

pub use fd_poller::{
    FdPoller, FdPollerConfig, PollerPhase, PollerStats, PollerStatsSnapshot,
    DEFAULT_RT_PRIORITY, DEFAULT_THROTTLE_AFTER, DEFAULT_TICK_INTERVAL,
};
pub use readiness::Readiness;
pub use registry::DispatchFn;
