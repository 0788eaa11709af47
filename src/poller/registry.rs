//! Registration table for polled descriptors
//!
//! One [`FdRegistry`] lives under the poller's registration guard. It keeps
//! the registrations in insertion order next to a prebuilt `pollfd` snapshot,
//! so the poll loop copies the snapshot out instead of rebuilding it every
//! tick. The in-flight marker lets `remove()` wait out a dispatch that is
//! already running for the descriptor being removed.

use crate::poller::readiness::Readiness;
use std::os::unix::io::RawFd;
use std::sync::Arc;
use std::thread::ThreadId;

/// Dispatch callback invoked on the poller thread when a registered
/// descriptor reports readiness.
pub type DispatchFn = dyn Fn(RawFd, Readiness) + Send + Sync;

/// Consecutive error-only wakes after which a registration is dropped.
pub(crate) const MAX_ERROR_STREAK: u32 = 3;

pub(crate) struct Registration {
    pub fd: RawFd,
    pub interest: Readiness,
    pub callback: Arc<DispatchFn>,
    /// Consecutive wakes that reported an error and no data.
    pub error_streak: u32,
}

/// The descriptor set and its `pollfd` snapshot, kept in lockstep.
pub(crate) struct FdRegistry {
    entries: Vec<Registration>,
    snapshot: Vec<libc::pollfd>,
    /// Descriptor currently being dispatched, with the dispatching thread.
    /// `remove()` for that descriptor waits until it clears, unless the
    /// remover is the dispatching thread itself.
    pub in_flight: Option<(RawFd, ThreadId)>,
}

impl FdRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            snapshot: Vec::new(),
            in_flight: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, fd: RawFd) -> bool {
        self.position(fd).is_some()
    }

    pub fn position(&self, fd: RawFd) -> Option<usize> {
        self.entries.iter().position(|entry| entry.fd == fd)
    }

    pub fn entry_mut(&mut self, fd: RawFd) -> Option<&mut Registration> {
        let position = self.position(fd)?;
        Some(&mut self.entries[position])
    }

    /// Register a descriptor. Returns `false` without touching anything if
    /// the descriptor is already registered.
    pub fn add(&mut self, fd: RawFd, interest: Readiness, callback: Arc<DispatchFn>) -> bool {
        if self.contains(fd) {
            return false;
        }
        self.entries.push(Registration {
            fd,
            interest,
            callback,
            error_streak: 0,
        });
        self.rebuild_snapshot();
        true
    }

    /// Drop a registration. Returns `false` if the descriptor was not
    /// registered.
    pub fn remove(&mut self, fd: RawFd) -> bool {
        let Some(position) = self.position(fd) else {
            return false;
        };
        self.entries.remove(position);
        self.rebuild_snapshot();
        true
    }

    /// Drop every registration.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.snapshot.clear();
    }

    /// Copy of the `pollfd` set for one `poll(2)` call, `revents` zeroed.
    pub fn snapshot(&self) -> Vec<libc::pollfd> {
        self.snapshot.clone()
    }

    fn rebuild_snapshot(&mut self) {
        self.snapshot.clear();
        self.snapshot.reserve(self.entries.len());
        for entry in &self.entries {
            self.snapshot.push(libc::pollfd {
                fd: entry.fd,
                events: entry.interest.interest_bits(),
                revents: 0,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_callback() -> Arc<DispatchFn> {
        Arc::new(|_, _| {})
    }

    #[test]
    fn test_add_remove_keeps_snapshot_in_lockstep() {
        let mut registry = FdRegistry::new();
        assert!(registry.is_empty());

        assert!(registry.add(3, Readiness::input(), noop_callback()));
        assert!(registry.add(7, Readiness::WRITABLE, noop_callback()));
        assert_eq!(registry.len(), 2);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].fd, 3);
        assert_eq!(snapshot[0].events, (Readiness::READABLE | Readiness::PRIORITY).bits());
        assert_eq!(snapshot[1].fd, 7);
        assert_eq!(snapshot[1].events, libc::POLLOUT);
        assert!(snapshot.iter().all(|pfd| pfd.revents == 0));

        assert!(registry.remove(3));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot()[0].fd, 7);
    }

    #[test]
    fn test_duplicate_add_is_refused() {
        let mut registry = FdRegistry::new();
        assert!(registry.add(5, Readiness::input(), noop_callback()));
        assert!(!registry.add(5, Readiness::WRITABLE, noop_callback()));
        assert_eq!(registry.len(), 1);
        // The original interest mask is untouched.
        assert_eq!(registry.snapshot()[0].events, Readiness::input().bits());
    }

    #[test]
    fn test_remove_absent_descriptor_is_a_no_op() {
        let mut registry = FdRegistry::new();
        assert!(!registry.remove(9));
        registry.add(1, Readiness::input(), noop_callback());
        assert!(!registry.remove(2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_error_streak_survives_lookups() {
        let mut registry = FdRegistry::new();
        registry.add(4, Readiness::input(), noop_callback());

        registry.entry_mut(4).unwrap().error_streak = 2;
        assert_eq!(registry.entry_mut(4).unwrap().error_streak, 2);
        assert!(registry.entry_mut(8).is_none());
    }
}
