//! Boundary contract with the host's thread tree.
//!
//! The audio host organizes its schedulable units (audio thread, exporter,
//! task runner, this crate's pool and poller) into a tree it starts, stops
//! and joins as a whole. This crate neither knows nor cares how that tree
//! ticks; it only implements the unit contract so the host can attach a
//! [`WorkerPool`] or [`FdPoller`] as a child of one of its own nodes.
//!
//! [`WorkerPool`]: crate::pool::WorkerPool
//! [`FdPoller`]: crate::poller::FdPoller

use std::sync::{Arc, Weak};

use crate::core::error::Result;

/// A schedulable unit with a position in the host's thread tree.
///
/// Implemented by [`WorkerPool`] and [`FdPoller`]; the host implements it for
/// its own nodes and hands a weak reference to [`set_parent`] when attaching
/// a unit as a child. Parents are held weakly: a unit never keeps its host
/// subtree alive.
///
/// # Examples
///
/// ```
/// use std::sync::{Arc, Weak};
/// use audio_offload::core::node::ThreadNode;
///
/// struct AudioRoot;
///
/// impl ThreadNode for AudioRoot {
///     fn name(&self) -> &str {
///         "audio-root"
///     }
///
///     fn start(&self) -> audio_offload::Result<()> {
///         Ok(())
///     }
///
///     fn stop(&self) {}
///
///     fn join(&self) -> audio_offload::Result<()> {
///         Ok(())
///     }
/// }
///
/// let root: Arc<dyn ThreadNode> = Arc::new(AudioRoot);
/// assert_eq!(root.name(), "audio-root");
/// ```
///
/// [`WorkerPool`]: crate::pool::WorkerPool
/// [`FdPoller`]: crate::poller::FdPoller
/// [`set_parent`]: ThreadNode::set_parent
pub trait ThreadNode: Send + Sync {
    /// Name of this unit, used for thread names and log output.
    fn name(&self) -> &str;

    /// Begins scheduling this unit.
    fn start(&self) -> Result<()>;

    /// Asks the unit to wind down.
    ///
    /// Returns once the request is recorded, not once the unit has exited;
    /// use [`join`](ThreadNode::join) to wait for that.
    fn stop(&self);

    /// Blocks until the unit's thread(s) have exited.
    fn join(&self) -> Result<()>;

    /// Parent node this unit is attached under, if any and still alive.
    fn parent(&self) -> Option<Arc<dyn ThreadNode>> {
        None
    }

    /// Records the parent node this unit is attached under.
    ///
    /// Default implementation discards the reference; units that report a
    /// parent override both this and [`parent`](ThreadNode::parent).
    fn set_parent(&self, parent: Weak<dyn ThreadNode>) {
        let _ = parent;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubNode {
        started: AtomicBool,
    }

    impl StubNode {
        fn new() -> Self {
            Self {
                started: AtomicBool::new(false),
            }
        }
    }

    impl ThreadNode for StubNode {
        fn name(&self) -> &str {
            "stub"
        }

        fn start(&self) -> Result<()> {
            self.started.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) {
            self.started.store(false, Ordering::SeqCst);
        }

        fn join(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_stub_node_lifecycle() {
        let node = StubNode::new();
        node.start().unwrap();
        assert!(node.started.load(Ordering::SeqCst));
        node.stop();
        node.join().unwrap();
        assert!(!node.started.load(Ordering::SeqCst));
    }

    #[test]
    fn test_default_parent_is_none() {
        let node: Arc<dyn ThreadNode> = Arc::new(StubNode::new());
        assert!(node.parent().is_none());

        let other: Arc<dyn ThreadNode> = Arc::new(StubNode::new());
        node.set_parent(Arc::downgrade(&other));
        assert!(node.parent().is_none());
    }
}
