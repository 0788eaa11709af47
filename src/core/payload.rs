//! Payload and callback types handed to returnable workers.
//!
//! A worker activation carries two values: the *safe data*, an opaque payload
//! the activator hands over for the exclusive duration of one run, and the
//! *safe-run callback*, the entry point the worker invokes on its own thread.
//! Both are plain owned values; nothing is shared between the activator and
//! the worker once the activation handoff completes.

use std::any::Any;

/// Opaque payload a worker borrows exclusively for one activation.
///
/// The pool and worker never look inside; the callback that receives it is
/// expected to know the concrete type and recover it with
/// [`downcast_safe_data`].
pub type SafeData = Box<dyn Any + Send>;

/// Callback invoked exactly once on the worker thread.
///
/// Receives the payload set by the activator, or `None` when the activator
/// configured no payload. The callback slot is cleared when the worker
/// resets, so each registration authorizes a single run.
pub type SafeRunFn = Box<dyn FnOnce(Option<SafeData>) + Send + 'static>;

/// Boxes a value as [`SafeData`].
///
/// # Examples
///
/// ```
/// use audio_offload::core::payload::{safe_data, downcast_safe_data};
///
/// let data = safe_data(vec![1u8, 2, 3]);
/// let bytes: Vec<u8> = downcast_safe_data(data).unwrap();
/// assert_eq!(bytes, vec![1, 2, 3]);
/// ```
pub fn safe_data<T: Any + Send>(value: T) -> SafeData {
    Box::new(value)
}

/// Recovers a typed value from [`SafeData`].
///
/// Returns `None` when the payload holds a different type.
pub fn downcast_safe_data<T: Any>(data: SafeData) -> Option<T> {
    data.downcast::<T>().ok().map(|boxed| *boxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_data_roundtrip() {
        let data = safe_data(42u32);
        assert_eq!(downcast_safe_data::<u32>(data), Some(42));
    }

    #[test]
    fn test_safe_data_wrong_type() {
        let data = safe_data("hello");
        assert_eq!(downcast_safe_data::<u32>(data), None);
    }

    #[test]
    fn test_safe_run_fn_is_boxable() {
        let ran = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = std::sync::Arc::clone(&ran);
        let callback: SafeRunFn = Box::new(move |data| {
            assert!(data.is_none());
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        });
        callback(None);
        assert!(ran.load(std::sync::atomic::Ordering::SeqCst));
    }
}
