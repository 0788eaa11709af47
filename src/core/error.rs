//! Error types for the offload scheduler

use std::os::unix::io::RawFd;

/// Result type for offload scheduler operations
pub type Result<T> = std::result::Result<T, OffloadError>;

/// Errors that can occur in the offload scheduler
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum OffloadError {
    /// Pool or poller has been asked to stop; the operation is refused
    #[error("'{name}' is shut down; operation refused")]
    PoolShutdown {
        /// Name of the pool or poller
        name: String,
    },

    /// Component was started a second time
    #[error("'{name}' is already running")]
    AlreadyRunning {
        /// Name of the pool or poller
        name: String,
    },

    /// Operation requires a running component
    #[error("'{name}' is not running")]
    NotRunning {
        /// Name of the pool or poller
        name: String,
    },

    /// Attempt to activate a worker that is not idle
    #[error("worker #{worker_id} is busy ({state}); concurrent activation refused")]
    DoubleActivation {
        /// ID of the worker
        worker_id: usize,
        /// State the worker was observed in
        state: &'static str,
    },

    /// Worker was activated with no callback registered
    #[error("worker #{worker_id} activated with no callback registered")]
    NoCallbackConfigured {
        /// ID of the worker
        worker_id: usize,
    },

    /// Failed to spawn an OS thread
    #[error("failed to spawn thread '{name}': {message}")]
    SpawnFailed {
        /// Name the thread would have carried
        name: String,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to join an OS thread
    #[error("failed to join thread '{name}': {message}")]
    JoinFailed {
        /// Name of the thread
        name: String,
        /// Error message
        message: String,
    },

    /// Interrupted poll wait; retried automatically by the poll loop
    #[error("poll interrupted (errno {errno}); retrying")]
    PollTransient {
        /// OS errno reported by the poll primitive
        errno: i32,
    },

    /// Descriptor is unusable; its registration is dropped
    #[error("descriptor {fd} unusable: {detail}; dropping registration")]
    PollPersistent {
        /// The affected file descriptor
        fd: RawFd,
        /// Why the descriptor was dropped
        detail: String,
    },

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },
}

impl OffloadError {
    /// Create a pool shutdown error
    pub fn pool_shutdown(name: impl Into<String>) -> Self {
        OffloadError::PoolShutdown { name: name.into() }
    }

    /// Create an already running error
    pub fn already_running(name: impl Into<String>) -> Self {
        OffloadError::AlreadyRunning { name: name.into() }
    }

    /// Create a not running error
    pub fn not_running(name: impl Into<String>) -> Self {
        OffloadError::NotRunning { name: name.into() }
    }

    /// Create a double activation error
    pub fn double_activation(worker_id: usize, state: &'static str) -> Self {
        OffloadError::DoubleActivation { worker_id, state }
    }

    /// Create a no-callback-configured error
    pub fn no_callback(worker_id: usize) -> Self {
        OffloadError::NoCallbackConfigured { worker_id }
    }

    /// Create a spawn error
    pub fn spawn(name: impl Into<String>, message: impl Into<String>) -> Self {
        OffloadError::SpawnFailed {
            name: name.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        name: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        OffloadError::SpawnFailed {
            name: name.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a join error
    pub fn join(name: impl Into<String>, message: impl Into<String>) -> Self {
        OffloadError::JoinFailed {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a transient poll error
    pub fn poll_transient(errno: i32) -> Self {
        OffloadError::PollTransient { errno }
    }

    /// Create a persistent poll error
    pub fn poll_persistent(fd: RawFd, detail: impl Into<String>) -> Self {
        OffloadError::PollPersistent {
            fd,
            detail: detail.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        OffloadError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = OffloadError::pool_shutdown("main_pool");
        assert!(matches!(err, OffloadError::PoolShutdown { .. }));

        let err = OffloadError::double_activation(3, "in-use");
        assert!(matches!(err, OffloadError::DoubleActivation { .. }));

        let err = OffloadError::poll_persistent(7, "invalid descriptor");
        assert!(matches!(err, OffloadError::PollPersistent { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = OffloadError::pool_shutdown("worker_pool");
        assert_eq!(err.to_string(), "'worker_pool' is shut down; operation refused");

        let err = OffloadError::double_activation(2, "in-use");
        assert_eq!(
            err.to_string(),
            "worker #2 is busy (in-use); concurrent activation refused"
        );

        let err = OffloadError::no_callback(5);
        assert_eq!(
            err.to_string(),
            "worker #5 activated with no callback registered"
        );

        let err = OffloadError::poll_transient(4);
        assert_eq!(err.to_string(), "poll interrupted (errno 4); retrying");
    }

    #[test]
    fn test_spawn_error_with_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = OffloadError::spawn_with_source("offload-worker-5", "cannot create thread", io_err);

        assert!(matches!(err, OffloadError::SpawnFailed { .. }));
        assert!(err.to_string().contains("offload-worker-5"));
    }

    #[test]
    fn test_invalid_config_display() {
        let err = OffloadError::invalid_config("max_threads", "must be greater than 0");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for 'max_threads': must be greater than 0"
        );
    }
}
