//! Core types and traits for the offload scheduler

pub mod error;
pub mod node;
pub mod payload;

pub use error::{OffloadError, Result};
pub use node::ThreadNode;
pub use payload::{downcast_safe_data, safe_data, SafeData, SafeRunFn};
