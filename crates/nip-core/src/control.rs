//! Cooperative shutdown signal.
//!
//! One `StopSignal` is shared by everything a run starts: the fetch loop
//! checks it between attempts and between endpoints, the partitioner between
//! cuts, the orchestrator before admitting the next item. A blocking call
//! already in flight runs to its own timeout; the signal only stops work at
//! the next checkpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag. Cheap to clone; all clones observe the same request.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent; in-flight work stops at its next checkpoint.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// True once shutdown has been requested.
    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
