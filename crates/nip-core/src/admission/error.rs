use std::path::PathBuf;
use std::time::Duration;

/// Admission failures. `AcquireTimeout` is recoverable (the caller can
/// retry or record the item as failed); `StoreCorrupt` is fatal and must
/// never be retried.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("timed out waiting for an admission slot after {waited:.1?}")]
    AcquireTimeout { waited: Duration },

    #[error("admission store {path} is corrupt: {reason}")]
    StoreCorrupt { path: PathBuf, reason: String },

    #[error("admission interrupted by stop request")]
    Interrupted,

    #[error("admission store I/O: {0}")]
    Io(#[from] std::io::Error),
}
