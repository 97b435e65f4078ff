use std::path::PathBuf;

/// Partitioning failures. Configuration and input problems are detected
/// before any scanning starts; `CountMismatch` is an integrity failure
/// raised after outputs were written (and removed again).
#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    #[error("input file {path}: {source}")]
    InputInvalid {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("output directory {path}: {reason}")]
    OutputDirInvalid { path: PathBuf, reason: String },

    #[error("invalid partition request: {0}")]
    InvalidRequest(String),

    #[error("corrupt input after offset {last_good_offset}: {reason}")]
    CorruptInput { last_good_offset: u64, reason: String },

    #[error("element count mismatch: source has {expected}, partitions hold {actual}")]
    CountMismatch { expected: u64, actual: u64 },

    #[error("partitioning interrupted by stop request")]
    Interrupted,

    #[error("partition I/O: {0}")]
    Io(#[from] std::io::Error),
}
