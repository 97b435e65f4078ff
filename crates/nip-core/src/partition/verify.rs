use super::error::PartitionError;
use super::write::PartitionFile;

/// Checks that the elements counted across all written partitions add up to
/// the census taken before planning. A mismatch means a cut landed inside an
/// element and the outputs cannot be trusted.
pub fn verify_counts(expected: u64, parts: &[PartitionFile]) -> Result<(), PartitionError> {
    let actual: u64 = parts.iter().map(|p| p.elements).sum();
    if actual == expected {
        Ok(())
    } else {
        Err(PartitionError::CountMismatch { expected, actual })
    }
}
