//! Partition planning: how many parts, which strategy, where to cut.

use std::path::Path;

use super::error::PartitionError;
use super::markers::DocShape;
use super::scan::ScanSummary;
use super::{seek, sequential};

/// What the caller asked for: an explicit part count or a sizing hint.
/// Exactly one must be set.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionRequest {
    pub parts: Option<usize>,
    pub max_part_bytes: Option<u64>,
}

impl PartitionRequest {
    pub fn by_parts(parts: usize) -> Self {
        Self {
            parts: Some(parts),
            max_part_bytes: None,
        }
    }

    pub fn by_max_bytes(max_part_bytes: u64) -> Self {
        Self {
            parts: None,
            max_part_bytes: Some(max_part_bytes),
        }
    }

    /// Resolves the request against the file size. Rejected before any I/O:
    /// zero values, both knobs set, neither set.
    pub fn target_parts(&self, file_len: u64) -> Result<usize, PartitionError> {
        match (self.parts, self.max_part_bytes) {
            (Some(_), Some(_)) => Err(PartitionError::InvalidRequest(
                "part count and size hint are mutually exclusive".to_string(),
            )),
            (None, None) => Err(PartitionError::InvalidRequest(
                "either a part count or a size hint is required".to_string(),
            )),
            (Some(0), None) => Err(PartitionError::InvalidRequest(
                "part count must be positive".to_string(),
            )),
            (None, Some(0)) => Err(PartitionError::InvalidRequest(
                "size hint must be positive".to_string(),
            )),
            (Some(parts), None) => Ok(parts),
            (None, Some(max_bytes)) => {
                let parts = file_len.div_ceil(max_bytes).max(1);
                Ok(parts as usize)
            }
        }
    }
}

/// Cut placement strategy. Sequential walks the whole document and cuts on
/// exact element counts; offset-seek estimates cut offsets from the file
/// size and snaps each to a nearby boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Sequential,
    OffsetSeek,
}

/// Thresholds for choosing and running the offset-seek strategy.
#[derive(Debug, Clone, Copy)]
pub struct SplitTuning {
    /// Files at or above this size use offset-seek cut placement.
    pub seek_threshold_bytes: u64,
    /// Width of the window searched around each estimated cut.
    pub search_window_bytes: usize,
}

impl Default for SplitTuning {
    fn default() -> Self {
        Self {
            seek_threshold_bytes: 64 * 1024 * 1024,
            search_window_bytes: 1024 * 1024,
        }
    }
}

/// A fully resolved split: every field the writer needs, computed once.
#[derive(Debug, Clone)]
pub struct PartitionPlan {
    pub strategy: Strategy,
    /// Interior cut offsets, strictly increasing, each at an element open.
    /// `cuts.len() + 1` partitions are written.
    pub cuts: Vec<u64>,
    /// Everything before this offset is prologue, copied into every part.
    pub prologue_end: u64,
    /// Everything from this offset on is epilogue, copied into every part.
    pub epilogue_start: u64,
    /// Exact whole-file element count from the census pass; the written
    /// partitions must add up to this.
    pub expected_elements: u64,
    pub file_len: u64,
    /// True when offset-seek was abandoned for exact sequential cuts.
    pub fell_back: bool,
}

/// Caps the requested part count at the element count. A document never
/// splits into more partitions than it has elements.
pub(super) fn resolve_parts(
    summary: &ScanSummary,
    request: &PartitionRequest,
) -> Result<usize, PartitionError> {
    let target = request.target_parts(summary.file_len)?;
    Ok((target as u64).min(summary.element_count).max(1) as usize)
}

/// Builds the plan for a document that holds at least one element. Picks
/// offset-seek for large files and falls back to sequential cuts when a
/// seek window finds no boundary.
pub fn build_plan(
    input: &Path,
    summary: &ScanSummary,
    request: &PartitionRequest,
    shape: &DocShape,
    tuning: &SplitTuning,
) -> Result<PartitionPlan, PartitionError> {
    let parts = resolve_parts(summary, request)?;

    if parts > 1 && summary.file_len >= tuning.seek_threshold_bytes {
        match seek::seek_cuts(input, shape, summary, parts, tuning.search_window_bytes)? {
            Some(cuts) => {
                return Ok(assemble(summary, Strategy::OffsetSeek, cuts, false));
            }
            None => {
                tracing::warn!(
                    "offset-seek found no usable boundary; using sequential cuts for {}",
                    input.display()
                );
                let plan = sequential_plan(input, summary, parts, shape)?;
                return Ok(PartitionPlan {
                    fell_back: true,
                    ..plan
                });
            }
        }
    }

    sequential_plan(input, summary, parts, shape)
}

/// Exact-count plan, also used to redo a split whose offset-seek outputs
/// failed verification.
pub fn sequential_plan(
    input: &Path,
    summary: &ScanSummary,
    parts: usize,
    shape: &DocShape,
) -> Result<PartitionPlan, PartitionError> {
    let cuts = if parts > 1 {
        let stride = summary.element_count.div_ceil(parts as u64);
        sequential::cut_offsets(input, shape, stride)?
    } else {
        Vec::new()
    };
    Ok(assemble(summary, Strategy::Sequential, cuts, false))
}

fn assemble(
    summary: &ScanSummary,
    strategy: Strategy,
    cuts: Vec<u64>,
    fell_back: bool,
) -> PartitionPlan {
    PartitionPlan {
        strategy,
        cuts,
        prologue_end: summary.first_open.unwrap_or(0),
        epilogue_start: summary.last_close_end.unwrap_or(summary.file_len),
        expected_elements: summary.element_count,
        file_len: summary.file_len,
        fell_back,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_validation() {
        let both = PartitionRequest {
            parts: Some(4),
            max_part_bytes: Some(1024),
        };
        assert!(both.target_parts(100).is_err());
        assert!(PartitionRequest::default().target_parts(100).is_err());
        assert!(PartitionRequest::by_parts(0).target_parts(100).is_err());
        assert!(PartitionRequest::by_max_bytes(0).target_parts(100).is_err());
    }

    #[test]
    fn size_hint_rounds_up() {
        assert_eq!(
            PartitionRequest::by_max_bytes(100).target_parts(250).unwrap(),
            3
        );
        assert_eq!(
            PartitionRequest::by_max_bytes(100).target_parts(300).unwrap(),
            3
        );
        assert_eq!(
            PartitionRequest::by_max_bytes(1024).target_parts(0).unwrap(),
            1
        );
    }

    #[test]
    fn explicit_parts_pass_through() {
        assert_eq!(PartitionRequest::by_parts(7).target_parts(10).unwrap(), 7);
    }
}
