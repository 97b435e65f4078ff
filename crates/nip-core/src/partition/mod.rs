//! Splitting one large notes dump into independently loadable partitions.
//!
//! Partitioning works on literal byte markers, not parsed XML. A census
//! pass counts every element first; cut offsets are then placed either by
//! walking the document again (sequential, exact) or by seeking to
//! size-based estimates and snapping to a nearby boundary (offset-seek,
//! one pass less over large files). Every output file carries the shared
//! prologue and epilogue, and the per-file element counts must add up to
//! the census before a run is declared good. Offset-seek gets one retry as
//! sequential when that check fails; sequential failures surface.

mod error;
mod markers;
mod plan;
mod repair;
mod scan;
mod seek;
mod sequential;
mod verify;
mod write;

pub use error::PartitionError;
pub use markers::DocShape;
pub use plan::{PartitionRequest, SplitTuning, Strategy};
pub use repair::{best_effort_repair, RepairError, RepairReport};
pub use scan::{scan_file, ScanSummary};
pub use write::PartitionFile;

use std::fs;
use std::path::Path;

use crate::control::StopSignal;

/// Outcome of a completed partition run.
#[derive(Debug, Clone)]
pub struct PartitionReport {
    /// Elements found by the census pass.
    pub element_count: u64,
    /// Written files, in document order.
    pub partitions: Vec<PartitionFile>,
    pub strategy: Strategy,
    /// True when offset-seek was tried and the run finished on sequential
    /// cuts instead.
    pub fell_back: bool,
}

/// Splits `input` into partition files under `out_dir`.
///
/// Arguments are checked before any I/O on the document, the census and
/// integrity check run before any output is written, and failed runs leave
/// no partition files behind.
pub fn partition_file(
    input: &Path,
    out_dir: &Path,
    request: &PartitionRequest,
    shape: &DocShape,
    tuning: &SplitTuning,
    stop: &StopSignal,
) -> Result<PartitionReport, PartitionError> {
    shape.validate().map_err(PartitionError::InvalidRequest)?;

    let meta = fs::metadata(input).map_err(|e| PartitionError::InputInvalid {
        path: input.to_path_buf(),
        source: e,
    })?;
    if !meta.is_file() {
        return Err(PartitionError::InputInvalid {
            path: input.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
        });
    }
    request.target_parts(meta.len())?;
    prepare_out_dir(out_dir)?;
    if stop.is_stopped() {
        return Err(PartitionError::Interrupted);
    }

    let summary = scan_file(input, shape)?;
    summary.check_integrity()?;

    if summary.element_count == 0 {
        tracing::info!("{} holds no elements, nothing to split", input.display());
        return Ok(PartitionReport {
            element_count: 0,
            partitions: Vec::new(),
            strategy: Strategy::Sequential,
            fell_back: false,
        });
    }

    let built = plan::build_plan(input, &summary, request, shape, tuning)?;
    let files = write::write_partitions(input, out_dir, &built, shape, stop)?;
    verify_or_redo(input, out_dir, &summary, request, shape, stop, built, files)
}

/// Count verification with the offset-seek escape hatch: a mismatched
/// offset-seek run is thrown away and redone with exact sequential cuts.
/// A mismatch on sequential cuts has no second strategy to try.
fn verify_or_redo(
    input: &Path,
    out_dir: &Path,
    summary: &ScanSummary,
    request: &PartitionRequest,
    shape: &DocShape,
    stop: &StopSignal,
    built: plan::PartitionPlan,
    files: Vec<PartitionFile>,
) -> Result<PartitionReport, PartitionError> {
    match verify::verify_counts(built.expected_elements, &files) {
        Ok(()) => Ok(PartitionReport {
            element_count: summary.element_count,
            partitions: files,
            strategy: built.strategy,
            fell_back: built.fell_back,
        }),
        Err(mismatch) if built.strategy == Strategy::OffsetSeek => {
            tracing::warn!(
                "offset-seek split of {} failed verification ({}), redoing with sequential cuts",
                input.display(),
                mismatch
            );
            write::remove_partitions(&files);
            let parts = plan::resolve_parts(summary, request)?;
            let redo = plan::sequential_plan(input, summary, parts, shape)?;
            let redo_files = write::write_partitions(input, out_dir, &redo, shape, stop)?;
            match verify::verify_counts(redo.expected_elements, &redo_files) {
                Ok(()) => Ok(PartitionReport {
                    element_count: summary.element_count,
                    partitions: redo_files,
                    strategy: Strategy::Sequential,
                    fell_back: true,
                }),
                Err(second) => {
                    write::remove_partitions(&redo_files);
                    Err(second)
                }
            }
        }
        Err(mismatch) => {
            write::remove_partitions(&files);
            Err(mismatch)
        }
    }
}

fn prepare_out_dir(out_dir: &Path) -> Result<(), PartitionError> {
    fs::create_dir_all(out_dir).map_err(|e| PartitionError::OutputDirInvalid {
        path: out_dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    let probe = out_dir.join(".write-probe");
    match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&probe)
    {
        Ok(_) => {
            let _ = fs::remove_file(&probe);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            let _ = fs::remove_file(&probe);
            Ok(())
        }
        Err(e) => Err(PartitionError::OutputDirInvalid {
            path: out_dir.to_path_buf(),
            reason: format!("not writable: {e}"),
        }),
    }
}
