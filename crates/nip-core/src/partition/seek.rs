//! Estimated cut placement: seek near a byte offset and snap to the
//! closest element boundary.
//!
//! For a P-way split of an N-byte file this reads P windows instead of the
//! whole file, which is the difference between seconds and minutes on a
//! multi-gigabyte dump. The price is approximate balance: cuts land where
//! boundaries happen to be, and two estimates can snap to the same
//! boundary.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::error::PartitionError;
use super::markers::DocShape;
use super::scan::ScanSummary;

/// An element boundary: an element close, optional whitespace, then an
/// element open. Returns the absolute offset of the open marker closest to
/// `estimate` within a window of `window` bytes centered on it, or `None`
/// when the window holds no boundary.
///
/// Only offsets strictly inside `(lo, hi)` qualify, so a snapped cut can
/// never produce an empty head or tail partition.
pub fn boundary_near(
    file: &mut fs::File,
    shape: &DocShape,
    estimate: u64,
    window: usize,
    lo: u64,
    hi: u64,
) -> Result<Option<u64>, PartitionError> {
    let half = (window as u64) / 2;
    let start = estimate.saturating_sub(half).max(lo);
    let end = estimate.saturating_add(half).min(hi);
    if start >= end {
        return Ok(None);
    }

    let len = (end - start) as usize;
    let mut buf = vec![0u8; len];
    file.seek(SeekFrom::Start(start))?;
    read_fully(file, &mut buf)?;

    let close = &shape.element_close[..];
    let open = &shape.element_open[..];
    let mut best: Option<u64> = None;
    let mut pos = 0usize;
    while pos + close.len() <= buf.len() {
        if &buf[pos..pos + close.len()] != close {
            pos += 1;
            continue;
        }
        let mut cursor = pos + close.len();
        while cursor < buf.len() && buf[cursor].is_ascii_whitespace() {
            cursor += 1;
        }
        if cursor + open.len() <= buf.len() && &buf[cursor..cursor + open.len()] == open {
            let candidate = start + cursor as u64;
            if candidate > lo && candidate < hi {
                let better = match best {
                    None => true,
                    Some(b) => candidate.abs_diff(estimate) < b.abs_diff(estimate),
                };
                if better {
                    best = Some(candidate);
                }
            }
        }
        pos += 1;
    }
    Ok(best)
}

/// Snapped cut offsets for a P-way split, or `None` when any window came up
/// empty (the caller falls back to exact sequential cuts). Estimates that
/// snap to the same boundary are collapsed, so the result can be shorter
/// than `parts - 1`.
pub fn seek_cuts(
    input: &Path,
    shape: &DocShape,
    summary: &ScanSummary,
    parts: usize,
    window: usize,
) -> Result<Option<Vec<u64>>, PartitionError> {
    let (Some(lo), Some(hi)) = (summary.first_open, summary.last_close_end) else {
        return Ok(Some(Vec::new()));
    };

    let mut file = fs::File::open(input)?;
    let mut snapped = Vec::with_capacity(parts.saturating_sub(1));
    for i in 1..parts {
        let estimate =
            ((summary.file_len as u128 * i as u128) / parts as u128) as u64;
        match boundary_near(&mut file, shape, estimate, window, lo, hi)? {
            Some(cut) => snapped.push(cut),
            None => {
                tracing::warn!(
                    "no element boundary within {} bytes of offset {}",
                    window,
                    estimate
                );
                return Ok(None);
            }
        }
    }

    snapped.sort_unstable();
    let mut cuts: Vec<u64> = Vec::with_capacity(snapped.len());
    for cut in snapped {
        if cuts.last() != Some(&cut) {
            cuts.push(cut);
        }
    }
    Ok(Some(cuts))
}

fn read_fully(file: &mut fs::File, buf: &mut [u8]) -> std::io::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    // A short read can only happen when the file shrank under us; the
    // zeroed tail holds no marker bytes, so scanning it is harmless.
    Ok(())
}
