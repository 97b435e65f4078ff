//! Lossy salvage for dumps that fail the integrity check.
//!
//! Repair never runs as part of partitioning. It rewrites a damaged dump
//! into a fresh file holding the prologue, every complete element, and a
//! synthesized root close, dropping everything else. A close marker pairs
//! with the nearest open marker before it, so an element whose open was
//! interrupted mid-write is discarded rather than glued to stray bytes.

use std::fs;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::markers::DocShape;
use super::scan::CHUNK_SIZE;

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("repair refused: {0}")]
    InvalidTarget(String),
    #[error("nothing salvageable: {0}")]
    Unsalvageable(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What a repair run kept and discarded.
#[derive(Debug, Clone)]
pub struct RepairReport {
    pub salvaged_elements: u64,
    pub dropped_bytes: u64,
    pub output: PathBuf,
}

enum Event {
    Open(u64),
    Close(u64),
}

/// Streaming matcher for the open and close markers together. Unlike two
/// independent tracks, it reports matches of both markers in document
/// order, which the pairing below depends on. Positions within the last
/// `max_len - 1` bytes of the input seen so far are held back until more
/// bytes arrive or `finish` runs, so a marker spanning a chunk boundary is
/// still found exactly once.
struct PairScanner {
    open: Vec<u8>,
    close: Vec<u8>,
    max_len: usize,
    tail: Vec<u8>,
    /// Absolute offset of `tail[0]`.
    consumed: u64,
}

impl PairScanner {
    fn new(shape: &DocShape) -> Self {
        Self {
            open: shape.element_open.clone(),
            close: shape.element_close.clone(),
            max_len: shape.element_open.len().max(shape.element_close.len()),
            tail: Vec::new(),
            consumed: 0,
        }
    }

    fn push(&mut self, chunk: &[u8], visit: &mut dyn FnMut(Event)) {
        if chunk.is_empty() {
            return;
        }
        let hay_base = self.consumed;
        let mut hay = std::mem::take(&mut self.tail);
        hay.extend_from_slice(chunk);

        let scan_end = hay.len().saturating_sub(self.max_len - 1);
        for i in 0..scan_end {
            self.emit_at(&hay, i, hay_base, visit);
        }
        self.tail = hay.split_off(scan_end);
        self.consumed = hay_base + scan_end as u64;
    }

    fn finish(&mut self, visit: &mut dyn FnMut(Event)) {
        let tail = std::mem::take(&mut self.tail);
        for i in 0..tail.len() {
            self.emit_at(&tail, i, self.consumed, visit);
        }
    }

    fn emit_at(&self, hay: &[u8], i: usize, base: u64, visit: &mut dyn FnMut(Event)) {
        let rest = &hay[i..];
        if rest.starts_with(&self.open) {
            visit(Event::Open(base + i as u64));
        } else if rest.starts_with(&self.close) {
            visit(Event::Close(base + i as u64));
        }
    }
}

/// Pairing state plus the output side of the salvage. Events arrive in
/// document order; errors are parked in `err` so the scan loop can stop on
/// the next chunk boundary.
struct Salvage {
    src: fs::File,
    out: BufWriter<fs::File>,
    close_len: u64,
    scratch: Vec<u8>,
    pending_open: Option<u64>,
    prologue_len: Option<u64>,
    salvaged: u64,
    kept_bytes: u64,
    err: Option<std::io::Error>,
}

impl Salvage {
    fn on_event(&mut self, ev: Event) {
        if self.err.is_some() {
            return;
        }
        match ev {
            Event::Open(offset) => {
                if self.prologue_len.is_none() {
                    self.prologue_len = Some(offset);
                    if let Err(e) = self.copy(0, offset) {
                        self.err = Some(e);
                        return;
                    }
                }
                // A second open before any close replaces the first: the
                // earlier open never completed and its bytes are garbage.
                self.pending_open = Some(offset);
            }
            Event::Close(offset) => {
                if let Some(open) = self.pending_open.take() {
                    let end = offset + self.close_len;
                    match self.copy(open, end).and_then(|()| self.out.write_all(b"\n")) {
                        Ok(()) => {
                            self.salvaged += 1;
                            self.kept_bytes += end - open;
                        }
                        Err(e) => self.err = Some(e),
                    }
                }
            }
        }
    }

    fn copy(&mut self, start: u64, end: u64) -> std::io::Result<()> {
        self.src.seek(SeekFrom::Start(start))?;
        let mut remaining = end - start;
        while remaining > 0 {
            let want = remaining.min(self.scratch.len() as u64) as usize;
            let n = self.src.read(&mut self.scratch[..want])?;
            if n == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "source shrank during repair",
                ));
            }
            self.out.write_all(&self.scratch[..n])?;
            remaining -= n as u64;
        }
        Ok(())
    }
}

/// Rewrites `input` into `output`, keeping only the prologue and the
/// complete elements. Returns how much was kept and dropped; on any error
/// the partial output is removed.
pub fn best_effort_repair(
    input: &Path,
    output: &Path,
    shape: &DocShape,
) -> Result<RepairReport, RepairError> {
    shape.validate().map_err(RepairError::InvalidTarget)?;
    if input == output {
        return Err(RepairError::InvalidTarget(
            "output must be a different file from the damaged input".to_string(),
        ));
    }
    match salvage(input, output, shape) {
        Ok(report) => {
            tracing::info!(
                "repaired {} -> {}: kept {} elements, dropped {} bytes",
                input.display(),
                output.display(),
                report.salvaged_elements,
                report.dropped_bytes
            );
            Ok(report)
        }
        Err(e) => {
            let _ = fs::remove_file(output);
            Err(e)
        }
    }
}

fn salvage(input: &Path, output: &Path, shape: &DocShape) -> Result<RepairReport, RepairError> {
    let mut reader = fs::File::open(input)?;
    let mut state = Salvage {
        src: fs::File::open(input)?,
        out: BufWriter::new(fs::File::create(output)?),
        close_len: shape.element_close.len() as u64,
        scratch: vec![0u8; CHUNK_SIZE],
        pending_open: None,
        prologue_len: None,
        salvaged: 0,
        kept_bytes: 0,
        err: None,
    };

    let mut scanner = PairScanner::new(shape);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut file_len = 0u64;
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        scanner.push(&chunk[..n], &mut |ev| state.on_event(ev));
        file_len += n as u64;
        if let Some(e) = state.err.take() {
            return Err(e.into());
        }
    }
    scanner.finish(&mut |ev| state.on_event(ev));
    if let Some(e) = state.err.take() {
        return Err(e.into());
    }

    if state.salvaged == 0 {
        return Err(RepairError::Unsalvageable(
            "no complete element found".to_string(),
        ));
    }

    state.out.write_all(&shape.root_close)?;
    state.out.write_all(b"\n")?;
    state.out.flush()?;

    let prologue_len = state.prologue_len.unwrap_or(0);
    Ok(RepairReport {
        salvaged_elements: state.salvaged,
        dropped_bytes: file_len
            .saturating_sub(prologue_len)
            .saturating_sub(state.kept_bytes),
        output: output.to_path_buf(),
    })
}
