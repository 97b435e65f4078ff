//! Streaming marker scanning.
//!
//! Everything here reads fixed-size chunks and never holds more than one
//! chunk plus a marker-sized carry in memory, so multi-gigabyte documents
//! scan in constant space. A match spanning two chunks is found by carrying
//! the last `marker_len - 1` bytes of each chunk into the next round.

use std::fs;
use std::io::Read;
use std::path::Path;

use super::error::PartitionError;
use super::markers::DocShape;

pub(super) const CHUNK_SIZE: usize = 128 * 1024;

/// Incremental matcher for one marker. Feed contiguous chunks in order;
/// counts every occurrence and remembers the first and last match offsets.
pub struct MarkerTrack {
    needle: Vec<u8>,
    tail: Vec<u8>,
    count: u64,
    first: Option<u64>,
    last: Option<u64>,
}

impl MarkerTrack {
    pub fn new(needle: &[u8]) -> Self {
        Self {
            needle: needle.to_vec(),
            tail: Vec::new(),
            count: 0,
            first: None,
            last: None,
        }
    }

    /// Feeds the next chunk. `chunk_base` is the absolute offset of
    /// `chunk[0]`; chunks must be contiguous. `visit` receives the absolute
    /// offset of every match start, in order.
    pub fn push(&mut self, chunk: &[u8], chunk_base: u64, visit: &mut dyn FnMut(u64)) {
        if chunk.is_empty() {
            return;
        }
        let hay_base = chunk_base - self.tail.len() as u64;
        let mut hay = std::mem::take(&mut self.tail);
        hay.extend_from_slice(chunk);

        let len = self.needle.len();
        if hay.len() >= len {
            for (i, w) in hay.windows(len).enumerate() {
                if w == &self.needle[..] {
                    let offset = hay_base + i as u64;
                    self.count += 1;
                    if self.first.is_none() {
                        self.first = Some(offset);
                    }
                    self.last = Some(offset);
                    visit(offset);
                }
            }
        }

        // The carry is shorter than the marker, so a match can never be
        // counted twice across pushes.
        let keep = (len - 1).min(hay.len());
        self.tail = hay.split_off(hay.len() - keep);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn first(&self) -> Option<u64> {
        self.first
    }

    pub fn last(&self) -> Option<u64> {
        self.last
    }
}

/// Whole-file marker census from one sequential pass.
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub element_count: u64,
    pub close_count: u64,
    /// Offset of the first element open; everything before it is prologue.
    pub first_open: Option<u64>,
    pub last_open: Option<u64>,
    /// Offset just past the last element close; everything from here on is
    /// epilogue.
    pub last_close_end: Option<u64>,
    /// Offset of the last root close marker.
    pub root_close: Option<u64>,
    pub file_len: u64,
}

impl ScanSummary {
    /// Structural plausibility rules for a document that claims to contain
    /// elements. An empty document (no opens at all) is always consistent;
    /// the caller decides what to do with it.
    pub fn check_integrity(&self) -> Result<(), PartitionError> {
        if self.element_count == 0 {
            return Ok(());
        }
        let last_good_offset = self.last_close_end.unwrap_or(0);
        if self.close_count != self.element_count {
            return Err(PartitionError::CorruptInput {
                last_good_offset,
                reason: format!(
                    "{} element opens but {} closes",
                    self.element_count, self.close_count
                ),
            });
        }
        if let (Some(open), Some(close_end)) = (self.last_open, self.last_close_end) {
            if open >= close_end {
                return Err(PartitionError::CorruptInput {
                    last_good_offset,
                    reason: "dangling element open after the last close".to_string(),
                });
            }
        }
        match self.root_close {
            None => Err(PartitionError::CorruptInput {
                last_good_offset,
                reason: "missing root close marker".to_string(),
            }),
            Some(root) if root < last_good_offset => Err(PartitionError::CorruptInput {
                last_good_offset,
                reason: "root close marker before the last element".to_string(),
            }),
            Some(_) => Ok(()),
        }
    }
}

/// One sequential pass over the whole file, tracking all three markers.
pub fn scan_file(path: &Path, shape: &DocShape) -> Result<ScanSummary, PartitionError> {
    let mut file = fs::File::open(path)?;
    let mut opens = MarkerTrack::new(&shape.element_open);
    let mut closes = MarkerTrack::new(&shape.element_close);
    let mut roots = MarkerTrack::new(&shape.root_close);

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut offset = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        opens.push(&buf[..n], offset, &mut |_| {});
        closes.push(&buf[..n], offset, &mut |_| {});
        roots.push(&buf[..n], offset, &mut |_| {});
        offset += n as u64;
    }

    Ok(ScanSummary {
        element_count: opens.count(),
        close_count: closes.count(),
        first_open: opens.first(),
        last_open: opens.last(),
        last_close_end: closes.last().map(|o| o + shape.element_close.len() as u64),
        root_close: roots.last(),
        file_len: offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn match_spanning_pushes_is_counted_once() {
        let mut track = MarkerTrack::new(b"<note");
        let mut hits = Vec::new();
        track.push(b"xx<no", 0, &mut |o| hits.push(o));
        track.push(b"te id=1><note", 5, &mut |o| hits.push(o));
        assert_eq!(track.count(), 2);
        assert_eq!(hits, vec![2, 13]);
        assert_eq!(track.first(), Some(2));
        assert_eq!(track.last(), Some(13));
    }

    #[test]
    fn repeated_tiny_pushes_do_not_double_count() {
        let mut track = MarkerTrack::new(b"abab");
        for (i, b) in b"xababab".iter().enumerate() {
            track.push(&[*b], i as u64, &mut |_| {});
        }
        // "xababab" holds "abab" at offsets 1 and 3.
        assert_eq!(track.count(), 2);
    }

    #[test]
    fn summary_locates_prologue_and_epilogue() {
        let doc = "<?xml?>\n<osm-notes>\n<note a></note>\n<note b></note>\n</osm-notes>\n";
        let f = write_temp(doc);
        let s = scan_file(f.path(), &DocShape::default()).unwrap();

        assert_eq!(s.element_count, 2);
        assert_eq!(s.close_count, 2);
        assert_eq!(s.first_open, Some(doc.find("<note").unwrap() as u64));
        let last_close = doc.rfind("</note>").unwrap() as u64 + "</note>".len() as u64;
        assert_eq!(s.last_close_end, Some(last_close));
        assert_eq!(s.root_close, Some(doc.rfind("</osm-notes>").unwrap() as u64));
        assert_eq!(s.file_len, doc.len() as u64);
        assert!(s.check_integrity().is_ok());
    }

    #[test]
    fn dangling_open_is_corrupt() {
        let doc = "<osm-notes><note a></note><note trunc";
        let f = write_temp(doc);
        let s = scan_file(f.path(), &DocShape::default()).unwrap();
        match s.check_integrity() {
            Err(PartitionError::CorruptInput {
                last_good_offset, ..
            }) => {
                let expected = doc.find("</note>").unwrap() as u64 + "</note>".len() as u64;
                assert_eq!(last_good_offset, expected);
            }
            other => panic!("expected CorruptInput, got {other:?}"),
        }
    }

    #[test]
    fn missing_root_close_is_corrupt() {
        let doc = "<osm-notes><note a></note>\n";
        let f = write_temp(doc);
        let s = scan_file(f.path(), &DocShape::default()).unwrap();
        assert!(matches!(
            s.check_integrity(),
            Err(PartitionError::CorruptInput { .. })
        ));
    }

    #[test]
    fn empty_document_is_consistent() {
        let f = write_temp("");
        let s = scan_file(f.path(), &DocShape::default()).unwrap();
        assert_eq!(s.element_count, 0);
        assert!(s.check_integrity().is_ok());
    }
}
