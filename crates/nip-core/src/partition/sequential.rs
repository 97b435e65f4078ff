//! Exact cut placement: walk the document and cut on element counts.

use std::fs;
use std::io::Read;
use std::path::Path;

use super::error::PartitionError;
use super::markers::DocShape;
use super::scan::{MarkerTrack, CHUNK_SIZE};

/// Offsets of every `stride`-th element open (element indices `stride`,
/// `2*stride`, ...), from one streaming pass. With `stride = ceil(E/P)`
/// these are the cut points that give every partition `stride` elements
/// except a shorter last one.
pub fn cut_offsets(
    input: &Path,
    shape: &DocShape,
    stride: u64,
) -> Result<Vec<u64>, PartitionError> {
    if stride == 0 {
        return Err(PartitionError::InvalidRequest(
            "cut stride must be positive".to_string(),
        ));
    }

    let mut file = fs::File::open(input)?;
    let mut opens = MarkerTrack::new(&shape.element_open);
    let mut cuts = Vec::new();
    let mut index = 0u64;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut offset = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        opens.push(&buf[..n], offset, &mut |open_offset| {
            if index > 0 && index % stride == 0 {
                cuts.push(open_offset);
            }
            index += 1;
        });
        offset += n as u64;
    }

    Ok(cuts)
}
