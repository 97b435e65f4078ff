//! Partition writing: prologue + element slice + epilogue per output file.

use std::fs;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::control::StopSignal;

use super::error::PartitionError;
use super::markers::DocShape;
use super::plan::PartitionPlan;
use super::scan::{MarkerTrack, CHUNK_SIZE};

/// One written partition.
#[derive(Debug, Clone)]
pub struct PartitionFile {
    pub path: PathBuf,
    /// Elements counted while the body was copied.
    pub elements: u64,
    pub bytes: u64,
}

pub(super) fn part_path(out_dir: &Path, index: usize) -> PathBuf {
    out_dir.join(format!("part-{index:05}.xml"))
}

/// Writes one file per body range of `plan`. Every output is
/// prologue + body + epilogue, so each is independently well-formed.
/// On any failure, including a stop request, the files written so far are
/// removed before the error is returned.
pub fn write_partitions(
    input: &Path,
    out_dir: &Path,
    plan: &PartitionPlan,
    shape: &DocShape,
    stop: &StopSignal,
) -> Result<Vec<PartitionFile>, PartitionError> {
    let mut source = fs::File::open(input)?;
    let prologue = read_range(&mut source, 0, plan.prologue_end)?;
    let epilogue = read_range(&mut source, plan.epilogue_start, plan.file_len)?;

    let mut bounds = Vec::with_capacity(plan.cuts.len() + 2);
    bounds.push(plan.prologue_end);
    bounds.extend_from_slice(&plan.cuts);
    bounds.push(plan.epilogue_start);

    let mut written: Vec<PartitionFile> = Vec::new();
    for (index, pair) in bounds.windows(2).enumerate() {
        if stop.is_stopped() {
            remove_partitions(&written);
            return Err(PartitionError::Interrupted);
        }
        match write_one(
            &mut source,
            out_dir,
            index,
            pair[0],
            pair[1],
            &prologue,
            &epilogue,
            shape,
        ) {
            Ok(file) => written.push(file),
            Err(e) => {
                let _ = fs::remove_file(part_path(out_dir, index));
                remove_partitions(&written);
                return Err(e);
            }
        }
    }
    Ok(written)
}

fn write_one(
    source: &mut fs::File,
    out_dir: &Path,
    index: usize,
    body_start: u64,
    body_end: u64,
    prologue: &[u8],
    epilogue: &[u8],
    shape: &DocShape,
) -> Result<PartitionFile, PartitionError> {
    let path = part_path(out_dir, index);
    let mut out = BufWriter::new(fs::File::create(&path)?);
    out.write_all(prologue)?;

    let mut counter = MarkerTrack::new(&shape.element_open);
    source.seek(SeekFrom::Start(body_start))?;
    let mut remaining = body_end.saturating_sub(body_start);
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut copied = 0u64;
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = source.read(&mut buf[..want])?;
        if n == 0 {
            return Err(PartitionError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "source truncated while copying a partition body",
            )));
        }
        counter.push(&buf[..n], copied, &mut |_| {});
        out.write_all(&buf[..n])?;
        copied += n as u64;
        remaining -= n as u64;
    }

    out.write_all(epilogue)?;
    out.flush()?;

    Ok(PartitionFile {
        path,
        elements: counter.count(),
        bytes: prologue.len() as u64 + copied + epilogue.len() as u64,
    })
}

/// Best-effort removal of written outputs (strategy fallback, stop, error).
pub fn remove_partitions(parts: &[PartitionFile]) {
    for part in parts {
        if let Err(e) = fs::remove_file(&part.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("could not remove {}: {}", part.path.display(), e);
            }
        }
    }
}

fn read_range(file: &mut fs::File, start: u64, end: u64) -> Result<Vec<u8>, PartitionError> {
    let len = end.saturating_sub(start) as usize;
    let mut buf = vec![0u8; len];
    if len > 0 {
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut buf)?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::plan::Strategy;
    use std::io::Write as _;

    #[test]
    fn bodies_get_prologue_and_epilogue() {
        let dir = tempfile::tempdir().unwrap();
        let doc = "<osm-notes>\n<note id=\"1\">first</note>\n<note id=\"2\">second</note>\n</osm-notes>\n";
        let input = dir.path().join("in.xml");
        fs::File::create(&input)
            .unwrap()
            .write_all(doc.as_bytes())
            .unwrap();

        let second_open = doc.rfind("<note").unwrap() as u64;
        let plan = PartitionPlan {
            strategy: Strategy::Sequential,
            cuts: vec![second_open],
            prologue_end: doc.find("<note").unwrap() as u64,
            epilogue_start: doc.rfind("</note>").unwrap() as u64 + "</note>".len() as u64,
            expected_elements: 2,
            file_len: doc.len() as u64,
            fell_back: false,
        };

        let out_dir = dir.path().join("parts");
        fs::create_dir_all(&out_dir).unwrap();
        let files = write_partitions(
            &input,
            &out_dir,
            &plan,
            &DocShape::default(),
            &StopSignal::new(),
        )
        .unwrap();

        assert_eq!(files.len(), 2);
        let first = fs::read_to_string(&files[0].path).unwrap();
        let second = fs::read_to_string(&files[1].path).unwrap();
        assert!(first.starts_with("<osm-notes>"));
        assert!(first.contains("first</note>"));
        assert!(first.ends_with("</osm-notes>\n"));
        assert!(second.contains("second</note>"));
        assert!(!second.contains("first</note>"));
        assert!(second.ends_with("</osm-notes>\n"));
        assert_eq!(files[0].elements, 1);
        assert_eq!(files[1].elements, 1);
    }

    #[test]
    fn stop_request_cleans_up_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let doc = "<osm-notes>\n<note id=\"1\">only</note>\n</osm-notes>\n";
        let input = dir.path().join("in.xml");
        fs::File::create(&input)
            .unwrap()
            .write_all(doc.as_bytes())
            .unwrap();

        let plan = PartitionPlan {
            strategy: Strategy::Sequential,
            cuts: Vec::new(),
            prologue_end: doc.find("<note").unwrap() as u64,
            epilogue_start: doc.find("</osm-notes>").unwrap() as u64,
            expected_elements: 1,
            file_len: doc.len() as u64,
            fell_back: false,
        };

        let stop = StopSignal::new();
        stop.request_stop();
        let err = write_partitions(&input, dir.path(), &plan, &DocShape::default(), &stop)
            .unwrap_err();
        assert!(matches!(err, PartitionError::Interrupted));
        assert!(!part_path(dir.path(), 0).exists());
    }
}
