//! Append-only ledgers of work item identifiers.
//!
//! Several workers, possibly in different processes, append to the same
//! ledger while a batch runs. Every append is a single `O_APPEND` write of
//! one preformatted line; the file is never read back and rewritten, so
//! concurrent appends cannot tear or overwrite each other.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One identifier per line. The file is created on first append, so a
/// batch without failures leaves no failure ledger behind.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Ledger of items that finished cleanly for one batch category.
    pub fn success_for(dir: &Path, category: &str) -> Self {
        Self::new(dir.join(format!("{category}-succeeded.txt")))
    }

    /// Ledger of items that exhausted every endpoint and retry.
    pub fn failure_for(dir: &Path, category: &str) -> Self {
        Self::new(dir.join(format!("{category}-failed.txt")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one identifier as one line. `id` must not contain newlines;
    /// manifest identifiers never do.
    pub fn append(&self, id: &str) -> std::io::Result<()> {
        let mut line = String::with_capacity(id.len() + 1);
        line.push_str(id);
        line.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }

    /// All recorded identifiers, in append order. Missing file reads as
    /// empty, which is what a lazily created ledger means.
    pub fn read_ids(&self) -> std::io::Result<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}
