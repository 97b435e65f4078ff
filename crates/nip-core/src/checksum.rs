//! Post-download checksum verification.
//!
//! Bulk dumps are verified after the transfer completes, never inline with
//! the download path. Reads in fixed chunks so multi-gigabyte files stay out
//! of memory.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const CHUNK: usize = 128 * 1024;

/// Compute the SHA-256 of a file as lowercase hex.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compare a file's SHA-256 against an expected lowercase/uppercase hex digest.
/// Returns Ok(true) on match, Ok(false) on mismatch.
pub fn verify_sha256(path: &Path, expected_hex: &str) -> Result<bool> {
    let actual = sha256_file(path)?;
    Ok(actual.eq_ignore_ascii_case(expected_hex.trim()))
}
