//! Response validation.
//!
//! Rate-limited services fail in polite ways: HTTP 200 with an empty result
//! set, an HTML error page where JSON was expected, a truncated dump. A
//! validator inspects the downloaded artifact before the fetch counts as a
//! success; a rejected artifact is a failed attempt like any other.

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;

use crate::checksum;

type CheckFn = dyn Fn(&Path) -> Result<(), String> + Send + Sync;

/// Caller-supplied acceptance check for a downloaded artifact.
pub struct Validator {
    name: &'static str,
    check: Box<CheckFn>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator").field("name", &self.name).finish()
    }
}

impl Validator {
    /// Short name for log fields.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the check. `Err` carries a human-readable rejection reason.
    pub fn check(&self, path: &Path) -> Result<(), String> {
        (self.check)(path)
    }

    /// Accepts any file with at least one byte.
    pub fn non_empty_file() -> Self {
        Self {
            name: "non-empty",
            check: Box::new(|path| {
                let meta = fs::metadata(path).map_err(|e| format!("unreadable: {e}"))?;
                if meta.len() == 0 {
                    return Err("file is empty".to_string());
                }
                Ok(())
            }),
        }
    }

    /// Accepts a JSON document whose top level carries `key` with
    /// non-trivial content (a `"features": []` reply from a throttled API
    /// parses fine and is still useless).
    pub fn json_with_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            name: "json-key",
            check: Box::new(move |path| {
                let data =
                    fs::read_to_string(path).map_err(|e| format!("unreadable: {e}"))?;
                let value: serde_json::Value =
                    serde_json::from_str(&data).map_err(|e| format!("invalid JSON: {e}"))?;
                match value.get(&key) {
                    None => Err(format!("missing key {key:?}")),
                    Some(serde_json::Value::Null) => Err(format!("key {key:?} is null")),
                    Some(serde_json::Value::Array(a)) if a.is_empty() => {
                        Err(format!("key {key:?} is an empty array"))
                    }
                    Some(serde_json::Value::Object(m)) if m.is_empty() => {
                        Err(format!("key {key:?} is an empty object"))
                    }
                    Some(serde_json::Value::String(s)) if s.is_empty() => {
                        Err(format!("key {key:?} is an empty string"))
                    }
                    Some(_) => Ok(()),
                }
            }),
        }
    }

    /// Accepts a file that contains `marker` somewhere in its bytes.
    /// A cheap structural-plausibility check for large XML documents; full
    /// parsing of a multi-gigabyte dump is not worth it here.
    pub fn xml_with_marker(marker: impl Into<String>) -> Self {
        let marker = marker.into();
        Self {
            name: "xml-marker",
            check: Box::new(move |path| {
                match file_contains(path, marker.as_bytes()) {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(format!("marker {marker:?} not found")),
                    Err(e) => Err(format!("unreadable: {e}")),
                }
            }),
        }
    }

    /// Accepts a file whose SHA-256 matches `digest_hex` (case-insensitive).
    pub fn sha256_is(digest_hex: impl Into<String>) -> Self {
        let expected = digest_hex.into().trim().to_ascii_lowercase();
        Self {
            name: "sha256",
            check: Box::new(move |path| match checksum::verify_sha256(path, &expected) {
                Ok(true) => Ok(()),
                Ok(false) => Err(format!("sha256 mismatch (expected {expected})")),
                Err(e) => Err(format!("sha256 unreadable: {e}")),
            }),
        }
    }
}

/// Streaming substring search; needles spanning chunk boundaries are found
/// by carrying the last `needle.len() - 1` bytes between reads.
fn file_contains(path: &Path, needle: &[u8]) -> std::io::Result<bool> {
    if needle.is_empty() {
        return Ok(true);
    }
    let mut file = fs::File::open(path)?;
    let mut buf = vec![0u8; 64 * 1024];
    let mut carry: Vec<u8> = Vec::new();
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            return Ok(false);
        }
        let mut hay = std::mem::take(&mut carry);
        hay.extend_from_slice(&buf[..n]);
        if hay.windows(needle.len()).any(|w| w == needle) {
            return Ok(true);
        }
        let keep = (needle.len() - 1).min(hay.len());
        carry = hay.split_off(hay.len() - keep);
    }
}
