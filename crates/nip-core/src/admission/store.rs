//! Filesystem layout of the admission store.
//!
//! One root directory with two subdirectories:
//!
//! ```text
//! <root>/slots/slot-<index>     holder records, index < max slots
//! <root>/tickets/ticket-<seq>   waiter records
//! ```
//!
//! Records are small JSON bodies. A record is claimed with `create_new`:
//! the existence of the file is the lock, the body is bookkeeping. A
//! crashed writer can leave an empty or truncated body behind, which is
//! why readers treat unparseable bodies as a separate case instead of an
//! error.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::error::GateError;
use super::ticket::{SlotRecord, TicketRecord};

pub struct GateStore {
    root: PathBuf,
    slots_dir: PathBuf,
    tickets_dir: PathBuf,
}

/// One holder file. `record` is `None` when the body did not parse.
pub struct SlotEntry {
    pub index: usize,
    pub record: Option<SlotRecord>,
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

/// One waiter file. The sequence comes from the file name, so ordering
/// survives an unreadable body.
pub struct TicketEntry {
    pub seq: u64,
    pub record: Option<TicketRecord>,
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

impl GateStore {
    /// Opens the store, creating the directory layout when missing. A
    /// layout that exists but cannot be used is reported as corrupt.
    pub fn open(root: &Path) -> Result<Self, GateError> {
        let store = Self {
            root: root.to_path_buf(),
            slots_dir: root.join("slots"),
            tickets_dir: root.join("tickets"),
        };
        for dir in [&store.slots_dir, &store.tickets_dir] {
            match fs::metadata(dir) {
                Ok(m) if m.is_dir() => {}
                Ok(_) => {
                    return Err(GateError::StoreCorrupt {
                        path: dir.clone(),
                        reason: "exists but is not a directory".to_string(),
                    });
                }
                Err(_) => {
                    fs::create_dir_all(dir).map_err(|e| GateError::StoreCorrupt {
                        path: dir.clone(),
                        reason: format!("cannot create: {e}"),
                    })?;
                }
            }
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot_path(&self, index: usize) -> PathBuf {
        self.slots_dir.join(format!("slot-{index}"))
    }

    fn ticket_path(&self, seq: u64) -> PathBuf {
        self.tickets_dir.join(format!("ticket-{seq}"))
    }

    /// All current holder files, unreadable bodies included.
    pub fn slots(&self) -> Result<Vec<SlotEntry>, GateError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.slots_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(index) = name
                .to_str()
                .and_then(|n| n.strip_prefix("slot-"))
                .and_then(|n| n.parse().ok())
            else {
                tracing::debug!("ignoring foreign file {:?} in slot store", name);
                continue;
            };
            out.push(SlotEntry {
                index,
                record: read_record(&entry.path()),
                modified: entry.metadata().ok().and_then(|m| m.modified().ok()),
                path: entry.path(),
            });
        }
        out.sort_by_key(|s| s.index);
        Ok(out)
    }

    /// All current waiter files, oldest sequence first.
    pub fn tickets(&self) -> Result<Vec<TicketEntry>, GateError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.tickets_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(seq) = name
                .to_str()
                .and_then(|n| n.strip_prefix("ticket-"))
                .and_then(|n| n.parse().ok())
            else {
                tracing::debug!("ignoring foreign file {:?} in ticket store", name);
                continue;
            };
            out.push(TicketEntry {
                seq,
                record: read_record(&entry.path()),
                modified: entry.metadata().ok().and_then(|m| m.modified().ok()),
                path: entry.path(),
            });
        }
        out.sort_by_key(|t| t.seq);
        Ok(out)
    }

    /// Highest sequence observed anywhere in the store, plus one. Racy by
    /// itself; callers claim the result with [`create_ticket`](Self::create_ticket)
    /// and rescan on collision.
    pub fn next_seq(&self) -> Result<u64, GateError> {
        let mut max_seq = 0u64;
        for t in self.tickets()? {
            max_seq = max_seq.max(t.seq);
        }
        for s in self.slots()? {
            if let Some(rec) = s.record {
                max_seq = max_seq.max(rec.seq);
            }
        }
        Ok(max_seq + 1)
    }

    /// Atomically creates the waiter file. `Ok(false)` when another writer
    /// claimed the sequence first.
    pub fn create_ticket(&self, record: &TicketRecord) -> Result<bool, GateError> {
        create_record(&self.ticket_path(record.seq), record)
    }

    /// Atomically claims a slot. `Ok(false)` when the slot is taken.
    pub fn try_claim_slot(&self, index: usize, record: &SlotRecord) -> Result<bool, GateError> {
        create_record(&self.slot_path(index), record)
    }

    pub fn remove_ticket(&self, seq: u64) -> Result<bool, GateError> {
        remove_if_present(&self.ticket_path(seq))
    }

    /// Removes the slot only while `seq` still holds it. `Ok(false)` when
    /// the slot is gone or was claimed by someone else in the meantime.
    pub fn release_slot(&self, index: usize, seq: u64) -> Result<bool, GateError> {
        let path = self.slot_path(index);
        let data = match fs::read(&path) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice::<SlotRecord>(&data) {
            Ok(rec) if rec.seq == seq => remove_if_present(&path),
            _ => Ok(false),
        }
    }

    /// Force-removes a holder file regardless of owner (stale reclamation).
    pub fn remove_slot_file(&self, index: usize) -> Result<bool, GateError> {
        remove_if_present(&self.slot_path(index))
    }

    /// Force-removes an arbitrary store file (grace-pruning of unreadable
    /// records).
    pub fn remove_file(&self, path: &Path) -> Result<bool, GateError> {
        remove_if_present(path)
    }

    /// Wipes every ticket and slot record.
    pub fn clear(&self) -> Result<(), GateError> {
        for s in self.slots()? {
            remove_if_present(&s.path)?;
        }
        for t in self.tickets()? {
            remove_if_present(&t.path)?;
        }
        Ok(())
    }
}

fn read_record<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let data = fs::read(path).ok()?;
    serde_json::from_slice(&data).ok()
}

fn create_record<T: serde::Serialize>(path: &Path, record: &T) -> Result<bool, GateError> {
    let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    let body = serde_json::to_vec(record)
        .map_err(|e| GateError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    file.write_all(&body)?;
    Ok(true)
}

fn remove_if_present(path: &Path) -> Result<bool, GateError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
