use serde::{Deserialize, Serialize};

/// Waiter record, persisted as `tickets/ticket-<seq>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRecord {
    pub seq: u64,
    pub pid: u32,
    pub created_at_unix: u64,
}

/// Holder record, persisted as `slots/slot-<index>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRecord {
    pub seq: u64,
    pub pid: u32,
    pub acquired_at_unix: u64,
}

/// Proof that one admission slot is held. Hand it back via
/// [`AdmissionQueue::release`](super::AdmissionQueue::release); a ticket
/// that is never released stays allocated until its process exits and the
/// liveness reaper collects it.
#[derive(Debug)]
pub struct Ticket {
    pub(super) seq: u64,
    pub(super) slot: usize,
}

impl Ticket {
    /// Queue position this ticket was admitted under.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Index of the held slot (0-based, below the configured maximum).
    pub fn slot(&self) -> usize {
        self.slot
    }
}
