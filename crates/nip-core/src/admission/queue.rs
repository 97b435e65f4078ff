//! Admission queue: enqueue a waiter ticket, poll, claim a holder slot.

use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::config::AdmissionConfig;
use crate::control::StopSignal;

use super::error::GateError;
use super::liveness::{PidProbe, ProcessProbe};
use super::store::GateStore;
use super::ticket::{SlotRecord, Ticket, TicketRecord};

/// Bounded admission gate shared by every process that downloads through
/// this store directory.
pub struct AdmissionQueue {
    store: GateStore,
    max_slots: usize,
    poll_interval: Duration,
    acquire_timeout: Duration,
    fair: bool,
    stale_grace: Duration,
    probe: Box<dyn ProcessProbe>,
}

impl AdmissionQueue {
    pub fn open(dir: &Path, cfg: &AdmissionConfig) -> Result<Self, GateError> {
        Self::with_probe(dir, cfg, Box::new(PidProbe))
    }

    /// Opens the queue with an injected liveness probe.
    pub fn with_probe(
        dir: &Path,
        cfg: &AdmissionConfig,
        probe: Box<dyn ProcessProbe>,
    ) -> Result<Self, GateError> {
        let poll = cfg.poll_interval();
        Ok(Self {
            store: GateStore::open(dir)?,
            max_slots: cfg.max_concurrency.max(1),
            poll_interval: poll,
            acquire_timeout: cfg.acquire_timeout(),
            fair: cfg.fair,
            // A crashed writer can leave a half-written record behind;
            // give an in-progress writer time to finish before its record
            // counts as garbage.
            stale_grace: (poll * 2).max(Duration::from_secs(1)),
            probe,
        })
    }

    /// Blocks until a slot is held, the acquire timeout passes, or a stop
    /// is requested. The waiter ticket is removed on every failure path so
    /// an abandoned acquire cannot block fair-mode peers.
    pub fn acquire(&self, stop: &StopSignal) -> Result<Ticket, GateError> {
        let started = Instant::now();
        let seq = self.enqueue()?;
        tracing::debug!("ticket {} enqueued (pid {})", seq, std::process::id());

        match self.wait_for_slot(seq, started, stop) {
            Ok(slot) => {
                tracing::debug!("ticket {} admitted to slot {}", seq, slot);
                Ok(Ticket { seq, slot })
            }
            Err(e) => {
                let _ = self.store.remove_ticket(seq);
                Err(e)
            }
        }
    }

    /// Returns the slot. Records already reclaimed by a peer are tolerated
    /// with a warning.
    pub fn release(&self, ticket: Ticket) -> Result<(), GateError> {
        if !self.store.release_slot(ticket.slot, ticket.seq)? {
            tracing::warn!("slot {} was already reclaimed", ticket.slot);
        }
        if !self.store.remove_ticket(ticket.seq)? {
            tracing::warn!("ticket {} was already reclaimed", ticket.seq);
        }
        Ok(())
    }

    /// Number of held slots.
    pub fn active_count(&self) -> Result<usize, GateError> {
        Ok(self.store.slots()?.len())
    }

    /// Number of waiters not yet holding a slot.
    pub fn waiting_count(&self) -> Result<usize, GateError> {
        let holding = self.holding_seqs()?;
        Ok(self
            .store
            .tickets()?
            .iter()
            .filter(|t| !holding.contains(&t.seq))
            .count())
    }

    /// Wipes every record (clean shutdown of the whole pipeline).
    pub fn clear(&self) -> Result<(), GateError> {
        self.store.clear()
    }

    pub fn store_root(&self) -> &Path {
        self.store.root()
    }

    fn enqueue(&self) -> Result<u64, GateError> {
        loop {
            let seq = self.store.next_seq()?;
            let record = TicketRecord {
                seq,
                pid: std::process::id(),
                created_at_unix: unix_now(),
            };
            if self.store.create_ticket(&record)? {
                return Ok(seq);
            }
            // Lost the sequence race; the rescan picks a higher number.
        }
    }

    fn wait_for_slot(
        &self,
        seq: u64,
        started: Instant,
        stop: &StopSignal,
    ) -> Result<usize, GateError> {
        loop {
            if stop.is_stopped() {
                return Err(GateError::Interrupted);
            }
            self.reap_stale()?;

            if !self.fair || self.my_turn(seq)? {
                if let Some(slot) = self.try_claim(seq)? {
                    return Ok(slot);
                }
            }

            let waited = started.elapsed();
            if waited >= self.acquire_timeout {
                return Err(GateError::AcquireTimeout { waited });
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    /// A waiter may claim once no older ticket is still waiting. Holders
    /// do not count: their tickets stay in the store for the lifetime of
    /// the slot.
    fn my_turn(&self, seq: u64) -> Result<bool, GateError> {
        let holding = self.holding_seqs()?;
        for t in self.store.tickets()? {
            if t.seq < seq && !holding.contains(&t.seq) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn try_claim(&self, seq: u64) -> Result<Option<usize>, GateError> {
        let record = SlotRecord {
            seq,
            pid: std::process::id(),
            acquired_at_unix: unix_now(),
        };
        for index in 0..self.max_slots {
            if self.store.try_claim_slot(index, &record)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Removes records owned by dead processes, plus unreadable records
    /// older than the grace window.
    fn reap_stale(&self) -> Result<(), GateError> {
        let now = SystemTime::now();
        for slot in self.store.slots()? {
            match &slot.record {
                Some(rec) if !self.probe.is_alive(rec.pid) => {
                    tracing::warn!("reclaiming slot {} from dead pid {}", slot.index, rec.pid);
                    self.store.remove_slot_file(slot.index)?;
                    self.store.remove_ticket(rec.seq)?;
                }
                Some(_) => {}
                None if self.aged_out(slot.modified, now) => {
                    tracing::warn!("pruning unreadable slot record {}", slot.path.display());
                    self.store.remove_file(&slot.path)?;
                }
                None => {}
            }
        }
        for t in self.store.tickets()? {
            match &t.record {
                Some(rec) if !self.probe.is_alive(rec.pid) => {
                    tracing::warn!("pruning ticket {} from dead pid {}", t.seq, rec.pid);
                    self.store.remove_ticket(t.seq)?;
                }
                Some(_) => {}
                None if self.aged_out(t.modified, now) => {
                    tracing::warn!("pruning unreadable ticket record {}", t.path.display());
                    self.store.remove_file(&t.path)?;
                }
                None => {}
            }
        }
        Ok(())
    }

    fn holding_seqs(&self) -> Result<HashSet<u64>, GateError> {
        Ok(self
            .store
            .slots()?
            .iter()
            .filter_map(|s| s.record.as_ref().map(|r| r.seq))
            .collect())
    }

    fn aged_out(&self, modified: Option<SystemTime>, now: SystemTime) -> bool {
        match modified {
            Some(m) => now.duration_since(m).unwrap_or(Duration::ZERO) > self.stale_grace,
            None => false,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::mpsc;
    use std::sync::Arc;

    fn test_cfg(max_concurrency: usize, acquire_timeout_secs: u64) -> AdmissionConfig {
        AdmissionConfig {
            max_concurrency,
            acquire_timeout_secs,
            poll_interval_ms: 10,
            fair: false,
            store_dir: None,
        }
    }

    struct ScriptedProbe {
        dead: HashSet<u32>,
    }

    impl ProcessProbe for ScriptedProbe {
        fn is_alive(&self, pid: u32) -> bool {
            !self.dead.contains(&pid)
        }
    }

    #[test]
    fn admits_up_to_capacity_without_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let q = AdmissionQueue::open(dir.path(), &test_cfg(2, 30)).unwrap();
        let stop = StopSignal::new();

        let t1 = q.acquire(&stop).unwrap();
        let t2 = q.acquire(&stop).unwrap();
        assert_ne!(t1.slot(), t2.slot());
        assert_eq!(q.active_count().unwrap(), 2);
        assert_eq!(q.waiting_count().unwrap(), 0);

        q.release(t1).unwrap();
        q.release(t2).unwrap();
        assert_eq!(q.active_count().unwrap(), 0);
    }

    #[test]
    fn extra_acquire_blocks_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let q = Arc::new(AdmissionQueue::open(dir.path(), &test_cfg(1, 30)).unwrap());
        let stop = StopSignal::new();

        let held = q.acquire(&stop).unwrap();

        let (tx, rx) = mpsc::channel();
        let q2 = Arc::clone(&q);
        let stop2 = stop.clone();
        let waiter = std::thread::spawn(move || {
            let ticket = q2.acquire(&stop2);
            tx.send(()).unwrap();
            ticket
        });

        // Still blocked while the slot is held.
        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());

        q.release(held).unwrap();
        rx.recv_timeout(Duration::from_secs(5))
            .expect("waiter should be admitted after release");
        let ticket = waiter.join().unwrap().unwrap();
        q.release(ticket).unwrap();
    }

    #[test]
    fn dead_holder_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let dead_pid = 4_000_000_000u32;
        let probe = ScriptedProbe {
            dead: [dead_pid].into_iter().collect(),
        };
        let q =
            AdmissionQueue::with_probe(dir.path(), &test_cfg(1, 30), Box::new(probe)).unwrap();

        // A holder that died without releasing.
        let stale_slot = SlotRecord {
            seq: 1,
            pid: dead_pid,
            acquired_at_unix: 0,
        };
        let stale_ticket = TicketRecord {
            seq: 1,
            pid: dead_pid,
            created_at_unix: 0,
        };
        fs::write(
            dir.path().join("slots").join("slot-0"),
            serde_json::to_vec(&stale_slot).unwrap(),
        )
        .unwrap();
        fs::write(
            dir.path().join("tickets").join("ticket-1"),
            serde_json::to_vec(&stale_ticket).unwrap(),
        )
        .unwrap();

        let ticket = q.acquire(&StopSignal::new()).unwrap();
        assert_eq!(ticket.slot(), 0, "reclaimed slot should be reusable");
        assert_eq!(q.active_count().unwrap(), 1);
        assert_eq!(q.waiting_count().unwrap(), 0, "stale ticket should be gone");
        q.release(ticket).unwrap();
    }

    #[test]
    fn acquire_timeout_removes_own_ticket() {
        let dir = tempfile::tempdir().unwrap();
        let q = AdmissionQueue::open(dir.path(), &test_cfg(1, 1)).unwrap();
        let stop = StopSignal::new();

        let held = q.acquire(&stop).unwrap();
        let err = q.acquire(&stop).unwrap_err();
        match err {
            GateError::AcquireTimeout { waited } => {
                assert!(waited >= Duration::from_secs(1));
            }
            other => panic!("expected AcquireTimeout, got {other:?}"),
        }
        assert_eq!(q.waiting_count().unwrap(), 0);
        q.release(held).unwrap();
    }

    #[test]
    fn stop_request_interrupts_acquire() {
        let dir = tempfile::tempdir().unwrap();
        let q = AdmissionQueue::open(dir.path(), &test_cfg(1, 30)).unwrap();
        let stop = StopSignal::new();

        let held = q.acquire(&stop).unwrap();
        stop.request_stop();
        let err = q.acquire(&stop).unwrap_err();
        assert!(matches!(err, GateError::Interrupted));
        assert_eq!(q.waiting_count().unwrap(), 0);
        q.release(held).unwrap();
    }

    #[test]
    fn sequences_stay_unique_under_contention() {
        let dir = tempfile::tempdir().unwrap();
        let q = Arc::new(AdmissionQueue::open(dir.path(), &test_cfg(8, 30)).unwrap());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let q = Arc::clone(&q);
            handles.push(std::thread::spawn(move || {
                q.acquire(&StopSignal::new()).unwrap()
            }));
        }
        let tickets: Vec<Ticket> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let seqs: HashSet<u64> = tickets.iter().map(|t| t.seq()).collect();
        assert_eq!(seqs.len(), 8, "every waiter must get a distinct sequence");
        let slots: HashSet<usize> = tickets.iter().map(|t| t.slot()).collect();
        assert_eq!(slots.len(), 8, "every holder must get a distinct slot");

        for t in tickets {
            q.release(t).unwrap();
        }
    }

    #[test]
    fn fair_mode_defers_to_older_waiters() {
        // An older waiter (alive, never claiming) starves a fair acquirer.
        let fair_dir = tempfile::tempdir().unwrap();
        let mut cfg = test_cfg(1, 1);
        cfg.fair = true;
        let q = AdmissionQueue::open(fair_dir.path(), &cfg).unwrap();
        let older = TicketRecord {
            seq: 1,
            pid: std::process::id(),
            created_at_unix: 0,
        };
        fs::write(
            fair_dir.path().join("tickets").join("ticket-1"),
            serde_json::to_vec(&older).unwrap(),
        )
        .unwrap();
        let err = q.acquire(&StopSignal::new()).unwrap_err();
        assert!(matches!(err, GateError::AcquireTimeout { .. }));

        // The default mode claims regardless of queue position.
        let unfair_dir = tempfile::tempdir().unwrap();
        let q = AdmissionQueue::open(unfair_dir.path(), &test_cfg(1, 1)).unwrap();
        fs::write(
            unfair_dir.path().join("tickets").join("ticket-1"),
            serde_json::to_vec(&older).unwrap(),
        )
        .unwrap();
        let ticket = q.acquire(&StopSignal::new()).unwrap();
        q.release(ticket).unwrap();
    }

    #[test]
    fn clear_resets_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let q = AdmissionQueue::open(dir.path(), &test_cfg(2, 30)).unwrap();
        let _t = q.acquire(&StopSignal::new()).unwrap();
        q.clear().unwrap();
        assert_eq!(q.active_count().unwrap(), 0);
        assert_eq!(q.waiting_count().unwrap(), 0);
    }
}
