//! Bounded cross-process admission for outbound downloads.
//!
//! A filesystem-backed queue of waiter tickets and holder slots under one
//! store directory. At most N slot files exist at a time; a slot is claimed
//! with an atomic `create_new`, so two processes can never hold the same
//! slot. Records left behind by crashed processes are reclaimed by a pid
//! liveness probe, so a dead holder frees its slot within one polling
//! interval.

mod error;
mod liveness;
mod queue;
mod store;
mod ticket;

pub use error::GateError;
pub use liveness::{PidProbe, ProcessProbe};
pub use queue::AdmissionQueue;
pub use ticket::{SlotRecord, Ticket, TicketRecord};
