//! Batch orchestration: manifest in, ledgers out.

mod ledger;
mod manifest;
mod run;
mod summary;

pub use ledger::Ledger;
pub use manifest::{load as load_manifest, WorkItem};
pub use run::run_batch;
pub use summary::BatchSummary;
