//! CLI command handlers, one file per subcommand.

mod batch;
mod dump;
mod partition;
mod repair;

pub use batch::run_batch;
pub use dump::run_dump;
pub use partition::run_partition;
pub use repair::run_repair;

use anyhow::{bail, Result};
use std::path::PathBuf;

use nip_core::config::{self, IngestConfig};
use nip_core::endpoint::EndpointSet;
use nip_core::partition::Strategy;

/// Endpoint list for a command: CLI overrides win, configured list otherwise.
fn endpoint_set(overrides: &[String], cfg: &IngestConfig) -> Result<EndpointSet> {
    let urls: &[String] = if overrides.is_empty() {
        &cfg.fetch.endpoints
    } else {
        overrides
    };
    if urls.is_empty() {
        bail!("no endpoints configured; pass --endpoint or set [fetch] endpoints in the config");
    }
    Ok(EndpointSet::parse(urls)?)
}

/// Root of the ticket/slot store shared by every nip process on this host.
fn admission_store(cfg: &IngestConfig) -> Result<PathBuf> {
    match &cfg.admission.store_dir {
        Some(dir) => Ok(dir.clone()),
        None => Ok(config::state_dir()?.join("admission")),
    }
}

fn ledger_dir(cfg: &IngestConfig) -> Result<PathBuf> {
    match &cfg.batch.ledger_dir {
        Some(dir) => Ok(dir.clone()),
        None => config::state_dir(),
    }
}

fn strategy_name(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::Sequential => "sequential",
        Strategy::OffsetSeek => "offset-seek",
    }
}
