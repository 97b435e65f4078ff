//! `nip repair` – salvage complete elements out of a damaged dump.

use anyhow::{anyhow, Result};
use std::path::PathBuf;

use nip_core::config::IngestConfig;
use nip_core::partition::best_effort_repair;

pub async fn run_repair(cfg: &IngestConfig, input: PathBuf, output: PathBuf) -> Result<()> {
    let shape = cfg.partition.shape();
    let report =
        tokio::task::spawn_blocking(move || best_effort_repair(&input, &output, &shape))
            .await
            .map_err(|e| anyhow!("repair task join: {}", e))??;

    println!(
        "kept {} elements, dropped {} bytes -> {}",
        report.salvaged_elements,
        report.dropped_bytes,
        report.output.display()
    );
    Ok(())
}
