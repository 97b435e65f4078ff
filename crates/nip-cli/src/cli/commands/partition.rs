//! `nip partition` – split an existing bulk document on disk.

use anyhow::{anyhow, Result};
use std::path::PathBuf;

use nip_core::config::IngestConfig;
use nip_core::control::StopSignal;
use nip_core::partition::{partition_file, PartitionRequest};

use super::strategy_name;

pub async fn run_partition(
    cfg: &IngestConfig,
    input: PathBuf,
    out_dir: PathBuf,
    parts: Option<usize>,
    max_part_bytes: Option<u64>,
    stop: StopSignal,
) -> Result<()> {
    let request = PartitionRequest {
        parts,
        max_part_bytes,
    };
    let shape = cfg.partition.shape();
    let tuning = cfg.partition.tuning();

    let display_dir = out_dir.clone();
    let report = tokio::task::spawn_blocking(move || {
        partition_file(&input, &out_dir, &request, &shape, &tuning, &stop)
    })
    .await
    .map_err(|e| anyhow!("partition task join: {}", e))??;

    println!(
        "wrote {} partitions ({} elements, {} strategy{}) to {}",
        report.partitions.len(),
        report.element_count,
        strategy_name(report.strategy),
        if report.fell_back { ", after fallback" } else { "" },
        display_dir.display()
    );
    Ok(())
}
