//! `nip dump` – fetch one bulk document, optionally split it afterwards.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nip_core::admission::AdmissionQueue;
use nip_core::config::IngestConfig;
use nip_core::control::StopSignal;
use nip_core::fetch::{fetch_to_file, HttpOptions, Validator};
use nip_core::partition::{partition_file, PartitionRequest};

use super::{admission_store, endpoint_set, strategy_name};

pub async fn run_dump(
    cfg: &IngestConfig,
    out: &Path,
    endpoints: &[String],
    sha256: Option<String>,
    parts: Option<usize>,
    partition_dir: Option<PathBuf>,
    stop: StopSignal,
) -> Result<()> {
    let set = endpoint_set(endpoints, cfg)?;
    let candidates = set.resolve("")?;

    let queue = Arc::new(AdmissionQueue::open(&admission_store(cfg)?, &cfg.admission)?);
    let policy = cfg.fetch.policy();
    let validator = match sha256 {
        Some(digest) => Validator::sha256_is(digest),
        None => Validator::non_empty_file(),
    };
    let opts = HttpOptions::default();

    let dest = out.to_path_buf();
    let fetch_stop = stop.clone();
    let fetch_queue = Arc::clone(&queue);
    let report = tokio::task::spawn_blocking(move || -> Result<_> {
        let ticket = fetch_queue.acquire(&fetch_stop)?;
        let fetched = fetch_to_file(&candidates, &dest, &policy, &validator, &fetch_stop, &opts);
        if let Err(e) = fetch_queue.release(ticket) {
            tracing::warn!("releasing admission ticket: {}", e);
        }
        Ok(fetched?)
    })
    .await
    .map_err(|e| anyhow!("dump task join: {}", e))??;

    println!(
        "fetched {} via {} ({} attempts, {:.1?})",
        report.dest.display(),
        report.endpoint,
        report.attempts,
        report.elapsed
    );

    let Some(parts) = parts else {
        return Ok(());
    };

    let out_dir = partition_dir.unwrap_or_else(|| default_partition_dir(out));
    let request = PartitionRequest::by_parts(parts);
    let shape = cfg.partition.shape();
    let tuning = cfg.partition.tuning();
    let input = out.to_path_buf();
    let split_dir = out_dir.clone();
    let report = tokio::task::spawn_blocking(move || {
        partition_file(&input, &split_dir, &request, &shape, &tuning, &stop)
    })
    .await
    .map_err(|e| anyhow!("partition task join: {}", e))??;

    println!(
        "wrote {} partitions ({} elements, {} strategy{}) to {}",
        report.partitions.len(),
        report.element_count,
        strategy_name(report.strategy),
        if report.fell_back { ", after fallback" } else { "" },
        out_dir.display()
    );
    Ok(())
}

/// `notes.xml` splits into `notes.xml-parts/` next to the dump by default.
fn default_partition_dir(out: &Path) -> PathBuf {
    let name = out
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dump".to_string());
    out.with_file_name(format!("{name}-parts"))
}
