//! Batch orchestration: run manifest items through the admission queue
//! with a bounded number in flight.
//!
//! Keeps up to `max_concurrent` item tasks running at once; when one
//! finishes, the next manifest item is started until the manifest is empty
//! or the batch stops admitting. Admission and the fetch itself both block,
//! so each item runs on the blocking pool.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::task::JoinSet;

use crate::admission::{AdmissionQueue, GateError};
use crate::control::StopSignal;
use crate::fetch::{FetchError, FetchReport};

use super::ledger::Ledger;
use super::manifest::WorkItem;
use super::summary::BatchSummary;

/// How one item ended. Fatal queue conditions have no arm here; they abort
/// the whole batch instead.
enum ItemResult {
    Succeeded(WorkItem),
    Failed(WorkItem, String),
    /// The stop signal arrived before the item did any work.
    Skipped(WorkItem),
}

/// Runs every item through `queue` and `fetch`, appending each outcome to
/// the matching ledger as it lands.
///
/// Item failures never abort the run: with `continue_on_error` they are
/// recorded and the batch moves on; without it the batch stops admitting
/// new items, drains what is in flight, and counts the rest as skipped.
/// The returned error covers fatal conditions only (queue store corruption,
/// ledger I/O), where continuing would mean losing accounting.
///
/// Generic over the fetch function so tests can script outcomes;
/// production passes a closure around [`crate::fetch::fetch_to_file`].
pub async fn run_batch<F>(
    items: Vec<WorkItem>,
    queue: Arc<AdmissionQueue>,
    success_ledger: Ledger,
    failure_ledger: Ledger,
    max_concurrent: usize,
    continue_on_error: bool,
    stop: StopSignal,
    fetch: F,
) -> Result<BatchSummary>
where
    F: Fn(&WorkItem) -> Result<FetchReport, FetchError> + Send + Sync + 'static,
{
    let max_concurrent = max_concurrent.max(1);
    let fetch = Arc::new(fetch);
    let started = Instant::now();
    let total = items.len();

    let mut pending: VecDeque<WorkItem> = items.into();
    let mut join_set = JoinSet::new();
    let mut succeeded = 0u64;
    let mut failed = 0u64;
    let mut skipped = 0u64;
    let mut halted = false;

    loop {
        while join_set.len() < max_concurrent {
            if halted || stop.is_stopped() {
                halted = true;
                break;
            }
            let Some(item) = pending.pop_front() else {
                break;
            };
            let queue = Arc::clone(&queue);
            let stop = stop.clone();
            let fetch = Arc::clone(&fetch);
            join_set.spawn_blocking(move || run_item(item, &queue, &stop, fetch.as_ref()));
        }

        if join_set.is_empty() {
            break;
        }

        let Some(res) = join_set.join_next().await else {
            break;
        };
        let outcome = res.map_err(|e| anyhow::anyhow!("batch task join: {}", e))??;
        match outcome {
            ItemResult::Succeeded(item) => {
                succeeded += 1;
                success_ledger
                    .append(&item.id)
                    .with_context(|| format!("recording success of {}", item.id))?;
            }
            ItemResult::Failed(item, reason) => {
                failed += 1;
                tracing::warn!("{} failed permanently: {}", item.id, reason);
                failure_ledger
                    .append(&item.id)
                    .with_context(|| format!("recording failure of {}", item.id))?;
                if !continue_on_error {
                    halted = true;
                }
            }
            ItemResult::Skipped(item) => {
                skipped += 1;
                tracing::debug!("{} skipped, batch is stopping", item.id);
            }
        }
        if stop.is_stopped() {
            halted = true;
        }
    }

    skipped += pending.len() as u64;
    let summary = BatchSummary {
        succeeded,
        failed,
        skipped,
        aborted: halted,
        elapsed: started.elapsed(),
        success_ledger: success_ledger.path().to_path_buf(),
        failure_ledger: failure_ledger.path().to_path_buf(),
    };
    tracing::info!(
        "batch done: {}/{} succeeded, {} failed, {} skipped in {:.1?} (ledgers: {}, {})",
        summary.succeeded,
        total,
        summary.failed,
        summary.skipped,
        summary.elapsed,
        summary.success_ledger.display(),
        summary.failure_ledger.display()
    );
    Ok(summary)
}

/// One item, start to finish: admission ticket, fetch, release. Runs on the
/// blocking pool. The ticket is released whatever the fetch did.
fn run_item<F>(
    item: WorkItem,
    queue: &AdmissionQueue,
    stop: &StopSignal,
    fetch: &F,
) -> Result<ItemResult>
where
    F: Fn(&WorkItem) -> Result<FetchReport, FetchError>,
{
    let ticket = match queue.acquire(stop) {
        Ok(ticket) => ticket,
        Err(GateError::AcquireTimeout { waited }) => {
            return Ok(ItemResult::Failed(
                item,
                format!("no admission slot within {waited:.1?}"),
            ));
        }
        Err(GateError::Interrupted) => return Ok(ItemResult::Skipped(item)),
        Err(fatal) => return Err(fatal.into()),
    };

    let fetched = fetch(&item);
    if let Err(e) = queue.release(ticket) {
        tracing::warn!("releasing slot after {}: {}", item.id, e);
    }

    match fetched {
        Ok(report) => {
            tracing::info!(
                "{} fetched via {} ({} attempts, {:.1?})",
                item.id,
                report.endpoint,
                report.attempts,
                report.elapsed
            );
            Ok(ItemResult::Succeeded(item))
        }
        Err(FetchError::Interrupted) => Ok(ItemResult::Skipped(item)),
        Err(e) => Ok(ItemResult::Failed(item, e.to_string())),
    }
}
