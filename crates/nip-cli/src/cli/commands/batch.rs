//! `nip batch` – fetch every manifest item through the admission queue.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use nip_core::admission::AdmissionQueue;
use nip_core::batch::{self, Ledger, WorkItem};
use nip_core::config::IngestConfig;
use nip_core::control::StopSignal;
use nip_core::endpoint::Candidate;
use nip_core::fetch::{fetch_to_file, HttpOptions, Validator};

use super::{admission_store, endpoint_set, ledger_dir};

pub async fn run_batch(
    cfg: &IngestConfig,
    manifest: &Path,
    category: &str,
    endpoints: &[String],
    dest_dir: &Path,
    json_key: Option<String>,
    stop: StopSignal,
) -> Result<()> {
    if category.is_empty() || category.contains(['/', '\\']) {
        bail!("category must be a plain name, it becomes the ledger file prefix");
    }

    let items = batch::load_manifest(manifest)?;
    if items.is_empty() {
        println!("manifest {} holds no work items", manifest.display());
        return Ok(());
    }

    // Resolve every item against the mirror list up front so a malformed
    // manifest path fails the run before anything is fetched.
    let set = endpoint_set(endpoints, cfg)?;
    let mut routes: HashMap<String, Vec<Candidate>> = HashMap::with_capacity(items.len());
    for item in &items {
        routes.insert(item.id.clone(), set.resolve(&item.path)?);
    }

    fs::create_dir_all(dest_dir)
        .with_context(|| format!("creating destination dir {}", dest_dir.display()))?;
    let dir = ledger_dir(cfg)?;
    fs::create_dir_all(&dir)
        .with_context(|| format!("creating ledger dir {}", dir.display()))?;
    let success = Ledger::success_for(&dir, category);
    let failure = Ledger::failure_for(&dir, category);

    let queue = Arc::new(AdmissionQueue::open(&admission_store(cfg)?, &cfg.admission)?);

    let policy = cfg.fetch.policy();
    let validator = match json_key {
        Some(key) => Validator::json_with_key(key),
        None => Validator::non_empty_file(),
    };
    let opts = HttpOptions::default();
    let dest_dir = dest_dir.to_path_buf();
    let fetch_stop = stop.clone();
    let fetch = move |item: &WorkItem| {
        let candidates = routes.get(&item.id).map(Vec::as_slice).unwrap_or(&[]);
        let dest = dest_dir.join(&item.id);
        fetch_to_file(candidates, &dest, &policy, &validator, &fetch_stop, &opts)
    };

    let summary = batch::run_batch(
        items,
        queue,
        success,
        failure,
        cfg.admission.max_concurrency,
        cfg.batch.continue_on_error,
        stop,
        fetch,
    )
    .await?;

    println!(
        "batch `{}`: {} succeeded, {} failed, {} skipped in {:.1?}",
        category, summary.succeeded, summary.failed, summary.skipped, summary.elapsed
    );
    if summary.failed > 0 {
        println!("failure ledger: {}", summary.failure_ledger.display());
    }
    if !summary.clean() {
        bail!("batch `{}` finished with failures", category);
    }
    Ok(())
}
