//! CLI for the notes ingestion pipeline.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use nip_core::config;
use nip_core::control::StopSignal;
use std::path::PathBuf;

use commands::{run_batch, run_dump, run_partition, run_repair};

/// Top-level CLI for the notes ingestion pipeline.
#[derive(Debug, Parser)]
#[command(name = "nip")]
#[command(about = "nip: resilient bulk ingestion for map notes", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch every manifest item through the admission queue, recording
    /// outcomes in per-category ledgers.
    Batch {
        /// Manifest file: one `<id> <path>` line per item.
        #[arg(long)]
        manifest: PathBuf,

        /// Names the batch; ledgers are `<category>-succeeded.txt` and
        /// `<category>-failed.txt`.
        #[arg(long)]
        category: String,

        /// Override the configured endpoint list (repeatable, in failover order).
        #[arg(long = "endpoint", value_name = "URL")]
        endpoints: Vec<String>,

        /// Directory fetched artifacts are written to.
        #[arg(long, default_value = ".", value_name = "DIR")]
        dest_dir: PathBuf,

        /// Accept a response only when it is JSON carrying this non-empty key.
        #[arg(long, value_name = "KEY")]
        json_key: Option<String>,
    },

    /// Fetch one bulk dump through the queue, then optionally verify and
    /// partition it.
    Dump {
        /// Where the dump is written.
        #[arg(long, value_name = "FILE")]
        out: PathBuf,

        /// Override the configured endpoint list (repeatable, in failover order).
        #[arg(long = "endpoint", value_name = "URL")]
        endpoints: Vec<String>,

        /// Expected SHA-256 of the dump; a mismatching response counts as a
        /// failed attempt and is retried.
        #[arg(long, value_name = "HEX")]
        sha256: Option<String>,

        /// Split the fetched dump into N partitions.
        #[arg(long, value_name = "N")]
        parts: Option<usize>,

        /// Where partition files go (default: `<dump>-parts` next to it).
        #[arg(long, value_name = "DIR", requires = "parts")]
        partition_dir: Option<PathBuf>,
    },

    /// Split an already-downloaded document into partitions.
    #[command(group(
        clap::ArgGroup::new("sizing")
            .required(true)
            .args(["parts", "max_part_bytes"]),
    ))]
    Partition {
        /// Document to split.
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        /// Directory partition files are written to.
        #[arg(long, value_name = "DIR")]
        out_dir: PathBuf,

        /// Number of partitions.
        #[arg(long, value_name = "N")]
        parts: Option<usize>,

        /// Target maximum partition size instead of a fixed count.
        #[arg(long, value_name = "BYTES")]
        max_part_bytes: Option<u64>,
    },

    /// Rewrite a damaged dump, keeping only its complete elements.
    Repair {
        /// Damaged document.
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        /// Where the salvaged document is written.
        #[arg(long, value_name = "FILE")]
        output: PathBuf,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        let stop = StopSignal::new();
        install_ctrl_c(stop.clone());

        match cli.command {
            CliCommand::Batch {
                manifest,
                category,
                endpoints,
                dest_dir,
                json_key,
            } => {
                run_batch(&cfg, &manifest, &category, &endpoints, &dest_dir, json_key, stop)
                    .await?;
            }
            CliCommand::Dump {
                out,
                endpoints,
                sha256,
                parts,
                partition_dir,
            } => {
                run_dump(&cfg, &out, &endpoints, sha256, parts, partition_dir, stop).await?;
            }
            CliCommand::Partition {
                input,
                out_dir,
                parts,
                max_part_bytes,
            } => {
                run_partition(&cfg, input, out_dir, parts, max_part_bytes, stop).await?;
            }
            CliCommand::Repair { input, output } => {
                run_repair(&cfg, input, output).await?;
            }
        }

        Ok(())
    }
}

/// Ctrl-C requests a cooperative stop; work ends at its next checkpoint.
fn install_ctrl_c(stop: StopSignal) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping at the next checkpoint");
            stop.request_stop();
        }
    });
}

#[cfg(test)]
mod tests;
