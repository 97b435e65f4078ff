use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetch::RetryPolicy;
use crate::partition::{DocShape, SplitTuning};

/// Download and failover parameters (`[fetch]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Ordered mirror URLs; first is the primary, the rest are fallbacks.
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// Attempts per endpoint before rotating to the next one (including the first).
    pub attempts_per_endpoint: u32,
    /// Base backoff delay in seconds (delay grows with the attempt index).
    pub base_delay_secs: f64,
    /// Upper bound on a single backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            attempts_per_endpoint: 5,
            base_delay_secs: 1.0,
            max_delay_secs: 30,
        }
    }
}

impl FetchConfig {
    /// Build the retry policy the fetch loop consumes.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts_per_endpoint: self.attempts_per_endpoint.max(1),
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Concurrency admission parameters (`[admission]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Maximum simultaneously in-flight downloads.
    pub max_concurrency: usize,
    /// How long `acquire` may wait for a slot before giving up.
    pub acquire_timeout_secs: u64,
    /// Polling interval while waiting for a slot or a turn.
    pub poll_interval_ms: u64,
    /// When true, waiters are admitted in approximate ticket order.
    #[serde(default)]
    pub fair: bool,
    /// Override for the ticket/slot store directory (defaults to
    /// `admission/` under the XDG state dir).
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            acquire_timeout_secs: 300,
            poll_interval_ms: 100,
            fair: false,
            store_dir: None,
        }
    }
}

impl AdmissionConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Batch policy (`[batch]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// True: record permanent failures and keep going. False: abort the batch
    /// at the first permanent failure.
    pub continue_on_error: bool,
    /// Where success/failure ledgers are written (defaults to the XDG state dir).
    #[serde(default)]
    pub ledger_dir: Option<PathBuf>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            continue_on_error: true,
            ledger_dir: None,
        }
    }
}

/// Document partitioning parameters (`[partition]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Files at or above this size use the offset-seek strategy instead of a
    /// full sequential scan for cut placement.
    pub seek_threshold_bytes: u64,
    /// Width of the window searched around an estimated cut offset.
    pub search_window_bytes: u64,
    /// Byte marker that opens one element.
    pub element_open: String,
    /// Byte marker that closes one element.
    pub element_close: String,
    /// Closing marker of the document root (for repair and tail validation).
    pub root_close: String,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            seek_threshold_bytes: 64 * 1024 * 1024,
            search_window_bytes: 1024 * 1024,
            element_open: "<note".to_string(),
            element_close: "</note>".to_string(),
            root_close: "</osm-notes>".to_string(),
        }
    }
}

impl PartitionConfig {
    pub fn shape(&self) -> DocShape {
        DocShape::new(&self.element_open, &self.element_close, &self.root_close)
    }

    pub fn tuning(&self) -> SplitTuning {
        SplitTuning {
            seek_threshold_bytes: self.seek_threshold_bytes,
            search_window_bytes: self.search_window_bytes.max(1) as usize,
        }
    }
}

/// Global configuration loaded from `~/.config/nip/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub partition: PartitionConfig,
}

pub fn config_path() -> Result<PathBuf> {
    let dirs = xdg::BaseDirectories::with_prefix("nip")?;
    Ok(dirs.place_config_file("config.toml")?)
}

/// Default directory for mutable state (lock store, ledgers).
pub fn state_dir() -> Result<PathBuf> {
    let dirs = xdg::BaseDirectories::with_prefix("nip")?;
    Ok(dirs.get_state_home())
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<IngestConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = IngestConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: IngestConfig = toml::from_str(&data)?;
    Ok(cfg)
}
