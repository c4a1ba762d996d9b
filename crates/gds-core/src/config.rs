use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level orchestrator configuration (loaded from gds.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GdsConfig {
    pub remote: RemoteConfig,
    pub mirror: MirrorConfig,
    pub timeouts: TimeoutConfig,
    pub listing: ListingConfig,
    /// Local state directory (shells.json, download cache, captured results)
    pub data_dir: PathBuf,
    /// Verbose debug capture (also settable via GDS_DEBUG=1)
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Cloud folder ID serving as the virtual `~`
    pub root_folder_id: String,
    /// Absolute path of the virtual root on the remote host
    pub root_path: String,
    /// Base URL of the provider's web UI
    pub home_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Base directory of the vendor-synced folder
    pub base_dir: PathBuf,
    /// `host:port` probed before uploads; empty disables the probe
    pub probe_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Baseline sync wait per staged file (seconds)
    pub sync_per_file_secs: u64,
    /// Upper bound on any single sync wait (seconds)
    pub sync_max_secs: u64,
    /// Assumed propagation throughput used to scale the sync budget
    pub sync_bytes_per_sec: u64,
    /// Wait for the sentinel result file (seconds)
    pub result_poll_secs: u64,
    /// Per-file listing attempts during verification
    pub verify_attempts: u32,
    /// Delay between polling attempts (milliseconds)
    pub poll_interval_ms: u64,
    /// Budget for the non-executing bash syntax pre-check (milliseconds)
    pub syntax_check_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Max recursion depth for `ls -R`
    pub max_depth: usize,
    /// Page size used while resolving path components
    pub page_size: usize,
    /// Page size for a plain directory listing
    pub ls_page_size: usize,
}

impl Default for GdsConfig {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            mirror: MirrorConfig::default(),
            timeouts: TimeoutConfig::default(),
            listing: ListingConfig::default(),
            data_dir: PathBuf::from("GOOGLE_DRIVE_DATA"),
            debug: false,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            root_folder_id: String::new(),
            root_path: "/content/drive/MyDrive/REMOTE_ROOT".into(),
            home_url: "https://drive.google.com".into(),
        }
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("~/Google Drive/My Drive"),
            probe_addr: "drive.google.com:443".into(),
        }
    }
}

impl RemoteConfig {
    /// Parent of the virtual root on the remote host.
    pub fn base_path(&self) -> String {
        let root = self.root_path.trim_end_matches('/');
        match root.rsplit_once('/') {
            Some((base, _)) if !base.is_empty() => base.to_string(),
            _ => "/".to_string(),
        }
    }

    /// Remote path of the drive-side mirror folder staged files land in.
    pub fn drive_equivalent_path(&self) -> String {
        format!("{}/DRIVE_EQUIVALENT", self.base_path())
    }

    /// Remote path of the environment subtree.
    pub fn remote_env_path(&self) -> String {
        format!("{}/REMOTE_ENV", self.base_path())
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            sync_per_file_secs: 60,
            sync_max_secs: 600,
            sync_bytes_per_sec: 5 * 1024 * 1024,
            result_poll_secs: 60,
            verify_attempts: 60,
            poll_interval_ms: 1000,
            syntax_check_ms: 500,
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            page_size: 100,
            ls_page_size: 50,
        }
    }
}

impl GdsConfig {
    /// Load from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> crate::GdsResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: GdsConfig = toml::from_str(&content)
            .map_err(|e| crate::GdsError::InvalidInput(format!("config parse error: {e}")))?;
        config.apply_env();
        Ok(config)
    }

    /// Read `GDS_DEBUG` from the environment.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("GDS_DEBUG") {
            self.debug = matches!(v.as_str(), "1" | "true" | "yes");
        }
    }

    /// Compute the bounded sync-wait budget for a batch of staged files.
    pub fn sync_budget_secs(&self, file_count: usize, total_bytes: u64) -> u64 {
        let t = &self.timeouts;
        let base = t.sync_per_file_secs.saturating_mul(file_count as u64);
        let transfer = if t.sync_bytes_per_sec == 0 {
            0
        } else {
            total_bytes / t.sync_bytes_per_sec
        };
        (base + transfer).clamp(t.sync_per_file_secs, t.sync_max_secs)
    }
}
