//! Engine-wide tuning defaults (spec section 10).
//!
//! Per-job fields from the Job Descriptor always take precedence; this file
//! only supplies defaults for constants the specification otherwise fixes as
//! numbers (retry/backoff, timeouts, throttle intervals).

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub default_connections: u32,
    pub probe_timeout_secs: u64,
    pub segment_idle_timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    pub progress_interval_ms: u64,
    pub snapshot_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_connections: 8,
            probe_timeout_secs: 10,
            segment_idle_timeout_secs: 60,
            max_attempts: 10,
            backoff_base_ms: 1000,
            backoff_cap_ms: 10_000,
            progress_interval_ms: 1000,
            snapshot_interval_ms: 5000,
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rangedl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<EngineConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = EngineConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: EngineConfig = toml::from_str(&data)?;
    Ok(cfg)
}
