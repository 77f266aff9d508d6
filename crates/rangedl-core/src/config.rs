use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry parameters for chunk and single-stream transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per chunk (including the first).
    pub max_attempts: u32,
    /// Fixed pause between attempts, in seconds.
    pub delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_secs: 2,
        }
    }
}

/// Global configuration loaded from `~/.config/rangedl/config.toml`.
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on chunk workers (and chunks) per task.
    pub max_connections: usize,
    /// Target chunk size when a task does not name a connection count.
    pub chunk_size: u64,
    /// Stall timeout in seconds: a transfer that receives no bytes for this long
    /// fails. There is no cap on total transfer time.
    pub timeout_secs: u64,
    /// TCP/TLS connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Aggregate bandwidth cap in bytes per second; 0 disables throttling.
    pub rate_limit_bytes: i64,
    /// Proxy URL handed to curl (http://, socks5://, ...).
    pub proxy_url: Option<String>,
    pub user_agent: String,
    /// Reuse chunk files that already have their full expected length.
    pub resume_enabled: bool,
    /// Check expected digests after a successful transfer.
    pub verify_checksum: bool,
    /// Directory for outputs when a task names no output path.
    pub download_dir: PathBuf,
    /// Maximum number of jobs downloading at once.
    pub max_active_jobs: usize,
    /// Read buffer per transfer in bytes.
    pub buffer_size: usize,
    /// How often progress snapshots are emitted, in milliseconds.
    pub progress_interval_ms: u64,
    /// Scheduler dispatch period, in milliseconds.
    pub scheduler_tick_ms: u64,
    pub retry: RetryConfig,
    /// Extra request headers sent with every HEAD and GET.
    pub headers: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_connections: 32,
            chunk_size: 4 * 1024 * 1024,
            timeout_secs: 30,
            connect_timeout_secs: 15,
            rate_limit_bytes: 0,
            proxy_url: None,
            user_agent: format!("rangedl/{}", env!("CARGO_PKG_VERSION")),
            resume_enabled: true,
            verify_checksum: true,
            download_dir: PathBuf::from("./downloads"),
            max_active_jobs: 4,
            buffer_size: 32 * 1024,
            progress_interval_ms: 100,
            scheduler_tick_ms: 1000,
            retry: RetryConfig::default(),
            headers: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_secs(self.retry.delay_secs),
        )
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    pub fn scheduler_tick(&self) -> Duration {
        Duration::from_millis(self.scheduler_tick_ms.max(1))
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml(data: &str) -> Result<Self> {
        Ok(toml::from_str(data)?)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rangedl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from an explicit path.
pub fn load_from(path: &Path) -> Result<EngineConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    EngineConfig::from_toml(&data).with_context(|| format!("parse config {}", path.display()))
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
    load_from(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.max_connections, 32);
        assert_eq!(cfg.chunk_size, 4 * 1024 * 1024);
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.delay_secs, 2);
        assert_eq!(cfg.timeout_secs, 30);
        assert_eq!(cfg.rate_limit_bytes, 0);
        assert_eq!(cfg.max_active_jobs, 4);
        assert_eq!(cfg.buffer_size, 32 * 1024);
        assert_eq!(cfg.progress_interval(), Duration::from_millis(100));
        assert_eq!(cfg.scheduler_tick(), Duration::from_secs(1));
        assert!(cfg.resume_enabled);
        assert!(cfg.verify_checksum);
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut cfg = EngineConfig::default();
        cfg.headers.insert("Authorization".into(), "Bearer x".into());
        cfg.proxy_url = Some("socks5://127.0.0.1:1080".into());
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed = EngineConfig::from_toml(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let toml = r#"
            max_connections = 8
            rate_limit_bytes = 1_000_000
            download_dir = "/srv/downloads"

            [retry]
            max_attempts = 3
        "#;
        let cfg = EngineConfig::from_toml(toml).unwrap();
        assert_eq!(cfg.max_connections, 8);
        assert_eq!(cfg.rate_limit_bytes, 1_000_000);
        assert_eq!(cfg.download_dir, PathBuf::from("/srv/downloads"));
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.delay_secs, 2);
        assert_eq!(cfg.max_active_jobs, 4);
        assert!(cfg.proxy_url.is_none());
    }

    #[test]
    fn headers_table() {
        let toml = r#"
            [headers]
            Referer = "https://example.com/"
            X-Token = "abc"
        "#;
        let cfg = EngineConfig::from_toml(toml).unwrap();
        assert_eq!(cfg.headers.get("Referer").map(String::as_str), Some("https://example.com/"));
        assert_eq!(cfg.headers.len(), 2);
    }

    #[test]
    fn load_from_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_connections = \"many\"").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("config.toml"));
    }

    #[test]
    fn retry_policy_from_config() {
        let cfg = EngineConfig::default();
        let p = cfg.retry_policy();
        assert_eq!(p.max_attempts(), 5);
        assert_eq!(p.delay(), Duration::from_secs(2));
    }
}
