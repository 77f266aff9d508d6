#![allow(dead_code)]

pub mod range_server;

use rangedl_core::EngineConfig;
use std::path::Path;

/// Deterministic, non-repeating-at-small-scale test body.
pub fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 7 + i / 251) % 256) as u8).collect()
}

/// Config tuned for tests: fast ticks and retries, outputs under `dir`.
pub fn test_config(dir: &Path) -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.download_dir = dir.to_path_buf();
    cfg.retry.max_attempts = 2;
    cfg.retry.delay_secs = 0;
    cfg.timeout_secs = 10;
    cfg.connect_timeout_secs = 5;
    cfg.progress_interval_ms = 20;
    cfg.scheduler_tick_ms = 20;
    cfg
}
