//! Download manager: one task from probe to verified output file.
//!
//! Flow: HEAD probe, pick chunked or single-stream, run the transfer under the
//! shared rate limiter, merge chunk files, then verify digests. Blocking; the
//! scheduler runs it inside `spawn_blocking`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use crate::checksum::{self, ExpectedDigests};
use crate::config::EngineConfig;
use crate::control::CancelToken;
use crate::downloader::{self, PoolOptions, TransferContext};
use crate::error::DownloadError;
use crate::fetch_head::{self, HeadResult};
use crate::progress::{ProgressReporter, ProgressSnapshot, ProgressState};
use crate::rate_limit::RateLimiter;
use crate::retry::run_with_retry;
use crate::segmenter::{choose_connections, plan_chunks};
use crate::storage;
use crate::transport::Transport;
use crate::url_model;

/// Parameters of one download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Task {
    pub url: String,
    /// Explicit output path; derived from the URL under `download_dir` when unset.
    pub output: Option<PathBuf>,
    /// Known size; filled in from `Content-Length` when unset.
    pub expected_size: Option<u64>,
    pub digests: ExpectedDigests,
    /// Chunk count override; derived from `chunk_size` when unset.
    pub connections: Option<usize>,
    pub headers: BTreeMap<String, String>,
    pub cookies: Vec<String>,
    /// Set by the probe.
    pub supports_range: bool,
    pub started_at: Option<SystemTime>,
}

impl Task {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn with_connections(mut self, n: usize) -> Self {
        self.connections = Some(n);
        self
    }

    pub fn with_digests(mut self, digests: ExpectedDigests) -> Self {
        self.digests = digests;
        self
    }
}

/// Summary of a finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub output: PathBuf,
    pub bytes: u64,
    /// 1 for single-stream.
    pub chunks: usize,
    pub elapsed: Duration,
}

/// Runs tasks with a shared configuration and rate limiter.
#[derive(Debug)]
pub struct DownloadManager {
    config: EngineConfig,
    transport: Transport,
    limiter: Arc<RateLimiter>,
}

impl DownloadManager {
    pub fn new(config: EngineConfig, limiter: Arc<RateLimiter>) -> Self {
        let transport = Transport::from_config(&config);
        Self {
            config,
            transport,
            limiter,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Global headers overlaid with the task's own.
    fn request_headers(&self, task: &Task) -> BTreeMap<String, String> {
        let mut h = self.config.headers.clone();
        h.extend(task.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        h
    }

    /// HEAD the task's URL with its headers and cookies.
    pub fn probe(&self, task: &Task, cancel: &CancelToken) -> Result<HeadResult, DownloadError> {
        fetch_head::probe(
            &task.url,
            &self.transport,
            &self.request_headers(task),
            &task.cookies,
            cancel,
        )
    }

    /// Explicit output, or `download_dir/<derived name>`.
    pub fn resolve_output(&self, task: &Task, head: &HeadResult) -> PathBuf {
        match &task.output {
            Some(p) => p.clone(),
            None => self.config.download_dir.join(url_model::derive_filename(
                &task.url,
                head.content_disposition.as_deref(),
            )),
        }
    }

    /// Download `task` to completion. Updates `task` with the probed size,
    /// range support, resolved output path and start time.
    ///
    /// Progress snapshots go to `progress_tx` every `progress_interval_ms`.
    pub fn download(
        &self,
        task: &mut Task,
        cancel: &CancelToken,
        progress_tx: Option<tokio::sync::mpsc::Sender<ProgressSnapshot>>,
    ) -> Result<DownloadReport, DownloadError> {
        let started = Instant::now();
        task.started_at = Some(SystemTime::now());
        cancel.check()?;

        let head = self.probe(task, cancel)?;
        if task.expected_size.is_none() {
            task.expected_size = head.content_length;
        }
        task.supports_range = head.accept_ranges;
        let output = self.resolve_output(task, &head);
        task.output = Some(output.clone());
        if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|e| DownloadError::io(format!("create {}", dir.display()), e))?;
        }

        let progress = Arc::new(ProgressState::new(task.expected_size.unwrap_or(0)));
        let ctx = Arc::new(TransferContext {
            url: task.url.clone(),
            headers: self.request_headers(task),
            cookies: task.cookies.clone(),
            transport: self.transport.clone(),
            limiter: Arc::clone(&self.limiter),
            progress: Arc::clone(&progress),
            cancel: cancel.clone(),
        });

        let reporter = ProgressReporter::spawn(progress, self.config.progress_interval(), progress_tx);
        let result = self.transfer(task, &ctx, &output);
        reporter.finish();
        let (bytes, chunks) = result?;

        if self.config.verify_checksum && !task.digests.is_empty() {
            checksum::verify_file(&output, &task.digests)?;
        }

        let report = DownloadReport {
            output,
            bytes,
            chunks,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            url = %task.url,
            path = %report.output.display(),
            bytes = report.bytes,
            chunks = report.chunks,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "download complete"
        );
        Ok(report)
    }

    /// Chunked when the size is known, ranges are supported and more than one
    /// connection is chosen; single-stream otherwise.
    fn transfer(
        &self,
        task: &Task,
        ctx: &Arc<TransferContext>,
        output: &Path,
    ) -> Result<(u64, usize), DownloadError> {
        let size = task.expected_size;
        let connections = match size {
            Some(s) if s > 0 && task.supports_range => {
                choose_connections(s, task.connections, &self.config)
            }
            _ => 1,
        };

        if let (Some(size), true) = (size, connections > 1) {
            let chunks = plan_chunks(output, size, connections);
            tracing::info!(url = %task.url, size, chunks = chunks.len(), "starting chunked download");
            downloader::download_chunks(
                Arc::clone(ctx),
                &chunks,
                PoolOptions {
                    max_workers: self.config.max_connections,
                    retry: self.config.retry_policy(),
                    resume: self.config.resume_enabled,
                },
            )?;
            let bytes = storage::merge_chunks(output, &chunks)?;
            return Ok((bytes, chunks.len()));
        }

        tracing::info!(url = %task.url, size = ?size, "starting single-stream download");
        let bytes = run_with_retry(&self.config.retry_policy(), &ctx.cancel, |_| {
            downloader::download_single(ctx, output, size)
        })
        .map_err(|e| {
            if e.last.is_cancelled() {
                DownloadError::Cancelled
            } else {
                DownloadError::Transfer {
                    attempts: e.attempts,
                    source: e.last,
                }
            }
        })?;
        storage::sync_path(output)?;
        Ok((bytes, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> DownloadManager {
        let cfg = EngineConfig {
            download_dir: PathBuf::from("/srv/dl"),
            ..Default::default()
        };
        DownloadManager::new(cfg, Arc::new(RateLimiter::unlimited()))
    }

    #[test]
    fn explicit_output_wins() {
        let m = manager();
        let task = Task::new("https://example.com/a.iso").with_output("/tmp/x.iso");
        assert_eq!(m.resolve_output(&task, &HeadResult::default()), PathBuf::from("/tmp/x.iso"));
    }

    #[test]
    fn derived_output_under_download_dir() {
        let m = manager();
        let task = Task::new("https://example.com/pub/a.iso");
        assert_eq!(
            m.resolve_output(&task, &HeadResult::default()),
            PathBuf::from("/srv/dl/a.iso")
        );
    }

    #[test]
    fn task_headers_override_global() {
        let mut cfg = EngineConfig::default();
        cfg.headers.insert("Referer".into(), "global".into());
        cfg.headers.insert("X-A".into(), "1".into());
        let m = DownloadManager::new(cfg, Arc::new(RateLimiter::unlimited()));
        let mut task = Task::new("http://h/f");
        task.headers.insert("Referer".into(), "task".into());
        let h = m.request_headers(&task);
        assert_eq!(h.get("Referer").map(String::as_str), Some("task"));
        assert_eq!(h.get("X-A").map(String::as_str), Some("1"));
    }

    #[test]
    fn cancelled_before_start() {
        let m = manager();
        let token = CancelToken::new();
        token.cancel();
        let mut task = Task::new("http://127.0.0.1:1/never");
        assert!(m.download(&mut task, &token, None).unwrap_err().is_cancelled());
    }
}
