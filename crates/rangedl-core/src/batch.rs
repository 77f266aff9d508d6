//! Batch downloads from a URL list file.
//!
//! One entry per line: the URL, then optional `sha256:HEX`, `sha1:HEX` or
//! `md5:HEX` tokens. Blank lines and lines starting with `#` are skipped.
//! Entries run straight through the download manager, bypassing the job
//! queue, at most `concurrency` at a time.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::control::CancelToken;
use crate::error::DownloadError;
use crate::manager::{DownloadManager, DownloadReport, Task};

/// Parse a URL list. Unknown tokens after the URL are ignored with a warning.
pub fn parse_batch(text: &str) -> Vec<Task> {
    let mut tasks = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let Some(url) = fields.next() else { continue };
        let mut task = Task::new(url);
        for field in fields {
            let (slot, hex) = match field.split_once(':') {
                Some(("sha256", hex)) => (&mut task.digests.sha256, hex),
                Some(("sha1", hex)) => (&mut task.digests.sha1, hex),
                Some(("md5", hex)) => (&mut task.digests.md5, hex),
                _ => {
                    tracing::warn!(line = lineno + 1, token = field, "ignoring unknown batch token");
                    continue;
                }
            };
            *slot = Some(hex.to_string());
        }
        tasks.push(task);
    }
    tasks
}

/// Read and parse a URL list file.
pub fn read_batch_file(path: &Path) -> Result<Vec<Task>, DownloadError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| DownloadError::io(format!("read {}", path.display()), e))?;
    Ok(parse_batch(&text))
}

/// How one batch entry ended.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Position in the list, from 0.
    pub index: usize,
    pub url: String,
    pub result: Result<DownloadReport, DownloadError>,
}

/// Download every task, `concurrency` at a time. One failure does not stop the
/// others; outcomes come back in list order.
pub async fn download_batch(
    manager: Arc<DownloadManager>,
    tasks: Vec<Task>,
    concurrency: usize,
    cancel: CancelToken,
) -> Vec<BatchOutcome> {
    let total = tasks.len();
    let slots = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(total);
    for (index, mut task) in tasks.into_iter().enumerate() {
        let slots = Arc::clone(&slots);
        let manager = Arc::clone(&manager);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let url = task.url.clone();
            let Ok(_permit) = slots.acquire_owned().await else {
                return BatchOutcome {
                    index,
                    url,
                    result: Err(DownloadError::Cancelled),
                };
            };
            tracing::info!(entry = index + 1, total, url = %url, "batch entry started");
            let result = tokio::task::spawn_blocking(move || manager.download(&mut task, &cancel, None))
                .await
                .unwrap_or_else(|e| {
                    Err(DownloadError::io(
                        "batch worker",
                        std::io::Error::other(e.to_string()),
                    ))
                });
            match &result {
                Ok(report) => tracing::info!(entry = index + 1, path = %report.output.display(), "batch entry complete"),
                Err(e) => tracing::warn!(entry = index + 1, url = %url, error = %e, "batch entry failed"),
            }
            BatchOutcome { index, url, result }
        }));
    }

    let mut outcomes = Vec::with_capacity(total);
    for (index, handle) in handles.into_iter().enumerate() {
        let outcome = handle.await.unwrap_or_else(|e| BatchOutcome {
            index,
            url: String::new(),
            result: Err(DownloadError::io("batch entry", std::io::Error::other(e.to_string()))),
        });
        outcomes.push(outcome);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blank_lines() {
        let tasks = parse_batch(
            "# mirrors\n\nhttp://a.example/one.iso\n   \n  # indented comment\nhttp://b.example/two.iso\n",
        );
        let urls: Vec<_> = tasks.iter().map(|t| t.url.as_str()).collect();
        assert_eq!(urls, ["http://a.example/one.iso", "http://b.example/two.iso"]);
    }

    #[test]
    fn digest_tokens_fill_expected_digests() {
        let tasks = parse_batch("http://x/f.bin  sha256:AB12 md5:cd34\thttp-ish sha1:ef\n");
        assert_eq!(tasks.len(), 1);
        let d = &tasks[0].digests;
        assert_eq!(d.sha256.as_deref(), Some("AB12"));
        assert_eq!(d.sha1.as_deref(), Some("ef"));
        assert_eq!(d.md5.as_deref(), Some("cd34"));
        assert!(tasks[0].output.is_none());
        assert!(tasks[0].connections.is_none());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_batch_file(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, DownloadError::Io { .. }), "{err}");
    }
}
