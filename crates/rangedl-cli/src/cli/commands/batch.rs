//! `rangedl batch <file>` – download every URL in a list, a few at a time.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use rangedl_core::batch::{download_batch, read_batch_file};
use rangedl_core::rate_limit::RateLimiter;
use rangedl_core::{CancelToken, DownloadManager, EngineConfig};

use super::progress::mib;

pub async fn run_batch(
    cfg: EngineConfig,
    file: &Path,
    jobs: usize,
    connections: Option<usize>,
    rate_limit: Option<i64>,
) -> Result<()> {
    let mut tasks = read_batch_file(file)?;
    if tasks.is_empty() {
        println!("No URLs in {}", file.display());
        return Ok(());
    }
    for task in &mut tasks {
        task.connections = connections;
    }
    let total = tasks.len();
    println!("Found {total} URL(s) to download");

    let limiter = Arc::new(RateLimiter::new(rate_limit.unwrap_or(cfg.rate_limit_bytes)));
    let manager = Arc::new(DownloadManager::new(cfg, limiter));
    let cancel = CancelToken::new();
    let mut batch = tokio::spawn(download_batch(manager, tasks, jobs, cancel.clone()));
    let outcomes = tokio::select! {
        res = &mut batch => res?,
        _ = tokio::signal::ctrl_c() => {
            println!("\nBatch download interrupted");
            tracing::info!("interrupted, cancelling batch");
            cancel.cancel();
            batch.await?
        }
    };

    let mut failed = 0usize;
    for o in &outcomes {
        match &o.result {
            Ok(report) => println!(
                "[{}/{total}] Completed {} ({:.1} MiB)",
                o.index + 1,
                report.output.display(),
                mib(report.bytes)
            ),
            Err(e) => {
                failed += 1;
                println!("[{}/{total}] Failed {}: {e}", o.index + 1, o.url);
            }
        }
    }
    anyhow::ensure!(failed == 0, "{failed} of {total} download(s) failed");
    Ok(())
}
