//! `rangedl get <url>` – download immediately, printing progress; Ctrl-C cancels.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use rangedl_core::progress::ProgressSnapshot;
use rangedl_core::rate_limit::RateLimiter;
use rangedl_core::{CancelToken, DownloadManager, EngineConfig, Task};

use super::progress::{mib, progress_line};
use crate::cli::RequestArgs;

pub async fn run_get(
    cfg: EngineConfig,
    url: &str,
    request: &RequestArgs,
    rate_limit: Option<i64>,
) -> Result<()> {
    let limiter = Arc::new(RateLimiter::new(rate_limit.unwrap_or(cfg.rate_limit_bytes)));
    let manager = Arc::new(DownloadManager::new(cfg, limiter));

    let mut task = Task::new(url).with_digests(request.digests());
    task.output = request.output.clone();
    task.connections = request.connections;
    task.headers = request.header_map();
    task.cookies = request.cookies.clone();

    let (tx, mut rx) = tokio::sync::mpsc::channel::<ProgressSnapshot>(16);
    let printer = tokio::spawn(async move {
        while let Some(snap) = rx.recv().await {
            print!("\r{}", progress_line(&snap));
            let _ = std::io::stdout().flush();
        }
        println!();
    });

    let cancel = CancelToken::new();
    let mut worker = {
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || manager.download(&mut task, &cancel, Some(tx)))
    };
    let joined = tokio::select! {
        res = &mut worker => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, cancelling download");
            cancel.cancel();
            worker.await
        }
    };
    let _ = printer.await;

    let report = joined.context("download task aborted")??;
    println!(
        "Saved {} ({:.1} MiB, {} chunk(s), {:.1}s)",
        report.output.display(),
        mib(report.bytes),
        report.chunks,
        report.elapsed.as_secs_f64()
    );
    Ok(())
}
