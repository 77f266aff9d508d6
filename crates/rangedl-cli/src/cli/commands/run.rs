//! `rangedl run` – process queued jobs until none are left.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rangedl_core::job_store::SqliteJobStore;
use rangedl_core::EngineConfig;

use super::open_engine;
use super::progress::mib;

const STATUS_INTERVAL: Duration = Duration::from_secs(1);

pub async fn run_scheduler(cfg: EngineConfig, store: Arc<SqliteJobStore>) -> Result<()> {
    let engine = open_engine(cfg, store).await?;
    let queue = Arc::clone(engine.queue());
    if queue.pending_ids().is_empty() {
        println!("No queued jobs.");
        return Ok(());
    }

    let interrupt = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("\nInterrupted; stopping active jobs (they stay queued).");
                queue.shutdown();
            }
        })
    };
    let status = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(STATUS_INTERVAL);
            loop {
                ticker.tick().await;
                let s = queue.stats();
                println!(
                    "  active {}  pending {}  completed {}  failed {}  {:.1} MiB downloaded",
                    s.active,
                    s.pending,
                    s.completed,
                    s.failed,
                    mib(s.downloaded_bytes)
                );
            }
        })
    };

    engine.run_until_idle().await;
    status.abort();
    interrupt.abort();

    let s = queue.stats();
    tracing::info!(completed = s.completed, failed = s.failed, "run finished");
    println!(
        "Completed {}, failed {}, {:.1} MiB, average {:.2} MiB/s",
        s.completed,
        s.failed,
        mib(s.completed_bytes),
        s.avg_bytes_per_sec / 1_048_576.0
    );
    for job in queue.jobs().iter().filter(|j| j.error.is_some()) {
        println!(
            "  job {} failed: {}",
            job.id,
            job.error.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}
