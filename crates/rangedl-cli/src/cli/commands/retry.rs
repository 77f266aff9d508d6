//! `rangedl retry <id>` – re-queue a failed job.

use anyhow::Result;
use rangedl_core::job_store::SqliteJobStore;
use rangedl_core::JobId;

use super::update_job;

pub async fn run_retry(store: &SqliteJobStore, id: JobId) -> Result<()> {
    let job = update_job(store, id, |job| job.mark_retried()).await?;
    tracing::info!(job_id = id, status = %job.status, "job retry recorded");
    println!("Job {id} queued for retry");
    Ok(())
}
