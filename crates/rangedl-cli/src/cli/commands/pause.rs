//! `rangedl pause <id>` – mark a job paused in the job database.

use anyhow::Result;
use rangedl_core::job_store::SqliteJobStore;
use rangedl_core::JobId;

use super::update_job;

pub async fn run_pause(store: &SqliteJobStore, id: JobId) -> Result<()> {
    let job = update_job(store, id, |job| job.mark_paused()).await?;
    tracing::info!(job_id = id, status = %job.status, "job pause recorded");
    println!("Paused job {id}");
    Ok(())
}
