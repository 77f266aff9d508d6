//! `rangedl resume <id>`

use anyhow::Result;
use rangedl_core::job_store::SqliteJobStore;
use rangedl_core::JobId;

use super::update_job;

pub async fn run_resume(store: &SqliteJobStore, id: JobId) -> Result<()> {
    let job = update_job(store, id, |job| job.mark_resumed()).await?;
    tracing::info!(job_id = id, status = %job.status, "job resume recorded");
    println!("Resumed job {id}");
    Ok(())
}
