//! `rangedl remove <id>` – delete a job record, optionally with its file.

use anyhow::Result;
use rangedl_core::job_store::SqliteJobStore;
use rangedl_core::{JobId, JobStore, QueueError};

pub async fn run_remove(store: &SqliteJobStore, id: JobId, delete_file: bool) -> Result<()> {
    let job = store.get(id).await?.ok_or(QueueError::NotFound(id))?;
    store.delete(id).await?;
    if delete_file {
        if let Some(path) = job.output.as_ref().filter(|p| p.exists()) {
            std::fs::remove_file(path)?;
            println!("Deleted {}", path.display());
        }
    }
    tracing::info!(job_id = id, "job removed");
    println!("Removed job {id}");
    Ok(())
}
