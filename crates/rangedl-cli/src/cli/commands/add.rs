//! `rangedl add <url>` – queue a new download job.

use anyhow::Result;
use rangedl_core::job_store::SqliteJobStore;
use rangedl_core::{Job, JobStore};

use crate::cli::RequestArgs;

pub async fn run_add(
    store: &SqliteJobStore,
    url: &str,
    request: &RequestArgs,
    priority: i32,
) -> Result<()> {
    let mut job = Job::new(url)
        .with_priority(priority)
        .with_digests(request.digests());
    job.output = request.output.clone();
    job.settings.connections = request.connections;
    job.settings.headers = request.header_map();
    job.settings.cookies = request.cookies.clone();
    let id = store.insert(&job).await?;
    tracing::info!(job_id = id, url, priority, "job added");
    println!("Added job {id} (priority {priority}) for URL: {url}");
    Ok(())
}
