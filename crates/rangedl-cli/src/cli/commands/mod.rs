//! CLI command handlers, one file per command.

mod add;
mod batch;
mod get;
mod pause;
mod progress;
mod remove;
mod resume;
mod retry;
mod run;
mod status;
mod verify;

pub use add::run_add;
pub use batch::run_batch;
pub use get::run_get;
pub use pause::run_pause;
pub use remove::run_remove;
pub use resume::run_resume;
pub use retry::run_retry;
pub use run::run_scheduler;
pub use status::run_status;
pub use verify::run_verify;

use std::sync::Arc;

use anyhow::Result;
use rangedl_core::job_store::SqliteJobStore;
use rangedl_core::{Engine, EngineConfig, Job, JobId, JobStore, QueueError};

/// Engine over the job database without starting the scheduler.
async fn open_engine(cfg: EngineConfig, store: Arc<SqliteJobStore>) -> Result<Engine> {
    Engine::start(cfg, store).await
}

/// Apply a status change to one stored job, leaving every other row alone
/// (a `run` process may own them). Writes only when `apply` changed something.
async fn update_job(
    store: &SqliteJobStore,
    id: JobId,
    apply: impl FnOnce(&mut Job) -> Result<bool, QueueError>,
) -> Result<Job> {
    let mut job = store.get(id).await?.ok_or(QueueError::NotFound(id))?;
    if apply(&mut job)? {
        store.update(&job).await?;
    }
    Ok(job)
}
