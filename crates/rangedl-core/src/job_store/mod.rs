//! Durable job records.
//!
//! The queue talks to storage only through the `JobStore` trait, so the SQLite
//! store used by the CLI and the in-memory store used in tests are
//! interchangeable.

mod memory;
mod sqlite;
mod types;


pub use memory::MemoryJobStore;
pub use sqlite::SqliteJobStore;
pub use types::{unix_timestamp, Job, JobId, JobSettings, JobStatus};

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new job and return its assigned id. The job's own `id` is ignored.
    async fn insert(&self, job: &Job) -> Result<JobId>;
    /// Overwrite the stored record for `job.id`.
    async fn update(&self, job: &Job) -> Result<()>;
    async fn delete(&self, id: JobId) -> Result<()>;
    /// Every job whose status is not `completed`, oldest first.
    async fn load_unfinished(&self) -> Result<Vec<Job>>;
}
