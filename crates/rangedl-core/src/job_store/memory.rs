//! In-memory job store (tests, embedding without persistence).

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{Job, JobId, JobStatus, JobStore};

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    next_id: JobId,
    jobs: BTreeMap<JobId, Job>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored copy of a job, if present.
    pub fn get(&self, id: JobId) -> Option<Job> {
        self.lock().jobs.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &Job) -> Result<JobId> {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        let mut stored = job.clone();
        stored.id = id;
        inner.jobs.insert(id, stored);
        Ok(id)
    }

    async fn update(&self, job: &Job) -> Result<()> {
        let mut inner = self.lock();
        match inner.jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                Ok(())
            }
            None => anyhow::bail!("job {} not found", job.id),
        }
    }

    async fn delete(&self, id: JobId) -> Result<()> {
        self.lock().jobs.remove(&id);
        Ok(())
    }

    async fn load_unfinished(&self) -> Result<Vec<Job>> {
        Ok(self
            .lock()
            .jobs
            .values()
            .filter(|j| j.status != JobStatus::Completed)
            .cloned()
            .collect())
    }
}
