//! Queue state and user operations (add, pause, resume, retry, delete, stats).

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};

use crate::control::CancelToken;
use crate::error::QueueError;
use crate::job_store::{Job, JobId, JobStatus, JobStore};
use crate::manager::DownloadManager;

#[derive(Debug, Default)]
pub(super) struct QueueState {
    pub(super) jobs: HashMap<JobId, Job>,
    /// Pending ids, highest priority first; stable within a priority.
    pub(super) pending: Vec<JobId>,
    /// Downloading jobs and the tokens that cancel them.
    pub(super) active: HashMap<JobId, CancelToken>,
    pub(super) completed: BTreeSet<JobId>,
    pub(super) failed: BTreeSet<JobId>,
}

impl QueueState {
    pub(super) fn enqueue(&mut self, id: JobId) {
        if !self.pending.contains(&id) {
            self.pending.push(id);
        }
        self.sort_pending();
    }

    fn sort_pending(&mut self) {
        let jobs = &self.jobs;
        self.pending
            .sort_by_key(|id| Reverse(jobs.get(id).map_or(i32::MIN, |j| j.priority)));
    }

    pub(super) fn pop_next(&mut self) -> Option<JobId> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }
}

/// Aggregate numbers for the `status` view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueStats {
    pub total_jobs: usize,
    pub pending: usize,
    pub active: usize,
    pub paused: usize,
    pub completed: usize,
    pub failed: usize,
    /// Sum of known sizes of completed jobs.
    pub completed_bytes: u64,
    /// Bytes downloaded so far across all jobs.
    pub downloaded_bytes: u64,
    /// Mean of per-job average speeds over completed jobs (bytes/s).
    pub avg_bytes_per_sec: f64,
}

/// Priority queue of download jobs backed by a `JobStore`.
pub struct JobQueue {
    pub(super) state: RwLock<QueueState>,
    pub(super) store: Arc<dyn JobStore>,
    pub(super) manager: Arc<DownloadManager>,
    pub(super) slots: Arc<Semaphore>,
    pub(super) max_active: usize,
    pub(super) tick: Duration,
    /// Parent of every job token; cancelling it stops the whole queue.
    pub(super) shutdown: CancelToken,
    /// Wakes the scheduler loop early (job added, job finished, shutdown).
    pub(super) wake: Notify,
}

impl JobQueue {
    /// Restore unfinished jobs from `store`. Jobs left `downloading` by a
    /// previous process are demoted to `pending` and persisted as such.
    pub async fn open(
        store: Arc<dyn JobStore>,
        manager: Arc<DownloadManager>,
        shutdown: CancelToken,
    ) -> Result<Arc<Self>, QueueError> {
        let max_active = manager.config().max_active_jobs.max(1);
        let tick = manager.config().scheduler_tick();

        let mut state = QueueState::default();
        let mut recovered = 0usize;
        for mut job in store.load_unfinished().await? {
            match job.status {
                JobStatus::Downloading => {
                    job.status = JobStatus::Pending;
                    store.update(&job).await?;
                    recovered += 1;
                    state.pending.push(job.id);
                }
                JobStatus::Pending => state.pending.push(job.id),
                JobStatus::Failed => {
                    state.failed.insert(job.id);
                }
                JobStatus::Paused => {}
                JobStatus::Completed => continue,
            }
            state.jobs.insert(job.id, job);
        }
        state.sort_pending();
        tracing::info!(
            jobs = state.jobs.len(),
            pending = state.pending.len(),
            recovered,
            "job queue restored"
        );

        Ok(Arc::new(Self {
            state: RwLock::new(state),
            store,
            manager,
            slots: Arc::new(Semaphore::new(max_active)),
            max_active,
            tick,
            shutdown,
            wake: Notify::new(),
        }))
    }

    pub(super) fn read(&self) -> RwLockReadGuard<'_, QueueState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn write(&self) -> RwLockWriteGuard<'_, QueueState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn manager(&self) -> &Arc<DownloadManager> {
        &self.manager
    }

    pub fn max_active(&self) -> usize {
        self.max_active
    }

    /// Persist `job` as pending and queue it. Returns the store-assigned id.
    pub async fn add_job(&self, mut job: Job) -> Result<JobId, QueueError> {
        job.status = JobStatus::Pending;
        job.error = None;
        job.finished_at = None;
        let id = self.store.insert(&job).await?;
        job.id = id;
        tracing::info!(job_id = id, url = %job.url, priority = job.priority, "job added");
        {
            let mut st = self.write();
            st.jobs.insert(id, job);
            st.enqueue(id);
        }
        self.wake.notify_one();
        Ok(id)
    }

    /// Pending jobs leave the queue; a downloading job is cancelled and stays paused.
    pub async fn pause(&self, id: JobId) -> Result<(), QueueError> {
        let snapshot = {
            let mut guard = self.write();
            let st = &mut *guard;
            let job = st.jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;
            let was = job.status;
            if !job.mark_paused()? {
                return Ok(());
            }
            if was == JobStatus::Downloading {
                if let Some(token) = st.active.get(&id) {
                    token.cancel();
                }
            } else {
                st.pending.retain(|p| *p != id);
            }
            job.clone()
        };
        tracing::info!(job_id = id, "job paused");
        self.store.update(&snapshot).await?;
        Ok(())
    }

    /// Paused jobs go back to pending in priority order.
    pub async fn resume(&self, id: JobId) -> Result<(), QueueError> {
        let snapshot = {
            let mut guard = self.write();
            let st = &mut *guard;
            let job = st.jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;
            if !job.mark_resumed()? {
                return Ok(());
            }
            let snapshot = job.clone();
            // A job still winding down from pause is re-queued when it finishes.
            if !st.active.contains_key(&id) {
                st.enqueue(id);
            }
            snapshot
        };
        tracing::info!(job_id = id, "job resumed");
        self.store.update(&snapshot).await?;
        self.wake.notify_one();
        Ok(())
    }

    /// Re-queue a failed job with its error cleared.
    pub async fn retry(&self, id: JobId) -> Result<(), QueueError> {
        let snapshot = {
            let mut guard = self.write();
            let st = &mut *guard;
            if !st.failed.remove(&id) {
                return Err(match st.jobs.get(&id) {
                    Some(job) => QueueError::InvalidState {
                        id,
                        status: job.status,
                        action: "retry",
                    },
                    None => QueueError::NotFound(id),
                });
            }
            let job = st.jobs.get_mut(&id).ok_or(QueueError::NotFound(id))?;
            job.mark_retried()?;
            let snapshot = job.clone();
            st.enqueue(id);
            snapshot
        };
        tracing::info!(job_id = id, "job retried");
        self.store.update(&snapshot).await?;
        self.wake.notify_one();
        Ok(())
    }

    /// Remove a job everywhere, cancelling it if it is downloading.
    pub async fn delete(&self, id: JobId) -> Result<(), QueueError> {
        {
            let mut guard = self.write();
            let st = &mut *guard;
            if st.jobs.remove(&id).is_none() {
                return Err(QueueError::NotFound(id));
            }
            st.pending.retain(|p| *p != id);
            st.completed.remove(&id);
            st.failed.remove(&id);
            if let Some(token) = st.active.get(&id) {
                token.cancel();
            }
        }
        tracing::info!(job_id = id, "job deleted");
        self.store.delete(id).await?;
        Ok(())
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.read().jobs.get(&id).cloned()
    }

    /// All known jobs, by id.
    pub fn jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.read().jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.id);
        jobs
    }

    /// Pending ids in the order they will be started.
    pub fn pending_ids(&self) -> Vec<JobId> {
        self.read().pending.clone()
    }

    pub fn active_count(&self) -> usize {
        self.read().active.len()
    }

    /// Nothing pending and nothing downloading.
    pub fn is_idle(&self) -> bool {
        let st = self.read();
        st.pending.is_empty() && st.active.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        let st = self.read();
        let mut stats = QueueStats {
            total_jobs: st.jobs.len(),
            pending: st.pending.len(),
            active: st.active.len(),
            completed: st.completed.len(),
            failed: st.failed.len(),
            ..Default::default()
        };
        let mut speed_sum = 0.0;
        for job in st.jobs.values() {
            stats.downloaded_bytes += job.downloaded;
            if job.status == JobStatus::Paused {
                stats.paused += 1;
            }
        }
        for job in st.completed.iter().filter_map(|id| st.jobs.get(id)) {
            stats.completed_bytes += job.total_size;
            if let (Some(start), Some(end)) = (job.started_at, job.finished_at) {
                let secs = (end - start) as f64;
                if secs > 0.0 {
                    speed_sum += job.total_size as f64 / secs;
                }
            }
        }
        if stats.completed > 0 {
            stats.avg_bytes_per_sec = speed_sum / stats.completed as f64;
        }
        stats
    }

    /// Change the process-wide bandwidth cap (bytes/s, 0 = unlimited).
    pub fn set_rate_limit(&self, bytes_per_sec: i64) {
        self.manager.limiter().set_limit(bytes_per_sec);
    }

    /// Stop dispatching and cancel every downloading job.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.wake.notify_one();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
