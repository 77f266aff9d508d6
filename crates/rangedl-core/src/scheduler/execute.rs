//! Run one claimed job and record how it ended.

use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;
use tokio::task::JoinError;

use crate::control::CancelToken;
use crate::error::DownloadError;
use crate::job_store::{unix_timestamp, Job, JobId, JobStatus};
use crate::manager::{DownloadReport, Task};
use crate::progress::ProgressSnapshot;

use super::JobQueue;

type Outcome = Result<(Task, Result<DownloadReport, DownloadError>), JoinError>;

impl JobQueue {
    /// Holds `permit` until the job's final state is recorded.
    pub(super) async fn execute(
        self: Arc<Self>,
        job: Job,
        cancel: CancelToken,
        permit: OwnedSemaphorePermit,
    ) {
        let id = job.id;
        tracing::info!(job_id = id, url = %job.url, "job started");
        if let Err(e) = self.store.update(&job).await {
            tracing::warn!(job_id = id, error = %e, "could not persist downloading state");
        }

        let (tx, mut rx) = tokio::sync::mpsc::channel::<ProgressSnapshot>(16);
        let this = Arc::clone(&self);
        let progress = tokio::spawn(async move {
            while let Some(snap) = rx.recv().await {
                this.record_progress(id, &snap);
            }
        });

        let manager = Arc::clone(&self.manager);
        let mut task = job.to_task();
        let outcome = tokio::task::spawn_blocking(move || {
            let result = manager.download(&mut task, &cancel, Some(tx));
            (task, result)
        })
        .await;
        let _ = progress.await;

        self.finish(id, outcome).await;
        drop(permit);
        self.wake.notify_one();
    }

    fn record_progress(&self, id: JobId, snap: &ProgressSnapshot) {
        let mut st = self.write();
        if let Some(job) = st.jobs.get_mut(&id) {
            job.downloaded = snap.downloaded;
            if snap.total > 0 {
                job.total_size = snap.total;
            }
        }
    }

    async fn finish(&self, id: JobId, outcome: Outcome) {
        let now = unix_timestamp();
        let snapshot = {
            let mut guard = self.write();
            let st = &mut *guard;
            st.active.remove(&id);
            let Some(job) = st.jobs.get_mut(&id) else {
                tracing::debug!(job_id = id, "job deleted while downloading");
                return;
            };

            let mut requeue = false;
            match outcome {
                Ok((task, result)) => {
                    if let Some(size) = task.expected_size {
                        job.total_size = size;
                    }
                    if job.output.is_none() {
                        job.output = task.output;
                    }
                    match result {
                        Ok(report) => {
                            job.status = JobStatus::Completed;
                            job.total_size = report.bytes;
                            job.downloaded = report.bytes;
                            job.output = Some(report.output);
                            job.finished_at = Some(now);
                            job.error = None;
                            st.completed.insert(id);
                            tracing::info!(job_id = id, bytes = report.bytes, "job completed");
                        }
                        Err(e) if e.is_cancelled() => match job.status {
                            JobStatus::Paused => tracing::info!(job_id = id, "job stopped (paused)"),
                            // Resumed while winding down, or stopped by shutdown.
                            _ => {
                                job.status = JobStatus::Pending;
                                requeue = true;
                                tracing::info!(job_id = id, "job stopped, back to pending");
                            }
                        },
                        Err(e) => {
                            job.status = JobStatus::Failed;
                            job.error = Some(e.to_string());
                            job.finished_at = Some(now);
                            st.failed.insert(id);
                            tracing::warn!(job_id = id, error = %e, "job failed");
                        }
                    }
                }
                Err(join_err) => {
                    job.status = JobStatus::Failed;
                    job.error = Some(format!("download task aborted: {join_err}"));
                    job.finished_at = Some(now);
                    st.failed.insert(id);
                    tracing::error!(job_id = id, error = %join_err, "download task aborted");
                }
            }
            let snapshot = job.clone();
            if requeue {
                st.enqueue(id);
            }
            snapshot
        };

        if let Err(e) = self.store.update(&snapshot).await {
            tracing::warn!(job_id = id, error = %e, "could not persist job state");
        }
    }
}
