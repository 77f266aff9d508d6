//! Dispatch loop: start pending jobs while slots are free.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::job_store::{unix_timestamp, JobStatus};

use super::JobQueue;

impl JobQueue {
    /// Start as many pending jobs as free slots allow, highest priority first.
    /// Returns how many were started.
    pub fn dispatch(self: &Arc<Self>) -> usize {
        let mut started = 0;
        while !self.shutdown.is_cancelled() {
            let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() else {
                break;
            };
            let claimed = {
                let mut guard = self.write();
                let st = &mut *guard;
                let mut claimed = None;
                while let Some(id) = st.pop_next() {
                    let Some(job) = st.jobs.get_mut(&id) else { continue };
                    job.status = JobStatus::Downloading;
                    job.started_at = Some(unix_timestamp());
                    job.finished_at = None;
                    job.error = None;
                    let token = self.shutdown.child();
                    st.active.insert(id, token.clone());
                    claimed = Some((job.clone(), token));
                    break;
                }
                claimed
            };
            let Some((job, token)) = claimed else { break };
            tokio::spawn(Arc::clone(self).execute(job, token, permit));
            started += 1;
        }
        started
    }

    /// Dispatch on every tick until `shutdown`, then wait for running jobs to stop.
    pub async fn run(self: Arc<Self>) {
        tracing::info!(max_active = self.max_active, tick_ms = self.tick.as_millis() as u64, "scheduler started");
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        while !self.shutdown.is_cancelled() {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.wake.notified() => {}
            }
            self.dispatch();
        }
        self.wait_for_active().await;
        tracing::info!("scheduler stopped");
    }

    /// Dispatch until nothing is pending or downloading (or shutdown).
    pub async fn run_until_idle(self: &Arc<Self>) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            self.dispatch();
            if self.is_idle() || self.shutdown.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.wake.notified() => {}
            }
        }
        self.wait_for_active().await;
    }

    /// Wait until every downloading job has recorded its final state.
    pub async fn wait_for_active(&self) {
        while self.active_count() > 0 {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
                _ = self.wake.notified() => {}
            }
        }
    }
}
