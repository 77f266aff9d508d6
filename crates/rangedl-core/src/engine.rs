//! Engine context: configuration, rate limiter, download manager and job
//! queue wired together once per process.

use std::sync::Arc;

use anyhow::Result;

use crate::config::EngineConfig;
use crate::control::CancelToken;
use crate::job_store::JobStore;
use crate::manager::DownloadManager;
use crate::rate_limit::RateLimiter;
use crate::scheduler::JobQueue;

pub struct Engine {
    config: EngineConfig,
    limiter: Arc<RateLimiter>,
    manager: Arc<DownloadManager>,
    queue: Arc<JobQueue>,
    shutdown: CancelToken,
}

impl Engine {
    /// Build the engine and restore unfinished jobs from `store`.
    /// The scheduler is not started; call `spawn_scheduler` or `run_until_idle`.
    pub async fn start(config: EngineConfig, store: Arc<dyn JobStore>) -> Result<Self> {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit_bytes));
        let manager = Arc::new(DownloadManager::new(config.clone(), Arc::clone(&limiter)));
        let shutdown = CancelToken::new();
        let queue = JobQueue::open(store, Arc::clone(&manager), shutdown.clone()).await?;
        Ok(Self {
            config,
            limiter,
            manager,
            queue,
            shutdown,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn manager(&self) -> &Arc<DownloadManager> {
        &self.manager
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    /// Token that cancels everything the engine runs.
    pub fn shutdown_token(&self) -> &CancelToken {
        &self.shutdown
    }

    /// Run the scheduler loop in the background until `shutdown`.
    pub fn spawn_scheduler(&self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(Arc::clone(&self.queue).run())
    }

    /// Run queued jobs until none are pending or downloading.
    pub async fn run_until_idle(&self) {
        self.queue.run_until_idle().await;
    }

    pub fn set_rate_limit(&self, bytes_per_sec: i64) {
        self.limiter.set_limit(bytes_per_sec);
    }

    /// Cancel every running job and stop dispatching.
    pub fn shutdown(&self) {
        tracing::info!("engine shutting down");
        self.queue.shutdown();
    }
}
