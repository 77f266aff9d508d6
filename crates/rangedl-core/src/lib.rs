//! rangedl core: segmented HTTP downloads with a persistent job queue.

pub mod batch;
pub mod checksum;
pub mod config;
pub mod control;
pub mod downloader;
pub mod engine;
pub mod error;
pub mod fetch_head;
pub mod job_store;
pub mod logging;
pub mod manager;
pub mod progress;
pub mod rate_limit;
pub mod retry;
pub mod scheduler;
pub mod segmenter;
pub mod storage;
pub mod transport;
pub mod url_model;

pub use config::EngineConfig;
pub use control::CancelToken;
pub use engine::Engine;
pub use error::{DownloadError, QueueError, TransferError};
pub use job_store::{Job, JobId, JobStatus, JobStore};
pub use manager::{DownloadManager, DownloadReport, Task};
