//! Chunked downloader: a bounded pool of OS threads, one curl handle per chunk.
//!
//! Chunks are loaded into a bounded work channel that is closed up front;
//! workers pull from it until it drains, run each chunk through the retry
//! policy and report results over a second channel. The first chunk that exhausts its
//! retries marks the run failed: workers finish what they hold and then take
//! no more chunks.

mod chunk;
mod handler;
mod single;

pub use chunk::{download_chunk, ChunkOutcome};
pub use single::download_single;

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};

use crate::control::CancelToken;
use crate::error::DownloadError;
use crate::progress::ProgressState;
use crate::rate_limit::RateLimiter;
use crate::retry::{run_with_retry, Exhausted, RetryPolicy};
use crate::segmenter::ChunkInfo;
use crate::transport::Transport;

/// Everything a transfer needs besides its byte range.
#[derive(Debug, Clone)]
pub struct TransferContext {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub cookies: Vec<String>,
    pub transport: Transport,
    pub limiter: Arc<RateLimiter>,
    pub progress: Arc<ProgressState>,
    pub cancel: CancelToken,
}

/// Pool parameters for `download_chunks`.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub max_workers: usize,
    pub retry: RetryPolicy,
    pub resume: bool,
}

type ChunkResult = (usize, Result<ChunkOutcome, Exhausted>);

/// Download every chunk into its partial file using at most
/// `min(max_workers, chunks.len())` threads.
///
/// Returns the first chunk failure, or `Cancelled` if the task's token fired.
pub fn download_chunks(
    ctx: Arc<TransferContext>,
    chunks: &[ChunkInfo],
    opts: PoolOptions,
) -> Result<(), DownloadError> {
    if chunks.is_empty() {
        return Ok(());
    }
    let (work_tx, work_rx) = mpsc::sync_channel::<ChunkInfo>(chunks.len());
    for chunk in chunks {
        work_tx
            .send(chunk.clone())
            .map_err(|_| DownloadError::io("queue chunk", io::Error::other("work channel closed")))?;
    }
    drop(work_tx);
    let work = Arc::new(Mutex::new(work_rx));
    let failed = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel::<ChunkResult>();

    let workers = opts.max_workers.max(1).min(chunks.len());
    let mut handles = Vec::with_capacity(workers);
    for w in 0..workers {
        let work = Arc::clone(&work);
        let worker_failed = Arc::clone(&failed);
        let ctx = Arc::clone(&ctx);
        let worker_tx = tx.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("rangedl-chunk-{w}"))
            .spawn(move || loop {
                if worker_failed.load(Ordering::Acquire) || ctx.cancel.is_cancelled() {
                    break;
                }
                let next = work.lock().unwrap_or_else(PoisonError::into_inner).recv();
                let Ok(chunk) = next else { break };

                let _busy = ctx.progress.worker();
                let res = run_with_retry(&opts.retry, &ctx.cancel, |attempt| {
                    if attempt > 1 {
                        tracing::debug!(index = chunk.index, attempt, "retrying chunk");
                    }
                    download_chunk(&ctx, &chunk, opts.resume)
                });
                if res.is_err() {
                    worker_failed.store(true, Ordering::Release);
                }
                if worker_tx.send((chunk.index, res)).is_err() {
                    break;
                }
            });
        match spawned {
            Ok(h) => handles.push(h),
            Err(e) => {
                failed.store(true, Ordering::Release);
                drop(tx);
                for h in handles {
                    let _ = h.join();
                }
                return Err(DownloadError::io("spawn chunk worker", e));
            }
        }
    }
    drop(tx);

    let mut first_err: Option<DownloadError> = None;
    let mut done = 0usize;
    for (index, res) in rx {
        match res {
            Ok(_) => done += 1,
            Err(Exhausted { attempts, last }) => {
                if last.is_cancelled() {
                    first_err.get_or_insert(DownloadError::Cancelled);
                    continue;
                }
                tracing::warn!(index, attempts, error = %last, "chunk failed");
                if first_err.is_none() || first_err.as_ref().is_some_and(DownloadError::is_cancelled) {
                    first_err = Some(DownloadError::Chunk {
                        index,
                        attempts,
                        source: last,
                    });
                }
            }
        }
    }
    for h in handles {
        if h.join().is_err() {
            first_err.get_or_insert_with(|| {
                DownloadError::io("chunk worker", io::Error::other("worker thread panicked"))
            });
        }
    }

    if ctx.cancel.is_cancelled() {
        return Err(DownloadError::Cancelled);
    }
    if let Some(e) = first_err {
        return Err(e);
    }
    if done != chunks.len() {
        return Err(DownloadError::Cancelled);
    }
    Ok(())
}
