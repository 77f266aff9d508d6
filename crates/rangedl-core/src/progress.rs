//! Live progress for one task: byte counter, active workers, speed and ETA.
//!
//! Transfers bump `ProgressState` from their write callbacks. A reporter thread
//! samples it every `progress_interval` and pushes `ProgressSnapshot`s to an
//! optional channel (the CLI progress line, the scheduler's job record).

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Shared counters for one running task.
#[derive(Debug, Default)]
pub struct ProgressState {
    downloaded: AtomicU64,
    total: AtomicU64,
    active: AtomicUsize,
}

impl ProgressState {
    pub fn new(total: u64) -> Self {
        Self {
            total: AtomicU64::new(total),
            ..Default::default()
        }
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    /// Total size, 0 when unknown.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn add_downloaded(&self, n: u64) {
        self.downloaded.fetch_add(n, Ordering::Relaxed);
    }

    /// Undo bytes counted by a failed attempt that will be re-fetched.
    pub fn rewind(&self, n: u64) {
        let _ = self
            .downloaded
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(n))
            });
    }

    /// Mark a worker busy until the guard drops.
    pub fn worker(&self) -> ActiveWorker<'_> {
        self.active.fetch_add(1, Ordering::Relaxed);
        ActiveWorker { state: self }
    }
}

/// Decrements the active-worker count on drop.
pub struct ActiveWorker<'a> {
    state: &'a ProgressState,
}

impl Drop for ActiveWorker<'_> {
    fn drop(&mut self) {
        self.state.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Point-in-time view of a task's progress (CLI-friendly).
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub downloaded: u64,
    /// 0 when the size is unknown.
    pub total: u64,
    pub active_workers: usize,
    /// Throughput over the last sampling interval.
    pub bytes_per_sec: f64,
    /// None when the size is unknown or nothing moved in the last interval.
    pub eta: Option<Duration>,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Fraction complete in [0.0, 1.0]; 0 when the size is unknown.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.downloaded as f64 / self.total as f64).min(1.0)
    }
}

/// Turns successive counter readings into speed and ETA.
#[derive(Debug)]
pub struct ProgressSampler {
    started: Instant,
    last_at: Instant,
    last_bytes: u64,
}

impl ProgressSampler {
    pub fn new(now: Instant) -> Self {
        Self {
            started: now,
            last_at: now,
            last_bytes: 0,
        }
    }

    pub fn sample(&mut self, state: &ProgressState, now: Instant) -> ProgressSnapshot {
        let downloaded = state.downloaded();
        let total = state.total();
        let dt = now.saturating_duration_since(self.last_at).as_secs_f64();
        let delta = downloaded.saturating_sub(self.last_bytes);
        let bytes_per_sec = if dt > 0.0 { delta as f64 / dt } else { 0.0 };
        self.last_at = now;
        self.last_bytes = downloaded;

        let eta = if total > 0 && bytes_per_sec > 0.0 {
            let remaining = total.saturating_sub(downloaded);
            Some(Duration::from_secs_f64(remaining as f64 / bytes_per_sec))
        } else {
            None
        };

        ProgressSnapshot {
            downloaded,
            total,
            active_workers: state.active_workers(),
            bytes_per_sec,
            eta,
            elapsed: now.saturating_duration_since(self.started),
        }
    }
}

/// Background sampler thread; stop it with `finish`.
pub struct ProgressReporter {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    /// Sample `state` every `interval` and `try_send` each snapshot to `sink`.
    /// A full or closed sink drops the snapshot; the transfer never waits on it.
    pub fn spawn(
        state: Arc<ProgressState>,
        interval: Duration,
        sink: Option<tokio::sync::mpsc::Sender<ProgressSnapshot>>,
    ) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            let mut sampler = ProgressSampler::new(Instant::now());
            loop {
                let stopped = match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => false,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
                };
                let snap = sampler.sample(&state, Instant::now());
                tracing::trace!(
                    downloaded = snap.downloaded,
                    total = snap.total,
                    workers = snap.active_workers,
                    bps = snap.bytes_per_sec as u64,
                    "progress"
                );
                if let Some(tx) = &sink {
                    let _ = tx.try_send(snap);
                }
                if stopped {
                    break;
                }
            }
        });
        Self { stop_tx, handle }
    }

    /// Emit one final snapshot and join the thread.
    pub fn finish(self) {
        let _ = self.stop_tx.send(());
        if self.handle.join().is_err() {
            tracing::warn!("progress reporter thread panicked");
        }
    }
}
