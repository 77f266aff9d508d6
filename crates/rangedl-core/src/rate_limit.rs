//! Process-wide bandwidth limiter (token bucket, bytes per second).
//!
//! Every chunk worker and single-stream transfer of every active job asks the
//! same limiter before writing a buffer, so the ceiling applies to aggregate
//! throughput. A limit of 0 (or less) disables throttling entirely.
//!
//! `wait(n)` debits `n` tokens immediately and then sleeps off any deficit.
//! Because the sleep length is fixed at reservation time, `set_limit` only
//! affects waits that start after it. A waiter cancelled mid-sleep hands back
//! the part of its deficit it never slept off.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::control::{CancelToken, Cancelled};

#[derive(Debug)]
struct Bucket {
    /// Bytes per second; 0 = disabled.
    rate: u64,
    /// Available tokens; negative while waiters are paying off a deficit.
    tokens: f64,
    last: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant) {
        if self.rate == 0 {
            return;
        }
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        // Capacity is one second of budget.
        self.tokens = (self.tokens + elapsed * self.rate as f64).min(self.rate as f64);
        self.last = now;
    }
}

/// Shared token-bucket limiter. Wrap in `Arc` and hand to every transfer.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Limiter capped at `bytes_per_sec`; `<= 0` means unlimited.
    /// The bucket starts empty so the first second is throttled too.
    pub fn new(bytes_per_sec: i64) -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                rate: bytes_per_sec.max(0) as u64,
                tokens: 0.0,
                last: Instant::now(),
            }),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().rate > 0
    }

    /// Current ceiling in bytes per second, `None` when disabled.
    pub fn limit(&self) -> Option<u64> {
        let rate = self.lock().rate;
        (rate > 0).then_some(rate)
    }

    /// Change the ceiling at runtime. Waits already sleeping keep their deadline.
    pub fn set_limit(&self, bytes_per_sec: i64) {
        let mut b = self.lock();
        let now = Instant::now();
        b.refill(now);
        let rate = bytes_per_sec.max(0) as u64;
        b.rate = rate;
        b.last = now;
        b.tokens = if rate == 0 {
            0.0
        } else {
            b.tokens.min(rate as f64)
        };
        tracing::info!(bytes_per_sec = rate, "rate limit updated");
    }

    /// Block until `n` bytes fit in the budget or `cancel` fires.
    pub fn wait(&self, n: usize, cancel: &CancelToken) -> Result<(), Cancelled> {
        match self.reserve(n) {
            None => Ok(()),
            Some(delay) if delay.is_zero() => cancel.check(),
            Some(delay) => {
                let started = Instant::now();
                cancel.sleep(delay).inspect_err(|_| {
                    self.refund(n, delay.saturating_sub(started.elapsed()));
                })
            }
        }
    }

    /// Return tokens a cancelled waiter reserved but did not wait for.
    fn refund(&self, n: usize, unslept: Duration) {
        let mut b = self.lock();
        if b.rate == 0 {
            return;
        }
        let now = Instant::now();
        b.refill(now);
        let unused = (unslept.as_secs_f64() * b.rate as f64).min(n as f64);
        b.tokens = (b.tokens + unused).min(b.rate as f64);
        tracing::trace!(unused, "refunded cancelled rate-limit wait");
    }

    /// Debit `n` tokens and return how long the caller must wait (None = disabled).
    fn reserve(&self, n: usize) -> Option<Duration> {
        let mut b = self.lock();
        if b.rate == 0 {
            return None;
        }
        b.refill(Instant::now());
        b.tokens -= n as f64;
        if b.tokens >= 0.0 {
            Some(Duration::ZERO)
        } else {
            Some(Duration::from_secs_f64(-b.tokens / b.rate as f64))
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn disabled_limiter_never_waits() {
        let rl = RateLimiter::new(0);
        assert!(!rl.is_enabled());
        let token = CancelToken::new();
        let start = Instant::now();
        for _ in 0..1000 {
            rl.wait(1 << 20, &token).unwrap();
        }
        assert!(start.elapsed() < Duration::from_millis(200));
        assert!(RateLimiter::new(-5).limit().is_none());
    }

    #[test]
    fn sustained_writes_take_at_least_bytes_over_limit() {
        let rl = RateLimiter::new(100_000);
        let token = CancelToken::new();
        let start = Instant::now();
        for _ in 0..5 {
            rl.wait(10_000, &token).unwrap();
        }
        // 50_000 bytes at 100_000 B/s => >= 0.5s (small scheduling tolerance).
        assert!(start.elapsed() >= Duration::from_millis(480), "{:?}", start.elapsed());
    }

    #[test]
    fn shared_across_threads_caps_aggregate() {
        let rl = Arc::new(RateLimiter::new(200_000));
        let start = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let rl = Arc::clone(&rl);
                std::thread::spawn(move || {
                    let token = CancelToken::new();
                    for _ in 0..5 {
                        rl.wait(5_000, &token).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        // 4 * 25_000 = 100_000 bytes at 200_000 B/s => >= 0.5s.
        assert!(start.elapsed() >= Duration::from_millis(480), "{:?}", start.elapsed());
    }

    #[test]
    fn cancel_unblocks_wait() {
        let rl = Arc::new(RateLimiter::new(1));
        let token = CancelToken::new();
        let (rl2, t2) = (Arc::clone(&rl), token.clone());
        let h = std::thread::spawn(move || rl2.wait(1_000_000, &t2));
        std::thread::sleep(Duration::from_millis(50));
        token.cancel();
        assert_eq!(h.join().unwrap(), Err(Cancelled));
    }

    #[test]
    fn cancelled_waiter_does_not_stall_later_waits() {
        let rl = Arc::new(RateLimiter::new(1_000));
        let token = CancelToken::new();
        let (rl2, t2) = (Arc::clone(&rl), token.clone());
        // 5_000 bytes at 1_000 B/s would hold the bucket in debt for ~5s.
        let h = std::thread::spawn(move || rl2.wait(5_000, &t2));
        std::thread::sleep(Duration::from_millis(50));
        token.cancel();
        assert_eq!(h.join().unwrap(), Err(Cancelled));

        let start = Instant::now();
        rl.wait(500, &CancelToken::new()).unwrap();
        assert!(start.elapsed() < Duration::from_millis(1_500), "{:?}", start.elapsed());
    }

    #[test]
    fn set_limit_reconfigures_and_disables() {
        let rl = RateLimiter::new(1_000);
        assert_eq!(rl.limit(), Some(1_000));
        rl.set_limit(5_000);
        assert_eq!(rl.limit(), Some(5_000));
        rl.set_limit(0);
        assert!(!rl.is_enabled());
        let token = CancelToken::new();
        let start = Instant::now();
        rl.wait(10_000_000, &token).unwrap();
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
