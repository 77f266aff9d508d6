use std::time::Duration;

use crate::error::TransferError;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(2))
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first attempt; 0 is treated as 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// `attempt` is 1-based (1 = first attempt just failed with `err`).
    pub fn decide(&self, attempt: u32, err: &TransferError) -> RetryDecision {
        if err.is_cancelled() || attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_until_budget_exhausted() {
        let p = RetryPolicy::new(3, Duration::from_millis(10));
        let e = TransferError::Http(503);
        assert_eq!(p.decide(1, &e), RetryDecision::RetryAfter(Duration::from_millis(10)));
        assert_eq!(p.decide(2, &e), RetryDecision::RetryAfter(Duration::from_millis(10)));
        assert_eq!(p.decide(3, &e), RetryDecision::NoRetry);
    }

    #[test]
    fn never_retries_cancellation() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, &TransferError::Cancelled), RetryDecision::NoRetry);
    }

    #[test]
    fn zero_attempts_means_one() {
        let p = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(p.max_attempts(), 1);
        assert_eq!(p.decide(1, &TransferError::Http(500)), RetryDecision::NoRetry);
    }
}
